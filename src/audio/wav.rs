use std::path::Path;

use super::{AudioError, ENGINE_SAMPLE_RATE};

/// Write mono engine-rate PCM to `path` as a 16-bit WAV file.
pub fn write_wav_mono_16k(path: &Path, samples: &[f32]) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: ENGINE_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| AudioError::WavWrite(format!("create {}: {}", path.display(), e)))?;

    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| AudioError::WavWrite(e.to_string()))?;
    }

    writer
        .finalize()
        .map_err(|e| AudioError::WavWrite(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_decoder() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.wav");

        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 1600.0) - 0.5).collect();
        write_wav_mono_16k(&path, &samples).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let decoded = crate::audio::decode_to_mono_pcm(&bytes, Some("wav")).unwrap();
        assert_eq!(decoded.len(), samples.len());
    }

    #[test]
    fn clamps_out_of_range_samples() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hot.wav");
        write_wav_mono_16k(&path, &[2.0, -2.0, 0.0]).unwrap();
        assert!(path.exists());
    }
}
