use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::AudioError;

/// Sample rate the speech engine expects.
pub const ENGINE_SAMPLE_RATE: u32 = 16_000;

/// Decode an encoded audio (or video-with-audio) buffer to mono PCM at the
/// engine rate. Multi-channel input is downmixed by per-sample averaging.
pub fn decode_to_mono_pcm(
    data: &[u8],
    format_hint: Option<&str>,
) -> Result<Vec<f32>, AudioError> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = format_hint {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::Decode(format!("probe: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| AudioError::Decode("no audio track found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| AudioError::Decode("unknown sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::Decode(format!("codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioError::Decode(format!("packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                warn!(error = %e, "Skipping corrupt audio packet");
                continue;
            }
            Err(e) => return Err(AudioError::Decode(format!("decode: {}", e))),
        };

        let frames = decoded.frames();
        if frames == 0 {
            continue;
        }

        let mut buf = SampleBuffer::<f32>::new(frames as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        downmix_into(&mut samples, buf.samples(), channels);
    }

    if samples.is_empty() {
        return Err(AudioError::Decode("no audio samples decoded".to_string()));
    }

    if source_rate != ENGINE_SAMPLE_RATE {
        samples = resample(&samples, source_rate, ENGINE_SAMPLE_RATE)?;
    }

    debug!(
        samples = samples.len(),
        duration_secs = samples.len() as f32 / ENGINE_SAMPLE_RATE as f32,
        "Audio decoded to mono PCM at engine rate"
    );

    Ok(samples)
}

/// Append interleaved samples to `out`, averaging across channels.
fn downmix_into(out: &mut Vec<f32>, interleaved: &[f32], channels: usize) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    for frame in interleaved.chunks(channels) {
        out.push(frame.iter().sum::<f32>() / channels as f32);
    }
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioError::Resample(format!("init: {}", e)))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let frames = resampler
            .process(&[input], None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        if let Some(channel) = frames.first() {
            output.extend_from_slice(channel);
        }
    }

    // The last chunk was zero-padded; trim to the expected length.
    output.truncate((samples.len() as f64 * ratio) as usize);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_fixture(sample_rate: u32, channels: u16, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for _ in 0..channels {
                    writer.write_sample(((i % 100) as i16) * 100).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn decodes_mono_wav_at_engine_rate() {
        let bytes = wav_fixture(ENGINE_SAMPLE_RATE, 1, 1600);
        let samples = decode_to_mono_pcm(&bytes, Some("wav")).unwrap();
        assert_eq!(samples.len(), 1600);
    }

    #[test]
    fn downmixes_stereo_to_mono() {
        let bytes = wav_fixture(ENGINE_SAMPLE_RATE, 2, 800);
        let samples = decode_to_mono_pcm(&bytes, Some("wav")).unwrap();
        assert_eq!(samples.len(), 800, "stereo frames should collapse to mono");
    }

    #[test]
    fn resamples_to_engine_rate() {
        let bytes = wav_fixture(8_000, 1, 8_000);
        let samples = decode_to_mono_pcm(&bytes, Some("wav")).unwrap();
        // 1 second of 8kHz audio becomes ~1 second at 16kHz.
        assert!(
            (samples.len() as i64 - ENGINE_SAMPLE_RATE as i64).unsigned_abs() < 100,
            "expected ~16000 samples, got {}",
            samples.len()
        );
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        let result = decode_to_mono_pcm(b"definitely not audio", None);
        assert!(result.is_err());
    }

    #[test]
    fn averaging_downmix() {
        let mut out = Vec::new();
        downmix_into(&mut out, &[1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(out, vec![0.5, 0.5]);
    }
}
