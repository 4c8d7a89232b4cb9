//! Media download and audio extraction
//!
//! Bridges a remote URL to a local engine-ready WAV file. The downloaded
//! artifact and the extracted one are separate temp files with separate
//! owners; the download guard is dropped as soon as extraction supersedes it.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::audio;
use crate::temp::{TempGuard, TempStore};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("media download failed: {0}")]
    Fetch(String),
    #[error("audio extraction failed: {0}")]
    Extract(String),
}

pub struct MediaFetcher {
    client: reqwest::Client,
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Download `url` into a fresh temp file, streaming the body to disk.
    /// A partial file left by a mid-stream failure is removed by the guard.
    pub async fn download(&self, url: &str, temp: &TempStore) -> Result<TempGuard, MediaError> {
        info!(url, "Downloading media");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::Fetch(format!("status {}", response.status())));
        }

        let ext = extension_from_url(response.url().path()).unwrap_or("bin");
        let guard = TempGuard::adopt(temp.unique_path("download", ext));

        let mut file = tokio::fs::File::create(guard.path())
            .await
            .map_err(|e| MediaError::Fetch(format!("create: {}", e)))?;

        let mut stream = response.bytes_stream();
        let mut total: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| MediaError::Fetch(format!("stream: {}", e)))?;
            total += bytes.len() as u64;
            file.write_all(&bytes)
                .await
                .map_err(|e| MediaError::Fetch(format!("write: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| MediaError::Fetch(format!("flush: {}", e)))?;

        debug!(bytes = total, path = %guard.path().display(), "Download complete");
        Ok(guard)
    }
}

/// Decode `input` and rewrite it as a mono engine-rate WAV in a fresh temp
/// file. The input file is untouched; its owner releases it.
pub async fn extract_audio(input: &Path, temp: &TempStore) -> Result<TempGuard, MediaError> {
    let bytes = tokio::fs::read(input)
        .await
        .map_err(|e| MediaError::Extract(format!("read: {}", e)))?;
    let hint = input.extension().and_then(|e| e.to_str()).map(str::to_owned);

    let samples = audio::decode_to_mono_pcm(&bytes, hint.as_deref())
        .map_err(|e| MediaError::Extract(e.to_string()))?;

    let guard = TempGuard::adopt(temp.unique_path("audio", "wav"));
    audio::write_wav_mono_16k(guard.path(), &samples)
        .map_err(|e| MediaError::Extract(e.to_string()))?;

    debug!(
        input = %input.display(),
        output = %guard.path().display(),
        "Audio extracted"
    );
    Ok(guard)
}

fn extension_from_url(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_extension_parsing() {
        assert_eq!(extension_from_url("/videos/talk.mp4"), Some("mp4"));
        assert_eq!(extension_from_url("/a/b/sound.webm"), Some("webm"));
        assert_eq!(extension_from_url("/no-extension"), None);
        assert_eq!(extension_from_url("/trailing."), None);
        assert_eq!(extension_from_url("/weird.not_an_ext!"), None);
    }

    #[tokio::test]
    async fn extract_rewrites_as_engine_wav() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp = TempStore::new(dir.path()).unwrap();

        // Stage a 8kHz stereo wav as the "downloaded" input.
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let input = dir.path().join("input.wav");
        {
            let mut writer = hound::WavWriter::create(&input, spec).unwrap();
            for i in 0..800i16 {
                writer.write_sample(i).unwrap();
                writer.write_sample(-i).unwrap();
            }
            writer.finalize().unwrap();
        }

        let out_path = {
            let extracted = extract_audio(&input, &temp).await.unwrap();
            let bytes = std::fs::read(extracted.path()).unwrap();
            let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
            assert_eq!(reader.spec().channels, 1);
            assert_eq!(reader.spec().sample_rate, audio::ENGINE_SAMPLE_RATE);
            extracted.path().to_path_buf()
        };

        assert!(!out_path.exists(), "extracted temp file released on drop");
        assert!(input.exists(), "input is owned by the caller, not extract");
    }

    #[tokio::test]
    async fn extract_fails_cleanly_on_garbage() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp = TempStore::new(dir.path()).unwrap();
        let input = dir.path().join("garbage.mp3");
        std::fs::write(&input, b"not actually audio").unwrap();

        let err = extract_audio(&input, &temp).await.unwrap_err();
        assert!(matches!(err, MediaError::Extract(_)));
    }

    #[tokio::test]
    async fn unresolvable_url_is_a_fetch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let temp = TempStore::new(dir.path()).unwrap();
        let fetcher = MediaFetcher::new();

        let err = fetcher
            .download("http://invalid.invalid./nope.mp4", &temp)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Fetch(_)));
    }
}
