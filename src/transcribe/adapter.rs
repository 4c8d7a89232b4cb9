use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use super::engine::{AudioPayload, SpeechEngine, SpeechEngineError};
use crate::audio;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("speech engine error: {0}")]
    Engine(#[from] SpeechEngineError),
    #[error("transcription failed: {0}")]
    Failed(String),
}

/// Uniform interface over the speech engine.
///
/// Input is decoded and normalized to mono PCM at the engine rate before the
/// engine sees it. When decoding fails, the original encoded bytes are handed
/// to the engine once as-is; if that fallback also fails, the decode error is
/// the one surfaced.
pub struct Transcriber {
    engine: Arc<dyn SpeechEngine>,
}

impl Transcriber {
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }

    pub async fn transcribe_path(&self, path: &Path) -> Result<String, TranscriptionError> {
        let bytes = tokio::fs::read(path).await?;
        let hint = path.extension().and_then(|e| e.to_str()).map(str::to_owned);
        self.transcribe_bytes(&bytes, hint.as_deref()).await
    }

    pub async fn transcribe_bytes(
        &self,
        bytes: &[u8],
        format_hint: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        match audio::decode_to_mono_pcm(bytes, format_hint) {
            Ok(samples) => {
                let text = self
                    .engine
                    .transcribe(AudioPayload::Pcm {
                        samples: &samples,
                        sample_rate: audio::ENGINE_SAMPLE_RATE,
                    })
                    .await?;
                Ok(text)
            }
            Err(decode_err) => {
                warn!(error = %decode_err, "Decode failed, passing raw audio to engine");
                match self
                    .engine
                    .transcribe(AudioPayload::Encoded { bytes, format_hint })
                    .await
                {
                    Ok(text) => Ok(text),
                    Err(fallback_err) => {
                        warn!(error = %fallback_err, "Raw-audio fallback also failed");
                        Err(TranscriptionError::Failed(decode_err.to_string()))
                    }
                }
            }
        }
    }
}
