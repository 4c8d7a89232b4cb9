use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Audio handed to the speech engine: either already in its native format,
/// or the original encoded bytes (decode-fallback path).
#[derive(Debug, Clone, Copy)]
pub enum AudioPayload<'a> {
    Pcm {
        samples: &'a [f32],
        sample_rate: u32,
    },
    Encoded {
        bytes: &'a [u8],
        format_hint: Option<&'a str>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SpeechEngineError {
    #[error("engine transport failed: {0}")]
    Transport(String),
    #[error("engine rejected audio: {0}")]
    Engine(String),
    #[error("invalid engine reply: {0}")]
    InvalidReply(String),
}

/// Contract with the external speech-to-text collaborator.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn transcribe(&self, payload: AudioPayload<'_>) -> Result<String, SpeechEngineError>;
}

/// Request published to the speech engine subject. PCM samples travel as
/// base64-encoded little-endian f32 bytes; the fallback path sends the
/// original container bytes instead.
#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pcm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SpeechReply {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Speech engine reached over NATS request/reply.
pub struct NatsSpeechEngine {
    client: async_nats::Client,
    subject: String,
}

impl NatsSpeechEngine {
    pub async fn connect(url: &str, subject: String) -> Result<Self, SpeechEngineError> {
        info!(url, subject, "Connecting to speech engine over NATS");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| SpeechEngineError::Transport(format!("connect: {}", e)))?;
        Ok(Self { client, subject })
    }
}

#[async_trait]
impl SpeechEngine for NatsSpeechEngine {
    async fn transcribe(&self, payload: AudioPayload<'_>) -> Result<String, SpeechEngineError> {
        let b64 = base64::engine::general_purpose::STANDARD;

        let request = match payload {
            AudioPayload::Pcm {
                samples,
                sample_rate,
            } => {
                let pcm_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
                SpeechRequest {
                    pcm: Some(b64.encode(&pcm_bytes)),
                    sample_rate: Some(sample_rate),
                    data: None,
                    format: None,
                }
            }
            AudioPayload::Encoded { bytes, format_hint } => SpeechRequest {
                pcm: None,
                sample_rate: None,
                data: Some(b64.encode(bytes)),
                format: format_hint,
            },
        };

        let body = serde_json::to_vec(&request)
            .map_err(|e| SpeechEngineError::Transport(format!("encode: {}", e)))?;

        debug!(subject = %self.subject, bytes = body.len(), "Requesting transcription");

        let reply = self
            .client
            .request(self.subject.clone(), body.into())
            .await
            .map_err(|e| SpeechEngineError::Transport(format!("request: {}", e)))?;

        let parsed: SpeechReply = serde_json::from_slice(&reply.payload)
            .map_err(|e| SpeechEngineError::InvalidReply(e.to_string()))?;

        if let Some(error) = parsed.error {
            return Err(SpeechEngineError::Engine(error));
        }

        parsed
            .text
            .map(|t| t.trim().to_string())
            .ok_or_else(|| SpeechEngineError::InvalidReply("reply missing text".to_string()))
    }
}
