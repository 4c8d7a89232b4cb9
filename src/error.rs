//! Pipeline-level error taxonomy
//!
//! Covers everything that can end a unit of work (one inline request or one
//! queued job). Insight degradation is deliberately absent: a flaky insight
//! engine produces default-valued fields, not a failed pipeline.

use crate::media::MediaError;
use crate::transcribe::TranscriptionError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("missing required input: {0}")]
    Validation(String),
    #[error("media fetch: {0}")]
    MediaFetch(String),
    #[error("audio extraction: {0}")]
    Extraction(String),
    #[error("transcription: {0}")]
    Transcription(#[from] TranscriptionError),
    #[error("queue unavailable: {0}")]
    Queue(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::Fetch(msg) => PipelineError::MediaFetch(msg),
            MediaError::Extract(msg) => PipelineError::Extraction(msg),
        }
    }
}
