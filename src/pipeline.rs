//! Shared processing pipeline
//!
//! One code path turns a job payload into `{transcript, insights}` whether it
//! runs inside a request (inline mode) or inside a worker (queued mode). The
//! payload's staged audio file, if any, is adopted here, so it is released on
//! every exit path of the unit of work that runs the pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::insights::{InsightBuilder, Insights};
use crate::media::{self, MediaFetcher};
use crate::queue::JobPayload;
use crate::temp::{TempGuard, TempStore};
use crate::transcribe::Transcriber;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    pub transcript: String,
    pub insights: Insights,
}

pub struct ProcessingPipeline {
    transcriber: Arc<Transcriber>,
    insights: Arc<InsightBuilder>,
    fetcher: MediaFetcher,
    temp: Arc<TempStore>,
}

impl ProcessingPipeline {
    pub fn new(
        transcriber: Arc<Transcriber>,
        insights: Arc<InsightBuilder>,
        temp: Arc<TempStore>,
    ) -> Self {
        Self {
            transcriber,
            insights,
            fetcher: MediaFetcher::new(),
            temp,
        }
    }

    pub async fn run(&self, payload: &JobPayload) -> Result<WorkResult, PipelineError> {
        if payload.is_empty() {
            return Err(PipelineError::Validation(
                "payload needs a transcript, an audio file, or an audio url".to_string(),
            ));
        }

        let mut transcript = payload.transcript.clone().unwrap_or_default();

        if let Some(path) = &payload.audio_path {
            // The staged file was handed off to this payload; adopt it so it
            // is removed whatever happens below.
            let staged = TempGuard::adopt(path);
            let text = self.transcriber.transcribe_path(staged.path()).await?;
            append_line(&mut transcript, &text);
        } else if let Some(url) = &payload.audio_url {
            let downloaded = self.fetcher.download(url, &self.temp).await?;
            let extracted = media::extract_audio(downloaded.path(), &self.temp).await?;
            drop(downloaded); // superseded by the extracted artifact
            let text = self.transcriber.transcribe_path(extracted.path()).await?;
            append_line(&mut transcript, &text);
        } else {
            debug!("Transcript-only payload, skipping transcription");
        }

        let insights = self.insights.build(&transcript).await;

        Ok(WorkResult {
            transcript,
            insights,
        })
    }
}

/// Join transcript pieces with a newline, skipping empty sides.
fn append_line(acc: &mut String, chunk: &str) {
    if chunk.is_empty() {
        return;
    }
    if !acc.is_empty() {
        acc.push('\n');
    }
    acc.push_str(chunk);
}
