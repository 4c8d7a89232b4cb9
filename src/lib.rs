pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod insights;
pub mod media;
pub mod pipeline;
pub mod queue;
pub mod session;
pub mod temp;
pub mod transcribe;

pub use config::Config;
pub use dispatch::{
    DispatchOutcome, InlineDispatcher, QueuedDispatcher, Upload, WorkDispatcher, WorkOrder,
};
pub use error::PipelineError;
pub use http::{create_router, AppState};
pub use insights::{GeminiInsightModel, InsightBuilder, InsightModel, Insights, Sentiment};
pub use media::MediaFetcher;
pub use pipeline::{ProcessingPipeline, WorkResult};
pub use queue::{
    spawn_retention_sweeper, JobPayload, JobQueue, JobState, JobStore, RetentionPolicy, WorkerPool,
};
pub use session::{SessionEvent, SessionRegistry, StartAck};
pub use temp::{TempGuard, TempStore};
pub use transcribe::{
    AudioPayload, NatsSpeechEngine, SpeechEngine, SpeechEngineError, Transcriber,
    TranscriptionError,
};
