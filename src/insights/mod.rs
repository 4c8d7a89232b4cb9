//! Insight generation
//!
//! Derives {summary, topics, action items, sentiment} from a transcript by
//! fanning out prompts to an external text model. Summary gates topics and
//! action items; sentiment reads the full transcript independently. Each
//! sub-call degrades to a neutral default on its own, so a flaky model never
//! sinks the whole build.

mod builder;
mod model;

pub use builder::{InsightBuilder, Insights, Sentiment};
pub use model::{GeminiInsightModel, InsightModel, InsightModelError};
