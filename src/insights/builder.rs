use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::model::{InsightModel, InsightModelError};

const MAX_TOPICS: usize = 8;
const MAX_ACTION_ITEMS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f32,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            label: "neutral".to_string(),
            score: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub summary: String,
    pub topics: Vec<String>,
    pub action_items: Vec<String>,
    pub sentiment: Sentiment,
}

impl Insights {
    /// The all-defaults result for a build that could not even start.
    /// Distinguished from per-field degradation by the zero sentiment score.
    pub fn unavailable() -> Self {
        Self {
            summary: String::new(),
            topics: Vec::new(),
            action_items: Vec::new(),
            sentiment: Sentiment {
                label: "neutral".to_string(),
                score: 0.0,
            },
        }
    }
}

/// Builds the insight structure from a transcript.
///
/// Summary and sentiment read the full transcript and run concurrently;
/// topics and action items are derived from the summary and run concurrently
/// with each other once it resolves.
pub struct InsightBuilder {
    model: Arc<dyn InsightModel>,
}

impl InsightBuilder {
    pub fn new(model: Arc<dyn InsightModel>) -> Self {
        Self { model }
    }

    pub async fn build(&self, transcript: &str) -> Insights {
        match self.try_build(transcript).await {
            Ok(insights) => insights,
            Err(e) => {
                error!(error = %e, "Insight build unavailable");
                Insights::unavailable()
            }
        }
    }

    async fn try_build(&self, transcript: &str) -> Result<Insights, InsightModelError> {
        let (summary, sentiment) =
            tokio::join!(self.summarize(transcript), self.sentiment(transcript));
        let summary = summary?;
        let sentiment = sentiment?;

        let (topics, action_items) =
            tokio::join!(self.topics(&summary), self.action_items(&summary));

        Ok(Insights {
            summary,
            topics: topics?,
            action_items: action_items?,
            sentiment,
        })
    }

    /// Run one sub-call, degrading anything except a not-configured model to
    /// the given default. NotConfigured aborts the whole build before any
    /// other call can be billed.
    async fn degrading<T>(
        &self,
        step: &'static str,
        prompt: &str,
        default: T,
        parse: impl FnOnce(String) -> T,
    ) -> Result<T, InsightModelError> {
        match self.model.generate(prompt).await {
            Ok(raw) => Ok(parse(raw)),
            Err(InsightModelError::NotConfigured) => Err(InsightModelError::NotConfigured),
            Err(e) => {
                warn!(step, error = %e, "Insight sub-call degraded to default");
                Ok(default)
            }
        }
    }

    async fn summarize(&self, transcript: &str) -> Result<String, InsightModelError> {
        let prompt = format!(
            "You are a precise audio summarizer. Summarize the FULL transcript in <= 8 sentences.\n\
             Return plain text only (no JSON, no code fences).\n\n\
             FULL_TRANSCRIPT:\n{}",
            transcript
        );
        self.degrading("summary", &prompt, String::new(), |raw| {
            raw.trim().to_string()
        })
        .await
    }

    async fn topics(&self, summary: &str) -> Result<Vec<String>, InsightModelError> {
        let prompt = format!(
            "Given the audio summary below, list 3-8 topical tags as comma-separated values.\n\
             Plain text only. No quotes, no JSON, no code fences, no escape characters.\n\n\
             SUMMARY:\n{}",
            summary
        );
        self.degrading("topics", &prompt, Vec::new(), |raw| {
            split_list(&raw, MAX_TOPICS)
        })
        .await
    }

    async fn action_items(&self, summary: &str) -> Result<Vec<String>, InsightModelError> {
        let prompt = format!(
            "From the audio summary below, extract concrete action items as a comma-separated \
             list of short imperative phrases.\n\
             Plain text only. No JSON, no code fences, no escape characters.\n\n\
             SUMMARY:\n{}",
            summary
        );
        self.degrading("action_items", &prompt, Vec::new(), |raw| {
            split_list(&raw, MAX_ACTION_ITEMS)
        })
        .await
    }

    async fn sentiment(&self, transcript: &str) -> Result<Sentiment, InsightModelError> {
        let prompt = format!(
            "Return ONLY JSON with this exact shape and no extra text:\n\
             {{\"sentiment\": {{\"label\": \"positive|neutral|negative\", \"score\": 0.0}}}}\n\
             Score must be in [0,1]. No code fences.\n\n\
             FULL_TRANSCRIPT:\n{}",
            transcript
        );
        self.degrading("sentiment", &prompt, Sentiment::neutral(), parse_sentiment)
            .await
    }
}

fn split_list(raw: &str, cap: usize) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(cap)
        .map(str::to_string)
        .collect()
}

/// The model is told to return bare JSON but routinely wraps it in code
/// fences anyway; strip those before parsing. Anything unparseable after
/// that degrades to neutral.
fn parse_sentiment(raw: String) -> Sentiment {
    #[derive(Deserialize)]
    struct Envelope {
        sentiment: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        label: String,
        score: f32,
    }

    let stripped = strip_fences(raw.trim());
    match serde_json::from_str::<Envelope>(stripped) {
        Ok(envelope) if !envelope.sentiment.label.is_empty() => Sentiment {
            label: envelope.sentiment.label,
            score: envelope.sentiment.score,
        },
        _ => {
            warn!("Unparseable sentiment reply, defaulting to neutral");
            Sentiment::neutral()
        }
    }
}

fn strip_fences(raw: &str) -> &str {
    let raw = raw
        .strip_prefix("```json")
        .or_else(|| raw.strip_prefix("```"))
        .unwrap_or(raw);
    raw.strip_suffix("```").unwrap_or(raw).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted model: answers by prompt keyword, records prompts in order.
    struct ScriptedModel {
        summary: Result<String, InsightModelError>,
        topics: Result<String, InsightModelError>,
        action_items: Result<String, InsightModelError>,
        sentiment: Result<String, InsightModelError>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn healthy() -> Self {
            Self {
                summary: Ok("A short summary.".to_string()),
                topics: Ok("rust, audio, queues".to_string()),
                action_items: Ok("ship it, write docs".to_string()),
                sentiment: Ok(r#"{"sentiment":{"label":"positive","score":0.9}}"#.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn unreachable() -> Self {
            let err = || Err(InsightModelError::ApiRequestFailed("connection refused".into()));
            Self {
                summary: err(),
                topics: err(),
                action_items: err(),
                sentiment: err(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn unconfigured() -> Self {
            let err = || Err(InsightModelError::NotConfigured);
            Self {
                summary: err(),
                topics: err(),
                action_items: err(),
                sentiment: err(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl InsightModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, InsightModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = if prompt.contains("summarizer") {
                &self.summary
            } else if prompt.contains("topical tags") {
                &self.topics
            } else if prompt.contains("action items") {
                &self.action_items
            } else {
                &self.sentiment
            };
            reply.clone()
        }
    }

    #[tokio::test]
    async fn healthy_model_populates_every_field() {
        let builder = InsightBuilder::new(Arc::new(ScriptedModel::healthy()));
        let insights = builder.build("we talked about rust").await;

        assert_eq!(insights.summary, "A short summary.");
        assert_eq!(insights.topics, vec!["rust", "audio", "queues"]);
        assert_eq!(insights.action_items, vec!["ship it", "write docs"]);
        assert_eq!(insights.sentiment.label, "positive");
        assert!((insights.sentiment.score - 0.9).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn topics_and_action_items_are_derived_from_the_summary() {
        let model = Arc::new(ScriptedModel::healthy());
        let builder = InsightBuilder::new(model.clone());
        builder.build("raw transcript text").await;

        let prompts = model.prompts.lock().unwrap();
        let topics_prompt = prompts
            .iter()
            .find(|p| p.contains("topical tags"))
            .expect("topics prompt sent");
        assert!(
            topics_prompt.contains("A short summary."),
            "topics must read the summary, not the transcript"
        );
        let actions_prompt = prompts
            .iter()
            .find(|p| p.contains("action items"))
            .expect("action items prompt sent");
        assert!(actions_prompt.contains("A short summary."));
    }

    #[tokio::test]
    async fn unreachable_engine_degrades_every_field_independently() {
        let builder = InsightBuilder::new(Arc::new(ScriptedModel::unreachable()));
        let insights = builder.build("").await;

        assert_eq!(insights.summary, "");
        assert!(insights.topics.is_empty());
        assert!(insights.action_items.is_empty());
        assert_eq!(insights.sentiment, Sentiment::neutral());
    }

    #[tokio::test]
    async fn unconfigured_model_yields_the_unavailable_result() {
        let model = Arc::new(ScriptedModel::unconfigured());
        let builder = InsightBuilder::new(model.clone());
        let insights = builder.build("anything").await;

        assert_eq!(insights, Insights::unavailable());
        assert_eq!(insights.sentiment.score, 0.0);
        // The summary gate fails first; topics and action items are never requested.
        let prompts = model.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| !p.contains("topical tags")));
    }

    #[tokio::test]
    async fn one_failing_sub_call_does_not_sink_the_rest() {
        let mut model = ScriptedModel::healthy();
        model.topics = Err(InsightModelError::ApiRequestFailed("429".into()));
        let builder = InsightBuilder::new(Arc::new(model));
        let insights = builder.build("transcript").await;

        assert!(insights.topics.is_empty());
        assert_eq!(insights.summary, "A short summary.");
        assert_eq!(insights.action_items, vec!["ship it", "write docs"]);
    }

    #[test]
    fn split_list_trims_drops_empties_and_caps() {
        let items = split_list(" a , b ,, c , d ", 3);
        assert_eq!(items, vec!["a", "b", "c"]);
    }

    #[test]
    fn sentiment_parsing_tolerates_code_fences() {
        let fenced = "```json\n{\"sentiment\":{\"label\":\"negative\",\"score\":0.2}}\n```";
        let sentiment = parse_sentiment(fenced.to_string());
        assert_eq!(sentiment.label, "negative");
    }

    #[test]
    fn malformed_sentiment_defaults_to_neutral() {
        assert_eq!(parse_sentiment("not json".to_string()), Sentiment::neutral());
        assert_eq!(
            parse_sentiment(r#"{"sentiment":{"label":"","score":1.0}}"#.to_string()),
            Sentiment::neutral()
        );
    }
}
