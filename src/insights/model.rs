use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, thiserror::Error)]
pub enum InsightModelError {
    #[error("insight model not configured")]
    NotConfigured,
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Contract with the external insight engine: one prompt in, raw text out.
#[async_trait]
pub trait InsightModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InsightModelError>;
}

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Insight engine reached over the Gemini `generateContent` HTTP API.
pub struct GeminiInsightModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiInsightModel {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl InsightModel for GeminiInsightModel {
    async fn generate(&self, prompt: &str) -> Result<String, InsightModelError> {
        if self.api_key.is_empty() {
            return Err(InsightModelError::NotConfigured);
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        debug!(model = %self.model, prompt_chars = prompt.len(), "Requesting insight generation");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightModelError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(InsightModelError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InsightModelError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.trim().to_string())
            .ok_or_else(|| InsightModelError::InvalidResponse("empty candidates".to_string()))?;

        Ok(text)
    }
}
