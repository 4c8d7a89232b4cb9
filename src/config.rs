use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub auth: AuthConfig,
    pub queue: QueueConfig,
    pub speech: SpeechConfig,
    pub insights: InsightConfig,
    pub temp: TempConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "scribeflow".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret required on every work-submission and query surface.
    /// Unset disables the check (local development only).
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// When true, submissions are queued and picked up by the worker pool;
    /// when false, requests are processed inline.
    pub enabled: bool,
    pub worker_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            worker_concurrency: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// NATS server the speech engine listens on.
    pub nats_url: String,
    pub subject: String,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            subject: "stt.transcribe".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InsightConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TempConfig {
    pub dir: String,
}

impl Default for TempConfig {
    fn default() -> Self {
        Self {
            dir: "temp".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SCRIBEFLOW").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_inline_mode_with_two_workers() {
        let cfg = Config::default();
        assert!(!cfg.queue.enabled);
        assert_eq!(cfg.queue.worker_concurrency, 2);
        assert_eq!(cfg.service.http.port, 3000);
        assert!(cfg.auth.bearer_token.is_none());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("scribeflow.toml");
        std::fs::write(
            &path,
            "[queue]\nenabled = true\nworker_concurrency = 4\n\n[auth]\nbearer_token = \"sekrit\"\n",
        )
        .unwrap();

        let cfg = Config::load(path.with_extension("").to_str().unwrap()).unwrap();
        assert!(cfg.queue.enabled);
        assert_eq!(cfg.queue.worker_concurrency, 4);
        assert_eq!(cfg.auth.bearer_token.as_deref(), Some("sekrit"));
        // Untouched sections keep their defaults.
        assert_eq!(cfg.speech.subject, "stt.transcribe");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::load("/definitely/not/there/scribeflow").unwrap();
        assert_eq!(cfg.service.name, "scribeflow");
    }
}
