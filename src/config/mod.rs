use garde::Validate;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "PETECHO_";

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ClientConfig {
    /// Base URL of the image generation backend (e.g., "https://petecho.zeabur.app").
    #[serde(default = "default_backend_url")]
    #[garde(length(min = 1, max = 2048))]
    pub backend_url: String,

    /// Maximum number of status checks per job before it is reported as timed out.
    #[serde(default = "default_poll_max_attempts")]
    #[garde(range(min = 1, max = 1000))]
    pub poll_max_attempts: u32,

    /// Delay between two status checks, in seconds.
    #[serde(default = "default_poll_interval_secs")]
    #[garde(range(min = 1, max = 300))]
    pub poll_interval_secs: u64,

    /// How often the waiting message rotates while a memorial photo is generating.
    #[serde(default = "default_waiting_message_secs")]
    #[garde(range(min = 1, max = 60))]
    pub waiting_message_secs: u64,

    /// Per-request HTTP timeout, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    #[garde(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    /// Directory for the best-effort local photo cache. Caching is off when unset.
    #[serde(default)]
    #[garde(skip)]
    pub cache_dir: Option<PathBuf>,
}

fn default_backend_url() -> String {
    "https://petecho.zeabur.app".to_string()
}

fn default_poll_max_attempts() -> u32 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_waiting_message_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            poll_max_attempts: default_poll_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            waiting_message_secs: default_waiting_message_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            cache_dir: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `PETECHO_*` environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::prefixed(ENV_PREFIX).from_env()?;
        config.validated()
    }

    /// Validate field ranges and normalize the backend URL.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.backend_url = self.backend_url.trim().trim_end_matches('/').to_string();
        self.validate()
            .map_err(|report| ConfigError::Invalid(report.to_string()))?;
        Ok(self)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn waiting_message_period(&self) -> Duration {
        Duration::from_secs(self.waiting_message_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
