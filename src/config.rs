use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_ANSWER_DEBOUNCE_MS: u64 = 600;
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Client configuration, resolved from defaults, the build-time environment
/// and `LEXENT_*` runtime variables (in increasing precedence).
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(url)]
    pub api_base_url: String,
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
    pub default_retries: u32,
    pub answer_debounce_ms: u64,
    #[validate(range(min = 1))]
    pub tick_interval_ms: u64,
    /// Where the session store persists the token and caches.
    /// `None` keeps everything in memory.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: embedded_base_url().to_string(),
            request_timeout_ms: embedded_u64(option_env!("LEXENT_REQUEST_TIMEOUT_MS"), DEFAULT_TIMEOUT_MS),
            default_retries: embedded_u64(option_env!("LEXENT_DEFAULT_RETRIES"), 0) as u32,
            answer_debounce_ms: DEFAULT_ANSWER_DEBOUNCE_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            storage_path: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Failed to read configuration: {0}")]
    Source(#[from] ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl AppConfig {
    /// Loads `.env` (if any) and then reads `LEXENT_*` variables on top of the defaults.
    pub fn load() -> Result<Self, ConfigLoadError> {
        if dotenvy::dotenv().is_err() {
            info!("No .env file found, using process environment");
        }
        Self::from_env_source(Environment::with_prefix("LEXENT").try_parsing(true))
    }

    pub(crate) fn from_env_source(env: Environment) -> Result<Self, ConfigLoadError> {
        let defaults = AppConfig::default();
        let cfg: AppConfig = Config::builder()
            .set_default("api_base_url", defaults.api_base_url.clone())?
            .set_default("request_timeout_ms", defaults.request_timeout_ms)?
            .set_default("default_retries", u64::from(defaults.default_retries))?
            .set_default("answer_debounce_ms", defaults.answer_debounce_ms)?
            .set_default("tick_interval_ms", defaults.tick_interval_ms)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        cfg.validate()?;
        if cfg.api_base_url.ends_with('/') {
            warn!("api_base_url has a trailing slash; it will be stripped when joining paths");
        }
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn answer_debounce(&self) -> Duration {
        Duration::from_millis(self.answer_debounce_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn embedded_base_url() -> &'static str {
    match option_env!("LEXENT_API_BASE_URL") {
        Some(url) if !url.is_empty() => url,
        _ => DEFAULT_API_BASE_URL,
    }
}

fn embedded_u64(value: Option<&str>, fallback: u64) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}
