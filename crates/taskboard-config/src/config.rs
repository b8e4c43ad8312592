//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API root. Endpoints are joined relative to it, so it must end in `/`.
pub const DEFAULT_API_BASE_URL: &str = match option_env!("TASKBOARD_API_URL") {
    Some(url) => url,
    None => "http://localhost:8000/api/v1/",
};

/// Default wall-clock timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Automatic retries for idempotent requests answered with a gateway/server error.
pub const DEFAULT_READ_RETRY_LIMIT: u32 = 3;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Client configuration loaded from `~/.taskboard/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, e.g. `https://tasks.example.com/api/v1/`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Per-request timeout in milliseconds. Expiry is reported as a transport failure.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retry budget for GET/PUT/DELETE on 500/502/503/504.
    #[serde(default = "default_read_retry_limit")]
    pub read_retry_limit: u32,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_read_retry_limit() -> u32 {
    DEFAULT_READ_RETRY_LIMIT
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            read_retry_limit: DEFAULT_READ_RETRY_LIMIT,
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// Load from the config file when it exists, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `TASKBOARD_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("TASKBOARD_API_URL") {
            self.api_base_url = url;
        }
        if let Some(level) = lookup("TASKBOARD_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(raw) = lookup("TASKBOARD_TIMEOUT_MS") {
            match raw.parse() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid TASKBOARD_TIMEOUT_MS"),
            }
        }
    }

    /// Reject values the client cannot work with.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.request_timeout_ms == 0 {
            return Err(CoreError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The API root as a parsed URL.
    ///
    /// A trailing `/` is required: without it `Url::join` would drop the last
    /// path segment of the root.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.api_base_url)?;
        if !url.path().ends_with('/') {
            return Err(CoreError::Config(format!(
                "api_base_url must end with '/': {}",
                self.api_base_url
            )));
        }
        Ok(url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
