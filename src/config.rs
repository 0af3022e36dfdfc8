//! Application configuration module
//!
//! Provides configuration for the persistence layer (database and mirror
//! locations), the remote backup endpoint, and the completion provider.
//! Values default from the environment; tests override them via the builder.

use std::path::PathBuf;

use thiserror::Error;

/// Default remote backup API endpoint
const DEFAULT_DRIVE_BASE_URL: &str = "https://www.googleapis.com";

/// Default completion provider endpoint
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default completion model
const DEFAULT_GEMINI_MODEL: &str = "gemini-pro";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Local database file path
    pub db_path: PathBuf,
    /// Legacy mirror cache file path
    pub mirror_path: PathBuf,
    /// Remote backup API base URL
    pub drive_base_url: String,
    /// Completion provider base URL
    pub gemini_base_url: String,
    /// Completion provider API key
    pub gemini_api_key: Option<String>,
    /// Completion model name
    pub gemini_model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("smartchat");

        Self {
            db_path: data_dir.join("local.db"),
            mirror_path: data_dir.join("conversations.json"),
            drive_base_url: std::env::var("DRIVE_API_URL")
                .unwrap_or_else(|_| DEFAULT_DRIVE_BASE_URL.to_string()),
            gemini_base_url: std::env::var("GEMINI_API_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
        }
    }
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// The completion API key, required before any completion call
    pub fn require_gemini_api_key(&self) -> Result<&str, ConfigError> {
        self.gemini_api_key
            .as_deref()
            .ok_or(ConfigError::MissingValue("GEMINI_API_KEY"))
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    db_path: Option<PathBuf>,
    mirror_path: Option<PathBuf>,
    drive_base_url: Option<String>,
    gemini_base_url: Option<String>,
    gemini_api_key: Option<String>,
    gemini_model: Option<String>,
}

impl AppConfigBuilder {
    /// Set the local database file path
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = Some(path.into());
        self
    }

    /// Set the mirror cache file path
    pub fn mirror_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(path.into());
        self
    }

    /// Set the remote backup base URL
    pub fn drive_base_url(mut self, url: impl Into<String>) -> Self {
        self.drive_base_url = Some(url.into());
        self
    }

    /// Set the completion provider base URL
    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.gemini_base_url = Some(url.into());
        self
    }

    /// Set the completion provider API key
    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.gemini_api_key = Some(key.into());
        self
    }

    /// Set the completion model name
    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = Some(model.into());
        self
    }

    /// Build the configuration, falling back to environment defaults
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let defaults = AppConfig::default();
        Ok(AppConfig {
            db_path: self.db_path.unwrap_or(defaults.db_path),
            mirror_path: self.mirror_path.unwrap_or(defaults.mirror_path),
            drive_base_url: self.drive_base_url.unwrap_or(defaults.drive_base_url),
            gemini_base_url: self.gemini_base_url.unwrap_or(defaults.gemini_base_url),
            gemini_api_key: self.gemini_api_key.or(defaults.gemini_api_key),
            gemini_model: self.gemini_model.unwrap_or(defaults.gemini_model),
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
