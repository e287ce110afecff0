//! Configuration module for chunkr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every option has a
//! documented default so a configuration only needs the destination `url`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Default maximum chunk size (6 MiB)
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 6 * 1024 * 1024;

/// Default number of chunks in flight at once
pub const DEFAULT_MAX_SIMULTANEOUS: usize = 3;

/// Default number of attempts per chunk
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// HTTP methods accepted by upload endpoints
const SUPPORTED_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Please provide a url destination")]
    MissingUrl,

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.upload.validate()
    }
}

/// Upload configuration
///
/// # Example
///
/// ```yaml
/// upload:
///   url: "https://api.example.com/v1/upload"
///   method: "POST"
///   max_chunk_size: 6291456
///   max_simultaneous: 3
///   max_attempts: 5
///   params:
///     api_key: "${API_KEY}"
///     upload_preset: "video_async"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// Destination URL. Required before an upload can start.
    #[serde(default)]
    pub url: Option<String>,

    /// HTTP method for every chunk request. Default: "POST"
    #[serde(default = "default_method")]
    pub method: String,

    /// Maximum bytes per chunk. Default: 6 MiB
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,

    /// Maximum chunks in flight at once. Default: 3
    #[serde(default = "default_max_simultaneous")]
    pub max_simultaneous: usize,

    /// Attempts per chunk before the upload fails. Default: 5
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Value of the X-Unique-Upload-Id header. A UUID v4 is generated if absent.
    #[serde(default)]
    pub session_id: Option<String>,

    /// Extra multipart form fields sent with every chunk
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Per-request timeout in seconds. Default: none
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            url: None,
            method: default_method(),
            max_chunk_size: default_max_chunk_size(),
            max_simultaneous: default_max_simultaneous(),
            max_attempts: default_max_attempts(),
            session_id: None,
            params: BTreeMap::new(),
            timeout_seconds: None,
        }
    }
}

impl UploadConfig {
    /// Create a configuration for `url` with every other option at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Validate the upload options
    ///
    /// Every other option is checked before the url, so a config without
    /// a url still has its limits and method validated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_options()?;

        let url = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => return Err(ConfigError::MissingUrl),
        };

        if !is_valid_http_url(url) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid url '{}': must start with http:// or https://",
                url
            )));
        }

        Ok(())
    }

    fn validate_options(&self) -> Result<(), ConfigError> {
        let method = self.method.to_ascii_uppercase();
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid method '{}': must be one of {}",
                self.method,
                SUPPORTED_METHODS.join(", ")
            )));
        }

        if self.max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_chunk_size must be greater than 0".into(),
            ));
        }

        if self.max_simultaneous == 0 {
            return Err(ConfigError::ValidationError(
                "max_simultaneous must be greater than 0".into(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "max_attempts must be greater than 0".into(),
            ));
        }

        if let Some(session_id) = &self.session_id {
            if session_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "session_id cannot be empty".into(),
                ));
            }
        }

        Ok(())
    }

    /// Per-request timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds.map(Duration::from_secs)
    }
}

fn default_method() -> String {
    "POST".to_string()
}

fn default_max_chunk_size() -> u64 {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_max_simultaneous() -> usize {
    DEFAULT_MAX_SIMULTANEOUS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format. Default: plain
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Validate the logging options
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}': must be trace, debug, info, warn or error",
                self.level
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
