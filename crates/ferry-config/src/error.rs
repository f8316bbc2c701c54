//! Errors raised while assembling a [`FerryConfig`](crate::FerryConfig).

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be loaded or validated.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `with_file` was pointed at a path that does not exist.
    #[error("no ferry configuration at {}", path.display())]
    Missing {
        /// The requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read ferry configuration at {}", path.display())]
    Unreadable {
        /// The requested path.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// File or string body in a format other than `toml` or `json`.
    #[error("ferry configuration must be toml or json, got {0}")]
    UnsupportedFormat(String),

    /// The toml body did not match the configuration sections.
    #[error("malformed toml in ferry configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// The json body did not match the configuration sections.
    #[error("malformed json in ferry configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A `.env` file exists but could not be parsed.
    #[error("cannot load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),

    /// A `FERRY__SECTION__KEY` override that names no setting or carries a bad value.
    #[error("environment override {var} rejected: {reason}")]
    EnvOverride {
        /// Full variable name, prefix included.
        var: String,
        /// What was expected.
        reason: String,
    },

    /// A loaded setting failed [`FerryConfig::validate`](crate::FerryConfig::validate).
    #[error("setting {key} is invalid: {reason}")]
    InvalidSetting {
        /// Dotted setting name, such as `routing.error_path`.
        key: &'static str,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn env_override(var: &str, reason: impl Into<String>) -> Self {
        Self::EnvOverride {
            var: var.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_setting(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key,
            reason: reason.into(),
        }
    }
}
