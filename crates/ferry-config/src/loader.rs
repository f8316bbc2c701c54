//! Layered configuration loader.
//!
//! Later layers override earlier ones:
//! 1. Built-in defaults (or a preset)
//! 2. Configuration file (TOML or JSON)
//! 3. Environment variables

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{AuditPolicy, ConfigError, FerryConfig, LogFormat};

/// Configuration loader with layered approach.
///
/// # Example
///
/// ```no_run
/// use ferry_config::ConfigLoader;
///
/// # fn main() -> Result<(), ferry_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_file("ferry.toml")?
///     .with_env_prefix("FERRY")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: FerryConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader seeded with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: FerryConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = FerryConfig::default();
        self
    }

    /// Start with the development preset.
    ///
    /// # Example
    ///
    /// ```
    /// use ferry_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = FerryConfig::development();
        self
    }

    /// Start with the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = FerryConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Load configuration from a file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format ("toml" or "json").
    ///
    /// # Example
    ///
    /// ```
    /// use ferry_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [routing]
    ///     error_path = "/failed/"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.routing.error_path, "/failed/");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat(format.to_string()))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// Variables use the format `PREFIX__SECTION__KEY`, for example
    /// `FERRY__ROUTING__ERROR_PATH=/oops/`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply environment overrides, validate, and return the configuration.
    pub fn load(mut self) -> Result<FerryConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without validating it.
    #[must_use]
    pub fn load_unvalidated(self) -> FerryConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<FerryConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let env_vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();

        for (key, value) in env_vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(rest) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Err(ConfigError::env_override(key, "invalid key format"));
        };

        let parts: Vec<&str> = rest.split("__").collect();
        let flag = || parse_bool(value).ok_or_else(|| ConfigError::env_override(key, "expected boolean"));
        let optional = || (!value.is_empty()).then(|| value.to_string());

        match parts.as_slice() {
            ["SERVER", "HTTP_ADDR"] => self.config.server.http_addr = value.to_string(),
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_override(key, "expected integer"))?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = value
                    .parse()
                    .map_err(|_| ConfigError::env_override(key, "expected integer"))?;
            }
            ["SERVER", "MAX_BODY_BYTES"] => {
                self.config.server.max_body_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::env_override(key, "expected integer"))?;
            }
            ["SERVER", "HTTP2_ENABLED"] => self.config.server.http2_enabled = flag()?,

            ["ROUTING", "ERROR_PATH"] => self.config.routing.error_path = value.to_string(),

            ["TRUSTED_PROXY", "TRUST_X_FORWARDED_FOR"] => {
                self.config.trusted_proxy.trust_x_forwarded_for = flag()?;
            }
            ["TRUSTED_PROXY", "TRUST_X_REQUEST_ID"] => {
                self.config.trusted_proxy.trust_x_request_id = flag()?;
            }

            ["SYSTEM", "DISABLE_VALIDATOR"] => self.config.system.disable_validator = flag()?,
            ["SYSTEM", "DISABLE_EXTENSIONS"] => self.config.system.disable_extensions = flag()?,
            ["SYSTEM", "STRICT_NESTED"] => self.config.system.strict_nested = flag()?,
            ["SYSTEM", "DEBUG"] => self.config.system.debug = flag()?,

            ["AUTH", "ALGORITHM"] => self.config.auth.algorithm = value.to_uppercase(),
            ["AUTH", "SECRET"] => self.config.auth.secret = optional(),
            ["AUTH", "PUBLIC_KEY_PEM"] => self.config.auth.public_key_pem = optional(),
            ["AUTH", "BEARER"] => self.config.auth.bearer = flag()?,
            ["AUTH", "ACCESS_TOKEN_QUERY"] => self.config.auth.access_token_query = optional(),
            ["AUTH", "AUDIENCE"] => self.config.auth.audience = optional(),

            ["AUDIT", "POLICY"] => {
                self.config.audit.policy = match value.to_lowercase().as_str() {
                    "never" => AuditPolicy::Never,
                    "login" => AuditPolicy::Login,
                    "always" => AuditPolicy::Always,
                    _ => {
                        return Err(ConfigError::env_override(
                            key,
                            "expected 'never', 'login', or 'always'",
                        ))
                    }
                };
            }
            ["AUDIT", "BYTES_OUTPUT"] => self.config.audit.bytes_output = flag()?,
            ["AUDIT", "STRING_OUTPUT"] => self.config.audit.string_output = flag()?,

            ["TELEMETRY", "LOGGING", "ENABLED"] => {
                self.config.telemetry.logging.enabled = flag()?;
            }
            ["TELEMETRY", "LOGGING", "LEVEL"] => {
                self.config.telemetry.logging.level = value.to_string();
            }
            ["TELEMETRY", "LOGGING", "FORMAT"] => {
                self.config.telemetry.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_override(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "METRICS", "ENABLED"] => {
                self.config.telemetry.metrics.enabled = flag()?;
            }
            ["TELEMETRY", "METRICS", "ADDR"] => {
                self.config.telemetry.metrics.addr = value.to_string();
            }

            // Unknown keys are ignored so unrelated variables sharing the
            // prefix do not break startup.
            _ => {}
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
