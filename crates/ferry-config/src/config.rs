//! Main configuration types.
//!
//! This module provides the top-level [`FerryConfig`] struct and its builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AuditConfig, AuthConfig, RoutingConfig, ServerConfig, SystemConfig, TelemetryConfigSection,
    TrustedProxyConfig,
};

/// Algorithms accepted in `auth.algorithm`.
const ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512", "ES256", "RS256"];

/// Complete engine configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use ferry_config::FerryConfig;
///
/// let config = FerryConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.routing.error_path, "/error/");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FerryConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Routing configuration.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Trusted reverse-proxy headers.
    #[serde(default)]
    pub trusted_proxy: TrustedProxyConfig,

    /// Engine switches.
    #[serde(default)]
    pub system: SystemConfig,

    /// Token verification.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Audit log policy.
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,

    /// Per-extension configuration tables, keyed by extension name.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl FerryConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use ferry_config::{FerryConfig, ServerConfig};
    ///
    /// let config = FerryConfig::builder()
    ///     .server(ServerConfig {
    ///         http_addr: "127.0.0.1:3000".to_string(),
    ///         ..Default::default()
    ///     })
    ///     .build();
    ///
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    #[must_use]
    pub fn builder() -> FerryConfigBuilder {
        FerryConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - The server or metrics address is not a socket address
    /// - `routing.error_path` is empty
    /// - `auth.algorithm` is unknown, or its key material is missing
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(crate::ConfigError::invalid_setting(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            return Err(crate::ConfigError::invalid_setting(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        if self.routing.error_path.is_empty() {
            return Err(crate::ConfigError::invalid_setting(
                "routing.error_path",
                "must not be empty",
            ));
        }

        let algorithm = self.auth.algorithm.to_uppercase();
        if !ALGORITHMS.contains(&algorithm.as_str()) {
            return Err(crate::ConfigError::invalid_setting(
                "auth.algorithm",
                format!("expected one of {}", ALGORITHMS.join(", ")),
            ));
        }

        if algorithm.starts_with("HS") && self.auth.public_key_pem.is_some() {
            return Err(crate::ConfigError::invalid_setting(
                "auth.public_key_pem",
                "cannot be used with an HMAC algorithm; set auth.secret",
            ));
        }

        if !algorithm.starts_with("HS") && self.auth.secret.is_some() {
            return Err(crate::ConfigError::invalid_setting(
                "auth.secret",
                "requires an HMAC algorithm; set auth.public_key_pem",
            ));
        }

        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Pretty debug logging and debug mode enabled.
    ///
    /// # Example
    ///
    /// ```
    /// use ferry_config::FerryConfig;
    ///
    /// let config = FerryConfig::development();
    /// assert!(config.system.debug);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = crate::LogFormat::Pretty;
        config.telemetry.logging.span_events = true;
        config.system.debug = true;
        config
    }

    /// Create a production configuration preset.
    ///
    /// # Example
    ///
    /// ```
    /// use ferry_config::{FerryConfig, LogFormat};
    ///
    /// let config = FerryConfig::production();
    /// assert_eq!(config.telemetry.logging.format, LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = crate::LogFormat::Json;
        config.telemetry.metrics.enabled = true;
        config.system.debug = false;
        config
    }

    /// Returns the configuration table for the named extension, if present.
    #[must_use]
    pub fn extension(&self, name: &str) -> Option<&serde_json::Value> {
        self.extensions.get(name)
    }
}

/// Builder for [`FerryConfig`].
#[derive(Debug, Default)]
pub struct FerryConfigBuilder {
    config: FerryConfig,
}

impl FerryConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server configuration.
    #[must_use]
    pub fn server(mut self, server: ServerConfig) -> Self {
        self.config.server = server;
        self
    }

    /// Set the routing configuration.
    #[must_use]
    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.config.routing = routing;
        self
    }

    /// Set the trusted proxy configuration.
    #[must_use]
    pub fn trusted_proxy(mut self, trusted_proxy: TrustedProxyConfig) -> Self {
        self.config.trusted_proxy = trusted_proxy;
        self
    }

    /// Set the engine switches.
    #[must_use]
    pub fn system(mut self, system: SystemConfig) -> Self {
        self.config.system = system;
        self
    }

    /// Set the token verification configuration.
    #[must_use]
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.config.auth = auth;
        self
    }

    /// Set the audit configuration.
    #[must_use]
    pub fn audit(mut self, audit: AuditConfig) -> Self {
        self.config.audit = audit;
        self
    }

    /// Set the telemetry configuration.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Add a configuration table for an extension.
    #[must_use]
    pub fn extension(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.extensions.insert(name.into(), value);
        self
    }

    /// Build the configuration without validation.
    #[must_use]
    pub fn build(self) -> FerryConfig {
        self.config
    }

    /// Build and validate the configuration.
    pub fn build_validated(self) -> Result<FerryConfig, crate::ConfigError> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
