//! Configuration schema types.
//!
//! Every section is `deny_unknown_fields` and fully defaulted, so a config
//! file only has to mention what it changes.

use serde::{Deserialize, Serialize};

/// Server configuration section.
///
/// Controls the listener, timeouts and request body limits.
///
/// # Example
///
/// ```
/// use ferry_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.shutdown_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP server bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Timeout for reading a request body, in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Serve HTTP/2 as well as HTTP/1.1 on the listener.
    #[serde(default)]
    pub http2_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            http2_enabled: false,
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Routing section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Location prefix used when an HTML route redirects on error.
    ///
    /// Coded errors append their code, so `/error/` becomes `/error/FORBIDDEN`.
    #[serde(default = "default_error_path")]
    pub error_path: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            error_path: default_error_path(),
        }
    }
}

fn default_error_path() -> String {
    "/error/".to_string()
}

/// Which forwarding headers set by a reverse proxy may be believed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TrustedProxyConfig {
    /// Use `X-Forwarded-For` as the client ip.
    #[serde(default)]
    pub trust_x_forwarded_for: bool,

    /// Use `X-Request-ID` as the request id.
    #[serde(default)]
    pub trust_x_request_id: bool,
}

/// Engine-wide switches.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    /// Skip the declarative validation pass after extraction.
    #[serde(default)]
    pub disable_validator: bool,

    /// Skip every registered extension hook.
    #[serde(default)]
    pub disable_extensions: bool,

    /// Propagate failures from nested record extraction instead of logging them.
    #[serde(default)]
    pub strict_nested: bool,

    /// Debug mode: honours the `.user` query parameter as the caller identity.
    #[serde(default)]
    pub debug: bool,
}

/// Cookie carrying a signed token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TokenCookieConfig {
    /// Cookie name.
    pub name: String,

    /// Required `aud` claim, if any.
    #[serde(default)]
    pub audience: Option<String>,
}

/// Bearer token and cookie verification.
///
/// Token issuance is out of scope; this section only describes how incoming
/// tokens are verified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Signature algorithm (`HS256`, `HS384`, `HS512`, `ES256`, `RS256`).
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Shared secret for the HMAC algorithms.
    #[serde(default)]
    pub secret: Option<String>,

    /// PEM encoded public key for the asymmetric algorithms.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Accept `Authorization: Bearer <token>`.
    #[serde(default = "default_true")]
    pub bearer: bool,

    /// Query parameter that may carry an access token.
    #[serde(default)]
    pub access_token_query: Option<String>,

    /// Required `aud` claim for access tokens.
    #[serde(default)]
    pub audience: Option<String>,

    /// Login cookie.
    #[serde(default)]
    pub login_cookie: Option<TokenCookieConfig>,

    /// Guest (session) cookie.
    #[serde(default)]
    pub guest_cookie: Option<TokenCookieConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: default_algorithm(),
            secret: None,
            public_key_pem: None,
            bearer: true,
            access_token_query: None,
            audience: None,
            login_cookie: None,
            guest_cookie: None,
        }
    }
}

impl AuthConfig {
    /// Returns `true` if key material has been configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.secret.is_some() || self.public_key_pem.is_some()
    }
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

/// When a call is written to the audit log automatically.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditPolicy {
    /// Only routes that opt in are audited.
    #[default]
    Never,
    /// Calls with a resolved user identity are audited.
    Login,
    /// Every call is audited.
    Always,
}

/// Audit section.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Global auto-audit policy.
    #[serde(default)]
    pub policy: AuditPolicy,

    /// Log byte outputs verbatim (base64) instead of omitting them.
    #[serde(default)]
    pub bytes_output: bool,

    /// Log string outputs verbatim instead of omitting them.
    #[serde(default)]
    pub string_output: bool,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines.
    #[default]
    Json,
    /// Human readable multi-line output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info", "ferry=debug,audit=info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Emit span open/close events.
    #[serde(default)]
    pub span_events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
            span_events: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Enable metrics collection and export.
    #[serde(default)]
    pub enabled: bool,

    /// Prometheus scrape endpoint address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Telemetry section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_policy_names() {
        let policy: AuditPolicy = serde_json::from_str("\"login\"").unwrap();
        assert_eq!(policy, AuditPolicy::Login);
        assert_eq!(serde_json::to_string(&AuditPolicy::Always).unwrap(), "\"always\"");
    }

    #[test]
    fn test_auth_defaults() {
        let auth = AuthConfig::default();
        assert_eq!(auth.algorithm, "HS256");
        assert!(auth.bearer);
        assert!(!auth.is_configured());
    }

    #[test]
    fn test_routing_default_error_path() {
        assert_eq!(RoutingConfig::default().error_path, "/error/");
    }

    #[test]
    fn test_server_unknown_field_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str("bogus = 1");
        assert!(result.is_err());
    }
}
