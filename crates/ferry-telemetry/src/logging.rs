//! Structured logging for Ferry.
//!
//! Installs a `tracing-subscriber` registry with a single formatting layer:
//! JSON lines in production, pretty output in development.
//!
//! Audit records go to the [`AUDIT_TARGET`] target so a subscriber can route
//! them to a separate sink with a filter such as `audit=info`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_config::LoggingConfig;
//! use ferry_telemetry::init_logging;
//!
//! init_logging(&LoggingConfig::default())?;
//! tracing::info!(http.path = "/widget/42", "request accepted");
//! ```

use ferry_config::{LogFormat, LoggingConfig};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Target used for audit records.
pub const AUDIT_TARGET: &str = "audit";

/// Initializes the logging subsystem.
///
/// # Errors
///
/// Returns `TelemetryError::LogFilter` if the level is not a valid filter and
/// `TelemetryError::SubscriberInstalled` if a global subscriber already exists.
pub fn init_logging(config: &LoggingConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let filter = create_env_filter(&config.level)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_filter(filter);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                ?;
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(span_events)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_filter(filter);

            tracing_subscriber::registry()
                .with(fmt_layer)
                .try_init()
                ?;
        }
    }

    Ok(())
}

/// Creates an env filter from a directive string.
///
/// # Errors
///
/// Returns an error if the directive is malformed.
pub fn create_env_filter(filter: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(filter).map_err(|source| TelemetryError::LogFilter {
        directive: filter.to_string(),
        source,
    })
}

/// Standard log field names.
pub mod fields {
    /// Request ID field name.
    pub const REQUEST_ID: &str = "request_id";

    /// HTTP method field name.
    pub const HTTP_METHOD: &str = "http.method";

    /// HTTP path field name.
    pub const HTTP_PATH: &str = "http.path";

    /// HTTP status field name.
    pub const HTTP_STATUS: &str = "http.status_code";

    /// Client ip field name.
    pub const CLIENT_IP: &str = "client_ip";

    /// Calling route of a sub-invocation.
    pub const CALLER: &str = "caller";

    /// Input field name (extraction diagnostics).
    pub const FIELD: &str = "field";

    /// Audited user id.
    pub const USER_ID: &str = "user_id";

    /// Audited display name.
    pub const DISPLAY_NAME: &str = "display_name";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_env_filter() {
        assert!(create_env_filter("info").is_ok());
        assert!(create_env_filter("ferry=debug,audit=info").is_ok());
    }

    #[test]
    fn test_invalid_filter() {
        assert!(matches!(
            create_env_filter("ferry=loudest"),
            Err(TelemetryError::LogFilter { ref directive, .. }) if directive == "ferry=loudest"
        ));
    }

    #[test]
    fn test_disabled_logging() {
        let config = LoggingConfig {
            enabled: false,
            ..Default::default()
        };

        assert!(init_logging(&config).is_ok());
    }
}
