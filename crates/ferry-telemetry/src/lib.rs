//! Observability for Ferry services.
//!
//! - **Logging**: structured JSON or pretty output through `tracing-subscriber`
//! - **Audit**: audit records under the [`AUDIT_TARGET`] target
//! - **Metrics**: Prometheus request counters via the `metrics` crate
//!
//! # Example
//!
//! ```rust,ignore
//! use ferry_config::FerryConfig;
//! use ferry_telemetry::init_telemetry;
//!
//! let config = FerryConfig::production();
//! init_telemetry(&config.telemetry)?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

use ferry_config::TelemetryConfigSection;

pub use error::TelemetryError;
pub use logging::{init_logging, AUDIT_TARGET};
pub use metrics::{init_metrics, record_extraction_failure, record_request};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfigSection) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_config::{LoggingConfig, MetricsConfig};

    #[test]
    fn test_init_telemetry_disabled() {
        let config = TelemetryConfigSection {
            logging: LoggingConfig {
                enabled: false,
                ..Default::default()
            },
            metrics: MetricsConfig::default(),
        };
        assert!(init_telemetry(&config).is_ok());
    }
}
