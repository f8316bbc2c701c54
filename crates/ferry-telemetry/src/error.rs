//! Errors raised while installing logging and metrics.

use thiserror::Error;

/// Why telemetry could not be installed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// `telemetry.logging.level` is not a valid filter directive.
    #[error("telemetry.logging.level {directive:?} is not a valid filter")]
    LogFilter {
        /// The rejected directive.
        directive: String,
        /// Parser diagnostics.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// Another global subscriber won the race.
    #[error("a global tracing subscriber is already installed")]
    SubscriberInstalled(#[from] tracing_subscriber::util::TryInitError),

    /// `telemetry.metrics.addr` does not parse as a socket address.
    #[error("telemetry.metrics.addr {addr:?} is not a socket address")]
    MetricsAddr {
        /// The rejected address.
        addr: String,
        /// Parser diagnostics.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The Prometheus exporter could not start.
    #[error("cannot start the prometheus exporter: {0}")]
    Exporter(#[from] metrics_exporter_prometheus::BuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_addr_message() {
        let source = "nowhere".parse::<std::net::SocketAddr>().unwrap_err();
        let err = TelemetryError::MetricsAddr {
            addr: "nowhere".to_string(),
            source,
        };
        assert_eq!(
            err.to_string(),
            "telemetry.metrics.addr \"nowhere\" is not a socket address"
        );
    }
}
