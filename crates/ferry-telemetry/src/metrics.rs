//! Prometheus request metrics.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `ferry_requests_total` | Counter | `route`, `status` |
//! | `ferry_request_duration_seconds` | Histogram | `route` |
//! | `ferry_extraction_failures_total` | Counter | `route` |
//!
//! Recording is a no-op until [`init_metrics`] installs a recorder.

use std::net::SocketAddr;
use std::time::Duration;

use ferry_config::MetricsConfig;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Installs the Prometheus recorder and its scrape listener.
///
/// Inside a Tokio runtime the exporter is spawned onto that runtime.
///
/// # Errors
///
/// Returns `TelemetryError` if the address is invalid or a recorder is
/// already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|source| TelemetryError::MetricsAddr {
            addr: config.addr.clone(),
            source,
        })?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metric_descriptions();

    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!("ferry_requests_total", "Total number of dispatched requests");
    describe_histogram!(
        "ferry_request_duration_seconds",
        "Request dispatch duration in seconds"
    );
    describe_counter!(
        "ferry_extraction_failures_total",
        "Requests rejected during input extraction or validation"
    );
}

/// Records a completed request.
pub fn record_request(route: &str, status_code: u16, duration: Duration) {
    counter!(
        "ferry_requests_total",
        "route" => route.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "ferry_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records a request whose input could not be extracted or validated.
pub fn record_extraction_failure(route: &str) {
    counter!(
        "ferry_extraction_failures_total",
        "route" => route.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_is_noop() {
        let config = MetricsConfig::default();
        assert!(!config.enabled);
        assert!(init_metrics(&config).is_ok());
    }

    #[test]
    fn test_invalid_address() {
        let config = MetricsConfig {
            enabled: true,
            addr: "not-an-address".to_string(),
        };
        assert!(matches!(
            init_metrics(&config),
            Err(TelemetryError::MetricsAddr { .. })
        ));
    }

    #[test]
    fn test_record_functions_dont_panic() {
        record_request("/widget/:id", 200, Duration::from_millis(10));
        record_extraction_failure("/widget/:id");
    }
}
