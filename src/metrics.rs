//! Metric names and recording helpers.
//!
//! Everything goes through the `metrics` facade; nothing is recorded unless
//! an exporter was installed with [`init_metrics`].

use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    ApiRequests,
    ApiRequestDuration,
    LimiterDenied,
    StoreWrites,
    StoreWriteBytes,
    StoreErrors,
    IngestOutcomes,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::ApiRequests => "dyel_api_requests_total",
            MetricName::ApiRequestDuration => "dyel_api_request_duration_seconds",
            MetricName::LimiterDenied => "dyel_limiter_denied_total",
            MetricName::StoreWrites => "dyel_store_writes_total",
            MetricName::StoreWriteBytes => "dyel_store_write_bytes",
            MetricName::StoreErrors => "dyel_store_errors_total",
            MetricName::IngestOutcomes => "dyel_ingest_outcomes_total",
        };
        write!(f, "{}", name)
    }
}

pub mod api {
    use super::MetricName;

    pub fn request(operation: &'static str, outcome: &'static str, duration_secs: f64) {
        ::metrics::counter!(
            MetricName::ApiRequests.to_string(),
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        ::metrics::histogram!(MetricName::ApiRequestDuration.to_string(), "operation" => operation)
            .record(duration_secs);
    }
}

pub mod limiter {
    use super::MetricName;

    pub fn denied(limit_set: &str) {
        ::metrics::counter!(MetricName::LimiterDenied.to_string(), "limit_set" => limit_set.to_string())
            .increment(1);
    }
}

pub mod store {
    use super::MetricName;

    pub fn write(backend: &'static str, bytes: usize) {
        ::metrics::counter!(MetricName::StoreWrites.to_string(), "backend" => backend).increment(1);
        ::metrics::histogram!(MetricName::StoreWriteBytes.to_string(), "backend" => backend)
            .record(bytes as f64);
    }

    pub fn error(backend: &'static str, operation: &'static str) {
        ::metrics::counter!(
            MetricName::StoreErrors.to_string(),
            "backend" => backend,
            "operation" => operation
        )
        .increment(1);
    }
}

pub mod ingest {
    use super::MetricName;

    pub fn outcome(kind: &'static str, outcome: &'static str) {
        ::metrics::counter!(
            MetricName::IngestOutcomes.to_string(),
            "kind" => kind,
            "outcome" => outcome
        )
        .increment(1);
    }
}

/// Installs the Prometheus exporter on `0.0.0.0:<port>`.
pub fn init_metrics(port: u16) {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(%addr, "Prometheus exporter listening on /metrics"),
        Err(e) => tracing::warn!(%addr, error = %e, "Prometheus exporter install failed"),
    }
}
