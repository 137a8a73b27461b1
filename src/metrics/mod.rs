//! Write-path measurements of the log store.
//!
//! The store reports through the [`MetricsHook`] trait so that callers can
//! plug in their own sink; [`PrometheusMetrics`] feeds the histograms below.

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::debug;
use tracing::error;

use crate::constants::METRIC_LOGS_PER_BATCH;
use crate::constants::METRIC_LOG_BATCH_SIZE;
use crate::constants::METRIC_LOG_SIZE;
use crate::constants::METRIC_STORE_LOGS;
use crate::constants::METRIC_WRITE_CAPACITY;

#[cfg(test)]
use mockall::automock;

/// Receives one named measurement at a time.
#[cfg_attr(test, automock)]
pub trait MetricsHook: Send + Sync + 'static {
    fn record(
        &self,
        name: &'static str,
        value: f64,
    );
}

fn histogram(
    name: &str,
    help: &str,
    start: f64,
    count: usize,
) -> Histogram {
    Histogram::with_opts(
        HistogramOpts::new(name, help).buckets(exponential_buckets(start, 2.0, count).unwrap()),
    )
    .expect("metric can not be created")
}

lazy_static! {
    pub static ref LOG_SIZE_METRIC: Histogram =
        histogram("log_size_bytes", "Histogram of encoded log entry size in bytes", 16.0, 20);

    pub static ref LOGS_PER_BATCH_METRIC: Histogram =
        histogram("logs_per_batch", "Histogram of log entries per stored batch", 1.0, 14);

    pub static ref LOG_BATCH_SIZE_METRIC: Histogram =
        histogram("log_batch_size_bytes", "Histogram of stored batch size in bytes", 64.0, 20);

    pub static ref WRITE_CAPACITY_METRIC: Histogram = histogram(
        "write_capacity",
        "Histogram of log entries the store could write per second",
        1.0,
        24
    );

    pub static ref STORE_LOGS_DURATION_METRIC: Histogram =
        histogram("store_logs_duration_ms", "Histogram of store_logs duration in ms", 0.1, 16);

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry);
        registry
    };
}

fn register_custom_metrics(registry: &Registry) {
    for metric in [
        &*LOG_SIZE_METRIC,
        &*LOGS_PER_BATCH_METRIC,
        &*LOG_BATCH_SIZE_METRIC,
        &*WRITE_CAPACITY_METRIC,
        &*STORE_LOGS_DURATION_METRIC,
    ] {
        registry
            .register(Box::new(metric.clone()))
            .expect("collector can be registered");
    }
}

/// [`MetricsHook`] backed by the process-wide prometheus [`REGISTRY`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

impl MetricsHook for PrometheusMetrics {
    fn record(
        &self,
        name: &'static str,
        value: f64,
    ) {
        let metric: &Histogram = match name {
            METRIC_LOG_SIZE => &LOG_SIZE_METRIC,
            METRIC_LOGS_PER_BATCH => &LOGS_PER_BATCH_METRIC,
            METRIC_LOG_BATCH_SIZE => &LOG_BATCH_SIZE_METRIC,
            METRIC_WRITE_CAPACITY => &WRITE_CAPACITY_METRIC,
            METRIC_STORE_LOGS => &STORE_LOGS_DURATION_METRIC,
            other => {
                debug!("ignoring unknown metric {}", other);
                return;
            }
        };
        // Make sure the registry exists before the first observation
        lazy_static::initialize(&REGISTRY);
        metric.observe(value);
    }
}

/// Renders every registered metric in the prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    }
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

#[cfg(test)]
mod metrics_test;
