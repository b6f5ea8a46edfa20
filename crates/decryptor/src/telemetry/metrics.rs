//! Metric sink used by the decryption service.

use std::collections::HashMap;

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use tracing::{info, warn};

/// Successful decryptions.
pub const DECRYPTION_SUCCESS: &str = "DecryptionSuccess";
/// Failed decryptions, tagged with `failure_kind`.
pub const DECRYPTION_ERROR: &str = "DecryptionError";
/// Wall-clock time of key fetch plus decrypt, in milliseconds.
pub const DECRYPTION_DURATION_MS: &str = "DecryptionDurationMs";

pub const FAILURE_KIND_TAG: &str = "failure_kind";

/// Where counters and measurements go.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &'static str, value: u64, tags: &[(&'static str, &str)]);

    fn observe(&self, name: &'static str, value: f64);
}

/// Exports through the global OpenTelemetry meter provider.
pub struct OtelMetrics {
    counters: HashMap<&'static str, Counter<u64>>,
    histograms: HashMap<&'static str, Histogram<f64>>,
}

impl OtelMetrics {
    pub fn new(meter: &Meter) -> Self {
        let counters = [DECRYPTION_SUCCESS, DECRYPTION_ERROR]
            .into_iter()
            .map(|name| (name, meter.u64_counter(name).init()))
            .collect();
        let histograms = [DECRYPTION_DURATION_MS]
            .into_iter()
            .map(|name| (name, meter.f64_histogram(name).init()))
            .collect();
        Self {
            counters,
            histograms,
        }
    }

    /// Instruments on the global meter named after the service.
    pub fn global(service_name: &str) -> Self {
        let meter = opentelemetry::global::meter(service_name.to_owned());
        Self::new(&meter)
    }
}

impl MetricsSink for OtelMetrics {
    fn increment(&self, name: &'static str, value: u64, tags: &[(&'static str, &str)]) {
        let Some(counter) = self.counters.get(name) else {
            warn!(metric = name, "unregistered counter");
            return;
        };
        let attributes: Vec<KeyValue> = tags
            .iter()
            .map(|(k, v)| KeyValue::new(*k, v.to_string()))
            .collect();
        counter.add(value, &attributes);
    }

    fn observe(&self, name: &'static str, value: f64) {
        match self.histograms.get(name) {
            Some(histogram) => histogram.record(value, &[]),
            None => warn!(metric = name, "unregistered histogram"),
        }
    }
}

/// Emits each data point as a structured `metric` log event.
///
/// Used when no collector endpoint is configured; a log-based metric filter
/// can aggregate these.
#[derive(Debug, Default)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn increment(&self, name: &'static str, value: u64, tags: &[(&'static str, &str)]) {
        let tags: HashMap<&str, &str> = tags.iter().copied().collect();
        info!(target: "decryptor::metrics", metric = name, value, tags = ?tags, "metric");
    }

    fn observe(&self, name: &'static str, value: f64) {
        info!(target: "decryptor::metrics", metric = name, value, "metric");
    }
}
