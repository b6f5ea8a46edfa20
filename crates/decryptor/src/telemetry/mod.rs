//! Structured logging, optional OTLP export and the metric sink.
//!
//! Without `OTEL_EXPORTER_OTLP_ENDPOINT` the function logs JSON to stdout and
//! metrics are emitted as log events ([`metrics::LogMetrics`]).
//!
//! # Telemetry invariants
//!
//! - **No key material, data keys or plaintext** in any span attribute, metric
//!   label or log field. The single exception is the opt-in
//!   `decryptor::unredacted_plaintext` target, gated by `LOG_DECRYPTED_PLAINTEXT`.
//! - Log level is configurable via `LOG_LEVEL` (default: `info`).

pub mod init;
pub mod metrics;

pub use init::init_telemetry;
pub use metrics::{LogMetrics, MetricsSink, OtelMetrics};
