//! `decryptor`: envelope-decryption function binary.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (OTEL + tracing).
//! 3. Wire the parameter-store key source, optional key cache and codec
//!    into the [`DecryptionService`].
//! 4. Build the Axum router and start the HTTP server.
//!
//! The parameter-store client is built lazily on the first key fetch.

mod aws;
mod config;
mod crypto;
mod keystore;
mod server;
mod service;
mod telemetry;

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use aws::ParameterStoreClient;
use config::Config;
use crypto::EnvelopeCodec;
use keystore::{KeyCache, SsmKeySource};
use server::state::AppState;
use service::{DecryptionService, PlaintextLogging, PLAINTEXT_LOG_TARGET};
use telemetry::{LogMetrics, MetricsSink, OtelMetrics};

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    let otlp_endpoint = cfg.otel_exporter_otlp_endpoint.as_deref();
    telemetry::init_telemetry(&cfg.service_name, otlp_endpoint, &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_port = cfg.listen_port,
        namespace = %cfg.key_namespace,
        key_parameter_prefix = %cfg.key_parameter_prefix,
        "decryptor starting"
    );

    let plaintext_logging = if cfg.log_decrypted_plaintext {
        warn!(
            target: PLAINTEXT_LOG_TARGET,
            security_sensitive = true,
            "LOG_DECRYPTED_PLAINTEXT is enabled: decrypted payloads will be logged at debug level"
        );
        PlaintextLogging::Unredacted
    } else {
        PlaintextLogging::Redacted
    };

    let metrics: Arc<dyn MetricsSink> = match otlp_endpoint {
        Some(_) => Arc::new(OtelMetrics::global(&cfg.service_name)),
        None => Arc::new(LogMetrics),
    };

    // -----------------------------------------------------------------------
    // 3. Decryption service
    // -----------------------------------------------------------------------
    let client = Arc::new(ParameterStoreClient::new(cfg.aws_region.clone()));
    let source = SsmKeySource::new(client, cfg.key_parameter_prefix.clone());
    let allow_list = cfg.suite_allow_list()?;
    info!(allowed_suites = allow_list.len(), "decrypt allow-list loaded");
    let codec = EnvelopeCodec::new(allow_list, cfg.max_encrypted_data_keys, cfg.max_envelope_bytes);

    let cache = KeyCache::from_settings(cfg.key_cache_capacity, cfg.key_cache_ttl());
    if let Some(cache) = &cache {
        info!(ttl_secs = cache.ttl().as_secs(), capacity = cfg.key_cache_capacity, "key cache enabled");
    }

    let service = DecryptionService::new(
        codec,
        Arc::new(source),
        metrics,
        cfg.key_namespace.clone(),
        cfg.key_fetch_timeout(),
    )
    .with_cache(cache)
    .with_plaintext_logging(plaintext_logging);

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let state = AppState::new(service, cfg.request_id_header.clone());
    let router = server::router::build(state);

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
