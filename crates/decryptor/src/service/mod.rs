//! Decryption Service: validate, decode, fetch key, unwrap, decrypt.
//!
//! # Order of checks
//!
//! 1. Both parameters present; key id a safe path segment.
//! 2. Base64 decode and size limit.
//! 3. Envelope structure, suite allow-list, keyring namespace match.
//! 4. Private key fetch, bounded by the configured timeout.
//! 5. RSA unwrap, header tag, frame tags, footer signature.
//!
//! Steps 1-3 make no network call, so malformed or misaddressed requests
//! never reach the key store. Nothing is retried: a transient key-store
//! failure is reported as `KeyStoreUnavailable` for the platform to retry.

pub mod types;

pub use types::{DecryptionOutcome, DecryptionRequest};

use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use common::protocol::{KEY_ID_PARAMETER, SECRET_PARAMETER};
use common::{DecryptionFailure, FailureKind};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::crypto::keyring::{ensure_wrapped_for, KeyringError, RawRsaKeyring};
use crate::crypto::{Envelope, EnvelopeCodec, EnvelopeError};
use crate::keystore::{KeyCache, KeyId, KeyIdError, KeyMaterialSource, KeySourceError, PrivateKeyPem};
use crate::telemetry::metrics::{
    MetricsSink, DECRYPTION_DURATION_MS, DECRYPTION_ERROR, DECRYPTION_SUCCESS, FAILURE_KIND_TAG,
};

/// Target of the opt-in plaintext log event.
pub const PLAINTEXT_LOG_TARGET: &str = "decryptor::unredacted_plaintext";

/// Standard alphabet; padding optional.
const ENVELOPE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Whether decrypted plaintext may be written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaintextLogging {
    #[default]
    Redacted,
    /// SECURITY: debug event on [`PLAINTEXT_LOG_TARGET`] per success.
    Unredacted,
}

/// Everything that can stop a decryption, with its internal detail.
#[derive(Debug, Error)]
enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("envelope is not valid base64")]
    Base64,

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    KeySource(#[from] KeySourceError),

    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
}

impl ServiceError {
    fn kind(&self) -> FailureKind {
        match self {
            ServiceError::Validation(_) => FailureKind::ValidationError,
            ServiceError::Base64 => FailureKind::MalformedEnvelope,
            ServiceError::Envelope(e) => e.kind(),
            ServiceError::Keyring(e) => e.kind(),
            ServiceError::KeySource(e) => e.kind(),
            ServiceError::NotUtf8 => FailureKind::InternalError,
        }
    }

    /// Caller-facing failure. Only validation messages are specific.
    fn to_failure(&self) -> DecryptionFailure {
        match self {
            ServiceError::Validation(message) => DecryptionFailure::validation(message.clone()),
            other => DecryptionFailure::generic(other.kind()),
        }
    }
}

pub struct DecryptionService {
    codec: EnvelopeCodec,
    source: Arc<dyn KeyMaterialSource>,
    cache: Option<KeyCache>,
    metrics: Arc<dyn MetricsSink>,
    namespace: String,
    key_fetch_timeout: Duration,
    plaintext_logging: PlaintextLogging,
}

impl DecryptionService {
    pub fn new(
        codec: EnvelopeCodec,
        source: Arc<dyn KeyMaterialSource>,
        metrics: Arc<dyn MetricsSink>,
        namespace: impl Into<String>,
        key_fetch_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            source,
            cache: None,
            metrics,
            namespace: namespace.into(),
            key_fetch_timeout,
            plaintext_logging: PlaintextLogging::Redacted,
        }
    }

    pub fn with_cache(mut self, cache: Option<KeyCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_plaintext_logging(mut self, policy: PlaintextLogging) -> Self {
        self.plaintext_logging = policy;
        self
    }

    pub fn allowed_suites(&self) -> usize {
        self.codec.allow_list().len()
    }

    pub async fn cached_keys(&self) -> usize {
        match &self.cache {
            Some(cache) => cache.len().await,
            None => 0,
        }
    }

    /// Decrypt one request. Never panics and never returns key material.
    #[tracing::instrument(
        skip_all,
        fields(contact_id = %request.contact_id, request_id = %request.request_id)
    )]
    pub async fn decrypt(&self, request: &DecryptionRequest) -> DecryptionOutcome {
        match self.run(request).await {
            Ok((plaintext, elapsed)) => {
                let outcome = DecryptionOutcome::success(plaintext);
                let duration_ms = elapsed.as_secs_f64() * 1000.0;
                self.metrics.increment(DECRYPTION_SUCCESS, 1, &[]);
                self.metrics.observe(DECRYPTION_DURATION_MS, duration_ms);
                if let DecryptionOutcome::Success {
                    plaintext,
                    plaintext_length,
                } = &outcome
                {
                    info!(plaintext_length, duration_ms, "decryption succeeded");
                    if self.plaintext_logging == PlaintextLogging::Unredacted {
                        debug!(
                            target: PLAINTEXT_LOG_TARGET,
                            security_sensitive = true,
                            contact_id = %request.contact_id,
                            request_id = %request.request_id,
                            plaintext = %plaintext,
                            "decrypted plaintext"
                        );
                    }
                }
                outcome
            }
            Err(err) => {
                let kind = err.kind();
                self.metrics
                    .increment(DECRYPTION_ERROR, 1, &[(FAILURE_KIND_TAG, kind.as_str())]);
                if kind == FailureKind::InternalError {
                    error!(failure_kind = %kind, error = %err, "decryption failed");
                } else {
                    warn!(
                        failure_kind = %kind,
                        transient = kind.is_transient(),
                        error = %err,
                        "decryption failed"
                    );
                }
                DecryptionOutcome::Failure(err.to_failure())
            }
        }
    }

    /// Returns the plaintext and the time spent from key fetch to decrypt.
    async fn run(&self, request: &DecryptionRequest) -> Result<(String, Duration), ServiceError> {
        let encoded = non_blank(request.encrypted_envelope.as_deref()).ok_or_else(|| {
            ServiceError::Validation(format!("Missing encrypted data parameter '{SECRET_PARAMETER}'"))
        })?;
        let raw_key_id = non_blank(request.key_id.as_deref()).ok_or_else(|| {
            ServiceError::Validation(format!("Missing key ID parameter '{KEY_ID_PARAMETER}'"))
        })?;
        let key_id = KeyId::parse(raw_key_id).map_err(|e: KeyIdError| {
            ServiceError::Validation(format!("Invalid key ID parameter '{KEY_ID_PARAMETER}': {e}"))
        })?;

        let bytes = self.decode_base64(encoded)?;
        let envelope = self.codec.decode(&bytes)?;
        ensure_wrapped_for(&envelope.header, &self.namespace, key_id.as_str())?;
        debug!(
            suite = %envelope.suite(),
            frames = envelope.frames.len(),
            "envelope decoded"
        );

        let started = Instant::now();
        let pem = self.key_material(&key_id).await?;
        let opened = self.open(&envelope, &key_id, &pem);
        drop(pem);

        let plaintext = match opened {
            Ok(plaintext) => plaintext,
            Err(err) => {
                if err.kind().implicates_key_material() {
                    self.evict(&key_id).await;
                }
                return Err(err);
            }
        };
        Ok((plaintext, started.elapsed()))
    }

    fn decode_base64(&self, encoded: &str) -> Result<Vec<u8>, ServiceError> {
        // Reject before allocating for an envelope that cannot fit the limit.
        let max_encoded = self.codec.max_envelope_bytes().div_ceil(3) * 4;
        if encoded.len() > max_encoded {
            return Err(EnvelopeError::TooLarge {
                size: encoded.len() / 4 * 3,
                max: self.codec.max_envelope_bytes(),
            }
            .into());
        }
        ENVELOPE_BASE64
            .decode(encoded)
            .map_err(|_| ServiceError::Base64)
    }

    async fn key_material(&self, key_id: &KeyId) -> Result<PrivateKeyPem, ServiceError> {
        if let Some(cache) = &self.cache {
            if let Some(pem) = cache.get(key_id).await {
                debug!(key_id = %key_id, "private key served from cache");
                return Ok(pem);
            }
        }

        let pem = tokio::time::timeout(self.key_fetch_timeout, self.source.fetch(key_id))
            .await
            .map_err(|_| KeySourceError::Timeout(self.key_fetch_timeout))??;

        if let Some(cache) = &self.cache {
            cache.insert(key_id, pem.clone()).await;
        }
        Ok(pem)
    }

    fn open(
        &self,
        envelope: &Envelope,
        key_id: &KeyId,
        pem: &PrivateKeyPem,
    ) -> Result<String, ServiceError> {
        let keyring = RawRsaKeyring::from_pem(&self.namespace, key_id.as_str(), pem.expose())?;
        let data_key = keyring.unwrap_data_key(&envelope.header)?;
        let plaintext = self.codec.decrypt(envelope, &data_key)?;
        std::str::from_utf8(&plaintext)
            .map(str::to_owned)
            .map_err(|_| ServiceError::NotUtf8)
    }

    async fn evict(&self, key_id: &KeyId) {
        if let Some(cache) = &self.cache {
            if cache.invalidate(key_id).await {
                info!(key_id = %key_id, "cached private key invalidated");
            }
        }
    }
}

impl std::fmt::Debug for DecryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionService")
            .field("codec", &self.codec)
            .field("cache", &self.cache)
            .field("namespace", &self.namespace)
            .field("key_fetch_timeout", &self.key_fetch_timeout)
            .field("plaintext_logging", &self.plaintext_logging)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
