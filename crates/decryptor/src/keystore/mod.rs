//! Private-key retrieval: key-id sanitisation, the source trait and a bounded cache.
//!
//! # Lifecycle
//!
//! 1. The caller-supplied key id is validated as a single safe path segment
//!    ([`KeyId::parse`]) before it is ever concatenated into a parameter path.
//! 2. [`KeyMaterialSource::fetch`] returns the PEM in a [`PrivateKeyPem`], a
//!    zeroizing buffer that is overwritten when the last copy is dropped.
//! 3. When enabled, [`KeyCache`] keeps a copy for at most its TTL and drops it
//!    early whenever a decrypt failure implicates the key.
//!
//! # Security invariants
//!
//! - Key material is never logged; every `Debug` impl here redacts it.
//! - Nothing is written to disk.

pub mod cache;
pub mod ssm;

pub use cache::KeyCache;
pub use ssm::SsmKeySource;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use common::FailureKind;
use thiserror::Error;
use zeroize::Zeroizing;

/// Longest key id accepted from a caller.
pub const MAX_KEY_ID_LEN: usize = 128;

/// Errors produced while validating a caller-supplied key id.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyIdError {
    #[error("key id is empty")]
    Empty,

    #[error("key id is longer than {MAX_KEY_ID_LEN} characters")]
    TooLong,

    #[error("key id may only contain ASCII letters, digits, '-', '_' and '.'")]
    InvalidCharacter,

    #[error("key id must not be a relative path component")]
    Reserved,
}

/// A key id that is safe to embed as one segment of a parameter path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId(String);

impl KeyId {
    pub fn parse(raw: &str) -> Result<Self, KeyIdError> {
        if raw.is_empty() {
            return Err(KeyIdError::Empty);
        }
        if raw.len() > MAX_KEY_ID_LEN {
            return Err(KeyIdError::TooLong);
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(KeyIdError::InvalidCharacter);
        }
        if raw == "." || raw == ".." {
            return Err(KeyIdError::Reserved);
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{prefix}/{key_id}/private-key`, tolerating a trailing `/` on `prefix`.
    pub fn parameter_path(&self, prefix: &str) -> String {
        format!("{}/{}/private-key", prefix.trim_end_matches('/'), self.0)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// PEM-encoded RSA private key. Overwritten on drop.
#[derive(Clone)]
pub struct PrivateKeyPem(Zeroizing<String>);

impl PrivateKeyPem {
    pub fn new(pem: String) -> Self {
        Self(Zeroizing::new(pem))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKeyPem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyPem([REDACTED])")
    }
}

/// Errors produced by a [`KeyMaterialSource`].
#[derive(Debug, Error)]
pub enum KeySourceError {
    #[error("no private key stored at {path}")]
    NotFound { path: String },

    #[error("access to {path} denied ({code})")]
    AccessDenied { path: String, code: String },

    #[error("key store unavailable: {0}")]
    Unavailable(String),

    #[error("key fetch exceeded {0:?}")]
    Timeout(Duration),

    /// The client could not be built or the request could not be constructed.
    #[error("key store client error: {0}")]
    Client(String),
}

impl KeySourceError {
    pub fn kind(&self) -> FailureKind {
        match self {
            KeySourceError::NotFound { .. } => FailureKind::KeyNotFound,
            KeySourceError::AccessDenied { .. } => FailureKind::KeyAccessDenied,
            KeySourceError::Unavailable(_) | KeySourceError::Timeout(_) => {
                FailureKind::KeyStoreUnavailable
            }
            KeySourceError::Client(_) => FailureKind::InternalError,
        }
    }
}

/// Retrieves the private key for a key id. One network round trip per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyMaterialSource: Send + Sync {
    async fn fetch(&self, key_id: &KeyId) -> Result<PrivateKeyPem, KeySourceError>;
}
