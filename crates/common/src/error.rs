//! Failure taxonomy shared by the decryption core and the platform adapter.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every way a decryption request can fail.
///
/// Kinds are for operators (logs and metric tags). The caller always sees the
/// same reply shape; only [`FailureKind::status_code`] differs, and only for
/// [`FailureKind::InternalError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Missing or malformed request fields. Client-correctable.
    ValidationError,
    /// The ciphertext container is structurally invalid.
    MalformedEnvelope,
    /// The envelope names a cipher suite outside the decrypt allow-list.
    UnsupportedAlgorithm,
    /// No private key is stored under the derived parameter path.
    KeyNotFound,
    /// The key store refused access to the private key.
    KeyAccessDenied,
    /// Transport failure or timeout while talking to the key store.
    KeyStoreUnavailable,
    /// The envelope was not encrypted for this keyring's namespace and key name.
    KeyMismatch,
    /// The asymmetric unwrap did not produce a usable data key.
    UnwrapFailure,
    /// An integrity tag or signature did not verify. Never retried.
    AuthenticationFailure,
    /// Anything unanticipated.
    InternalError,
}

impl FailureKind {
    /// Stable identifier used as a metric tag and log field.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ValidationError => "ValidationError",
            FailureKind::MalformedEnvelope => "MalformedEnvelope",
            FailureKind::UnsupportedAlgorithm => "UnsupportedAlgorithm",
            FailureKind::KeyNotFound => "KeyNotFound",
            FailureKind::KeyAccessDenied => "KeyAccessDenied",
            FailureKind::KeyStoreUnavailable => "KeyStoreUnavailable",
            FailureKind::KeyMismatch => "KeyMismatch",
            FailureKind::UnwrapFailure => "UnwrapFailure",
            FailureKind::AuthenticationFailure => "AuthenticationFailure",
            FailureKind::InternalError => "InternalError",
        }
    }

    /// The `status-code` placed in the platform reply.
    ///
    /// Handled failures are 200 with `success: false`; only internal faults are 500.
    pub fn status_code(&self) -> u16 {
        match self {
            FailureKind::InternalError => 500,
            _ => 200,
        }
    }

    /// Generic message that is safe to return to the caller for this kind.
    pub fn caller_message(&self) -> &'static str {
        match self {
            FailureKind::ValidationError => "Invalid request parameters",
            FailureKind::InternalError => "Internal error",
            _ => "Decryption failed",
        }
    }

    /// Whether the platform may reasonably retry the whole invocation.
    ///
    /// Only key-store transport failures qualify; cryptographic verdicts are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::KeyStoreUnavailable)
    }

    /// Whether this failure suggests a cached private key is stale.
    pub fn implicates_key_material(&self) -> bool {
        matches!(
            self,
            FailureKind::KeyMismatch
                | FailureKind::UnwrapFailure
                | FailureKind::AuthenticationFailure
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure with a caller-safe message.
///
/// The message never contains key material, data keys or plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct DecryptionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl DecryptionFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Build a failure that only carries the generic message for `kind`.
    pub fn generic(kind: FailureKind) -> Self {
        Self::new(kind, kind.caller_message())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ValidationError, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(FailureKind::ValidationError.status_code(), 200);
        assert_eq!(FailureKind::AuthenticationFailure.status_code(), 200);
        assert_eq!(FailureKind::KeyStoreUnavailable.status_code(), 200);
        assert_eq!(FailureKind::InternalError.status_code(), 500);
    }

    #[test]
    fn only_key_store_outages_are_transient() {
        assert!(FailureKind::KeyStoreUnavailable.is_transient());
        assert!(!FailureKind::AuthenticationFailure.is_transient());
        assert!(!FailureKind::UnwrapFailure.is_transient());
    }

    #[test]
    fn display_includes_kind_and_message() {
        let e = DecryptionFailure::validation("Missing key ID parameter 'key-id'");
        let s = e.to_string();
        assert!(s.starts_with("ValidationError"));
        assert!(s.contains("key-id"));
    }

    #[test]
    fn generic_uses_caller_message() {
        let e = DecryptionFailure::generic(FailureKind::KeyNotFound);
        assert_eq!(e.message, "Decryption failed");
    }

    #[test]
    fn kind_serialises_as_identifier() {
        let json = serde_json::to_string(&FailureKind::KeyMismatch).unwrap();
        assert_eq!(json, "\"KeyMismatch\"");
    }
}
