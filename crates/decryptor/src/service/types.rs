//! Request and outcome of one decryption.

use common::{DecryptionFailure, FailureKind};

/// One decryption request, as built by the invocation adapter.
///
/// `key_id` and `encrypted_envelope` are optional here because their absence
/// is a validation outcome, not a parse error.
#[derive(Clone)]
pub struct DecryptionRequest {
    pub contact_id: String,
    pub request_id: String,
    pub key_id: Option<String>,
    pub encrypted_envelope: Option<String>,
}

impl std::fmt::Debug for DecryptionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptionRequest")
            .field("contact_id", &self.contact_id)
            .field("request_id", &self.request_id)
            .field("key_id", &self.key_id)
            .field(
                "encrypted_envelope_len",
                &self.encrypted_envelope.as_ref().map(String::len),
            )
            .finish()
    }
}

/// Result of [`super::DecryptionService::decrypt`].
#[derive(Clone, PartialEq, Eq)]
pub enum DecryptionOutcome {
    Success {
        plaintext: String,
        /// Length in Unicode scalar values.
        plaintext_length: usize,
    },
    Failure(DecryptionFailure),
}

impl DecryptionOutcome {
    pub fn success(plaintext: String) -> Self {
        let plaintext_length = plaintext.chars().count();
        DecryptionOutcome::Success {
            plaintext,
            plaintext_length,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DecryptionOutcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            DecryptionOutcome::Success { .. } => None,
            DecryptionOutcome::Failure(failure) => Some(failure.kind),
        }
    }
}

impl std::fmt::Debug for DecryptionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecryptionOutcome::Success {
                plaintext_length, ..
            } => f
                .debug_struct("Success")
                .field("plaintext", &"[REDACTED]")
                .field("plaintext_length", plaintext_length)
                .finish(),
            DecryptionOutcome::Failure(failure) => f.debug_tuple("Failure").field(failure).finish(),
        }
    }
}
