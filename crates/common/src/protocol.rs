//! Event and reply shapes exchanged with the contact-center platform.
//!
//! Field names follow the platform's JSON exactly (`Details`, `ContactData`,
//! `status-code`, `contactId`, ...), so every type carries explicit renames.

use serde::{Deserialize, Serialize};

/// Parameter name carrying the base64 envelope.
pub const SECRET_PARAMETER: &str = "my-secret-string";

/// Parameter name carrying the key identifier.
pub const KEY_ID_PARAMETER: &str = "key-id";

/// Placeholder used when the platform omits the contact id.
pub const UNKNOWN_CONTACT: &str = "unknown";

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// The invocation event sent by the platform.
///
/// Every level is optional: a partially populated event must still be
/// answerable with a validation failure rather than a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "Details", default)]
    pub details: EventDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDetails {
    #[serde(rename = "ContactData", default)]
    pub contact_data: ContactData,
    #[serde(rename = "Parameters", default)]
    pub parameters: EventParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactData {
    #[serde(rename = "ContactId", default)]
    pub contact_id: Option<String>,
}

/// Flow parameters configured on the invoking block.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EventParameters {
    #[serde(rename = "my-secret-string", default)]
    pub secret: Option<String>,
    #[serde(rename = "key-id", default)]
    pub key_id: Option<String>,
}

impl std::fmt::Debug for EventParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The envelope is ciphertext, but there is no reason to echo it.
        f.debug_struct("EventParameters")
            .field("secret_len", &self.secret.as_ref().map(String::len))
            .field("key_id", &self.key_id)
            .finish()
    }
}

impl InboundEvent {
    /// Contact id, or [`UNKNOWN_CONTACT`] when absent.
    pub fn contact_id(&self) -> String {
        self.details
            .contact_data
            .contact_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_CONTACT.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Outbound reply
// ---------------------------------------------------------------------------

/// Reply returned to the platform for every invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformReply {
    /// 200 for anything the service handled, 500 for internal faults.
    #[serde(rename = "status-code")]
    pub status_code: u16,
    pub data: ReplyData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of [`PlatformReply`].
///
/// `decrypted_data` and `data_length` are present only on success.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyData {
    pub success: bool,
    pub message: String,
    pub contact_id: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_length: Option<usize>,
}

impl std::fmt::Debug for ReplyData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyData")
            .field("success", &self.success)
            .field("message", &self.message)
            .field("contact_id", &self.contact_id)
            .field("request_id", &self.request_id)
            .field(
                "decrypted_data",
                &self.decrypted_data.as_ref().map(|_| "[REDACTED]"),
            )
            .field("data_length", &self.data_length)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Body returned for requests that never reach the decryption path (e.g. 404).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code (e.g. `"not_found"`).
    pub code: String,
    /// Human-readable description safe to expose to callers.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// Number of algorithm suites currently accepted for decryption.
    pub allowed_suites: usize,
    /// Number of private keys held in the process-local cache.
    pub cached_keys: usize,
}
