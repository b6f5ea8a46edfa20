//! Translation between the platform's event/reply shapes and the service.

use common::protocol::{InboundEvent, PlatformReply, ReplyData};
use common::{DecryptionFailure, FailureKind};

use crate::service::{DecryptionOutcome, DecryptionRequest};

pub const SUCCESS_MESSAGE: &str = "Data decrypted successfully";

/// Short label placed in the reply's `error` field.
pub fn error_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::ValidationError => "Missing required parameter",
        FailureKind::InternalError => "Internal error",
        _ => "Decryption failed",
    }
}

pub fn to_request(event: InboundEvent, request_id: String) -> DecryptionRequest {
    let contact_id = event.contact_id();
    let parameters = event.details.parameters;
    DecryptionRequest {
        contact_id,
        request_id,
        key_id: parameters.key_id,
        encrypted_envelope: parameters.secret,
    }
}

pub fn to_reply(outcome: DecryptionOutcome, contact_id: String, request_id: String) -> PlatformReply {
    match outcome {
        DecryptionOutcome::Success {
            plaintext,
            plaintext_length,
        } => PlatformReply {
            status_code: 200,
            data: ReplyData {
                success: true,
                message: SUCCESS_MESSAGE.to_owned(),
                contact_id,
                request_id,
                decrypted_data: Some(plaintext),
                data_length: Some(plaintext_length),
            },
            error: None,
        },
        DecryptionOutcome::Failure(failure) => failure_reply(failure, contact_id, request_id),
    }
}

pub fn failure_reply(failure: DecryptionFailure, contact_id: String, request_id: String) -> PlatformReply {
    PlatformReply {
        status_code: failure.kind.status_code(),
        data: ReplyData {
            success: false,
            message: failure.message,
            contact_id,
            request_id,
            decrypted_data: None,
            data_length: None,
        },
        error: Some(error_label(failure.kind).to_owned()),
    }
}
