//! Axum request handlers for all service endpoints.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use common::protocol::{ErrorResponse, HealthResponse, InboundEvent, PlatformReply, UNKNOWN_CONTACT};
use common::DecryptionFailure;
use tracing::warn;

use super::{adapter, state::AppState};

/// `POST /invoke`: decrypt the envelope named by the platform event.
///
/// Always answers HTTP 200; the reply's own `status-code` carries the
/// outcome. A body that is not an event is a validation failure.
pub async fn invoke(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Json<PlatformReply> {
    let request_id = headers
        .get(state.request_id_header.as_str())
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, failure_kind = "ValidationError", "unparsable event");
            return Json(adapter::failure_reply(
                DecryptionFailure::validation("Request body is not a valid event"),
                UNKNOWN_CONTACT.to_owned(),
                request_id,
            ));
        }
    };

    let request = adapter::to_request(event, request_id);
    let outcome = state.service.decrypt(&request).await;
    Json(adapter::to_reply(outcome, request.contact_id, request.request_id))
}

/// `GET /health`: liveness plus a summary of what the service will accept.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let allowed_suites = state.service.allowed_suites();
    let (status_code, status) = if allowed_suites > 0 {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };
    let body = HealthResponse {
        status: status.into(),
        allowed_suites,
        cached_keys: state.service.cached_keys().await,
    };
    (status_code, Json(body))
}

/// Catch-all 404 handler.
pub async fn not_found() -> impl IntoResponse {
    let err = ErrorResponse::new("not_found", "the requested resource does not exist");
    (StatusCode::NOT_FOUND, Json(err))
}
