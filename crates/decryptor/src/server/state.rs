//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::service::DecryptionService;

/// Application state shared across all request handlers.
///
/// Cloned per request; every field is `Arc`-backed.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DecryptionService>,
    /// Header carrying the invocation's request id.
    pub request_id_header: Arc<String>,
}

impl AppState {
    pub fn new(service: DecryptionService, request_id_header: String) -> Self {
        Self {
            service: Arc::new(service),
            request_id_header: Arc::new(request_id_header),
        }
    }
}
