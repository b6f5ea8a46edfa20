//! Invocation shell: the platform event arrives as an HTTP request.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Translate platform events and replies ([`adapter`]).
//! - Inject shared application state (`AppState`) into handlers.

pub mod adapter;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
