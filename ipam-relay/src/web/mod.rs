//! Web server module for the Scalr IPAM webhook.
//!
//! This module provides:
//! - `POST /infoblox/`: signed Scalr events, relayed to the IPAM backend
//! - `GET|POST /sample/*path`: canned backend answers for manual testing
//! - `GET /health`: liveness probe

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, infoblox_webhook, sample_backend, sample_host_record, AppState, HealthResponse,
};
pub use signature::{SignatureVerifier, DATE_HEADER, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/infoblox/", post(infoblox_webhook))
        .route("/sample/*path", get(sample_backend).post(sample_backend))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
