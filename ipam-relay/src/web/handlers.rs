//! Webhook endpoint handlers.
//!
//! The `/infoblox/` handler runs the whole request lifecycle inline:
//! 1. Verify the signature (403, no body)
//! 2. Parse the envelope (400, no body)
//! 3. Route it to an operation and return its `WebhookResponse`
//!
//! Backend failures become a 500 carrying `{success: false, msg}`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::backend::BackendClient;
use crate::events::{parse_envelope, EventRouter, RouteError};
use crate::operations::WebhookResponse;
use crate::web::signature::SignatureVerifier;
use crate::Config;

/// Shared application state.
///
/// Built once at startup; nothing in it is mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub verifier: SignatureVerifier,
    pub router: EventRouter,
    pub backend: BackendClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let backend = BackendClient::from_config(&config)?;
        Ok(Self {
            verifier: SignatureVerifier::new(&config.signing_key, config.signature_max_age),
            router: EventRouter::new(config.domain_field.clone()),
            backend,
        })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Infoblox Webhook
// =============================================================================

/// Scalr IPAM webhook endpoint.
pub async fn infoblox_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    debug!(
        payload = %String::from_utf8_lossy(&body),
        body_length = body.len(),
        "webhook_received"
    );

    if !state.verifier.verify(&headers, &body, Utc::now()) {
        warn!("webhook_signature_rejected");
        return StatusCode::FORBIDDEN.into_response();
    }

    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "webhook_envelope_invalid");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match state.router.route(&envelope, &state.backend).await {
        Ok(response) => {
            debug!(response = ?response, "webhook_response");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(RouteError::Malformed(e)) => {
            warn!(
                event_name = %envelope.event_name,
                error = %e,
                "webhook_event_data_invalid"
            );
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(RouteError::Backend(e)) => {
            error!(
                event_name = %envelope.event_name,
                error = %e,
                "webhook_backend_failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::failure(e.to_string())),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Sample Backend
// =============================================================================

/// Canned host creation answer, for pointing `BACKEND_ENDPOINT` at this
/// service's own `/sample/` route during manual testing.
pub fn sample_host_record() -> Value {
    json!({
        "result": {
            "ipv4addrs": [
                { "ipv4addr": "10.0.0.10" }
            ]
        }
    })
}

/// Sample backend endpoint.
pub async fn sample_backend(Path(path): Path<String>) -> Json<Value> {
    debug!(path = %path, "sample_backend_request");
    Json(sample_host_record())
}
