//! IPAM relay - Scalr IP address webhooks backed by Infoblox.
//!
//! This library provides the modules behind the `ipam-relay` binary:
//! - `web`: signature verification and the axum handlers
//! - `events`: envelope parsing and routing to operations
//! - `operations`: acquire, release and static address acknowledgement
//! - `backend`: the authenticated Infoblox WAPI client
//!
//! ## Architecture
//!
//! ```text
//! Scalr → /infoblox/ → SignatureVerifier → EventRouter → operation → Infoblox WAPI
//! ```

pub mod backend;
pub mod config;
pub mod events;
pub mod operations;
pub mod web;

// Re-export commonly used types
pub use backend::{BackendClient, BackendError};
pub use config::Config;
pub use events::{parse_envelope, EventEnvelope, EventRouter, Operation};
pub use operations::WebhookResponse;
pub use web::{router, AppState, SignatureVerifier};
