//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup and shared read-only afterwards.

use std::env;
use std::fmt;
use std::time::Duration;

use tracing::warn;

/// Maximum time between the moment a request is signed and the moment
/// its signature stops being valid.
pub const SIGNATURE_MAX_AGE_SECS: u64 = 300;

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Shared key Scalr signs webhook requests with
    pub signing_key: String,

    /// Name of the event data field holding the server's domain
    pub domain_field: String,

    /// Base URL of the Infoblox WAPI, routes are appended verbatim
    pub backend_endpoint: String,

    /// Basic-auth user for the backend
    pub backend_user: String,

    /// Basic-auth password for the backend
    pub backend_pass: String,

    /// Whether the backend's TLS certificate is verified
    pub backend_verify: bool,

    /// Per-call timeout for backend requests in milliseconds
    pub backend_timeout_ms: u64,

    /// Port for the web server to listen on
    pub port: u16,

    /// Maximum accepted clock skew for signed requests, in seconds
    pub signature_max_age: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            signing_key: env::var("SCALR_SIGNING_KEY").unwrap_or_default(),

            domain_field: env::var("DOMAIN_GV").unwrap_or_else(|_| "DOMAIN_NAME".to_string()),

            backend_endpoint: env::var("BACKEND_ENDPOINT").unwrap_or_default(),

            backend_user: env::var("BACKEND_USER").unwrap_or_default(),

            backend_pass: env::var("BACKEND_PASS").unwrap_or_default(),

            backend_verify: parse_flag(env::var("BACKEND_VERIFY").ok().as_deref()),

            backend_timeout_ms: env::var("BACKEND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),

            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),

            signature_max_age: SIGNATURE_MAX_AGE_SECS,
        }
    }

    /// Backend call timeout as a `Duration`.
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_timeout_ms)
    }

    /// Log suspicious settings. Nothing here is fatal, the service still starts.
    pub fn warn_on_suspicious(&self) {
        if self.signing_key.is_empty() {
            warn!("config_signing_key_empty");
        }

        if self.backend_endpoint.is_empty() {
            warn!("config_backend_endpoint_empty");
        } else if let Err(e) = url::Url::parse(&self.backend_endpoint) {
            warn!(
                backend_endpoint = %self.backend_endpoint,
                error = %e,
                "config_backend_endpoint_invalid"
            );
        } else if !self.backend_endpoint.ends_with('/') {
            warn!(
                backend_endpoint = %self.backend_endpoint,
                "config_backend_endpoint_no_trailing_slash"
            );
        }

        if !self.backend_verify {
            warn!("config_backend_tls_verification_disabled");
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("signing_key_set", &!self.signing_key.is_empty())
            .field("domain_field", &self.domain_field)
            .field("backend_endpoint", &self.backend_endpoint)
            .field("backend_user", &self.backend_user)
            .field("backend_pass", &mask(&self.backend_pass))
            .field("backend_verify", &self.backend_verify)
            .field("backend_timeout_ms", &self.backend_timeout_ms)
            .field("port", &self.port)
            .field("signature_max_age", &self.signature_max_age)
            .finish()
    }
}

/// Only a case-insensitive `true` enables the flag; unset means enabled.
fn parse_flag(raw: Option<&str>) -> bool {
    match raw {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => true,
    }
}

/// Replace every character of a secret with `*`.
pub fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}
