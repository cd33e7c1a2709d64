//! Failures surfaced by the IPAM backend client.

use thiserror::Error;

/// Any failed interaction with the backend.
///
/// The `Display` text is what the webhook caller receives in `msg`.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached (connect failure, timeout).
    #[error("Cannot connect to backend: {0}")]
    Unreachable(String),

    /// The backend answered with a body we could not use.
    #[error("Invalid response from backend: {0}")]
    ResponseInvalid(String),

    /// Anything else, including non-2xx statuses.
    #[error("Backend failure: {0}")]
    CallFailed(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            BackendError::Unreachable(e.to_string())
        } else if e.is_decode() {
            BackendError::ResponseInvalid(e.to_string())
        } else {
            BackendError::CallFailed(e.to_string())
        }
    }
}
