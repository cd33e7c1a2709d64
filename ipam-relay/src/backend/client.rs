//! Authenticated HTTP client for the Infoblox WAPI.

use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::error::BackendError;
use crate::Config;

/// Shared backend client.
///
/// Cloning is cheap, the underlying connection pool is shared.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    endpoint: String,
    user: String,
    pass: String,
}

impl BackendClient {
    /// Create a client for `endpoint`. Routes passed to [`call`](Self::call)
    /// are appended to it verbatim.
    pub fn new(
        endpoint: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
        verify_tls: bool,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            user: user.into(),
            pass: pass.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Self::new(
            config.backend_endpoint.clone(),
            config.backend_user.clone(),
            config.backend_pass.clone(),
            config.backend_verify,
            config.backend_timeout(),
        )
    }

    /// Send `payload` as JSON to `route` and return the parsed JSON answer.
    ///
    /// Non-2xx statuses are reported as [`BackendError::CallFailed`] with the
    /// status and body; nothing is retried.
    pub async fn call(
        &self,
        method: Method,
        route: &str,
        payload: &Value,
    ) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.endpoint, route);

        debug!(
            method = %method,
            url = %url,
            payload = %payload,
            "backend_request"
        );

        let start = Instant::now();
        let response = self
            .http
            .request(method.clone(), &url)
            .basic_auth(&self.user, Some(&self.pass))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                warn!(method = %method, url = %url, error = %e, "backend_request_failed");
                BackendError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        info!(
            method = %method,
            status_code = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "backend_response"
        );
        debug!(body = %body, "backend_response_body");

        if !status.is_success() {
            return Err(BackendError::CallFailed(format!(
                "{} returned {}: {}",
                method, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| BackendError::ResponseInvalid(e.to_string()))
    }
}
