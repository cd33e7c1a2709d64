//! Address operations executed on behalf of Scalr events.
//!
//! Each operation produces a [`WebhookResponse`]; backend failures are
//! returned as [`BackendError`] for the web layer to turn into a 500.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::backend::{BackendClient, BackendError};

/// Route creating a host record and returning its addresses.
pub const CREATE_HOST_ROUTE: &str =
    "record:host?_return_fields%2B=name,ipv4addrs&_return_as_object=1";

/// Device type reported for every host created by the relay.
pub const DEVICE_TYPE: &str = "VM";

/// Body returned to Scalr, whatever operation produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl WebhookResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ip_address: None,
            msg: None,
        }
    }

    pub fn allocated(ip_address: Option<String>) -> Self {
        Self {
            ip_address,
            ..Self::ok()
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Acknowledge an event without acting on it.
    pub fn unhandled() -> Self {
        Self {
            success: false,
            ip_address: None,
            msg: None,
        }
    }

    pub fn failure(msg: impl Into<String>) -> Self {
        Self::unhandled().with_msg(msg)
    }
}

/// Inputs for allocating an address from a subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireRequest {
    pub subnet: String,
    pub hostname: String,
    pub domain: Option<String>,
    pub device_type: String,
    pub description: String,
    pub vendor: Option<String>,
    pub location: Option<String>,
}

impl AcquireRequest {
    pub fn fqdn(&self) -> String {
        fqdn(&self.hostname, self.domain.as_deref())
    }

    /// Host record creation payload.
    pub fn payload(&self) -> Value {
        json!({
            "name": self.fqdn(),
            "device_type": self.device_type,
            "device_description": self.description,
            "device_vendor": self.vendor,
            "device_location": self.location,
            "configure_for_dns": false,
            "ipv4addrs": [
                { "ipv4addr": format!("func:nextavailableip:{}", self.subnet) }
            ],
        })
    }
}

/// Inputs for releasing the address held by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub hostname: String,
    pub domain: Option<String>,
}

impl ReleaseRequest {
    pub fn fqdn(&self) -> String {
        fqdn(&self.hostname, self.domain.as_deref())
    }
}

/// Join hostname and domain, lower-cased. An absent or empty domain leaves
/// the hostname alone.
pub fn fqdn(hostname: &str, domain: Option<&str>) -> String {
    match domain.filter(|d| !d.is_empty()) {
        Some(domain) => format!("{}.{}", hostname, domain).to_lowercase(),
        None => hostname.to_lowercase(),
    }
}

/// Create a host record on the next free address of the subnet.
pub async fn acquire_address(
    backend: &BackendClient,
    request: &AcquireRequest,
) -> Result<WebhookResponse, BackendError> {
    info!(
        fqdn = %request.fqdn(),
        subnet = %request.subnet,
        "acquire_address_start"
    );

    let result = backend
        .call(Method::POST, CREATE_HOST_ROUTE, &request.payload())
        .await?;

    let ip_address = first_ipv4(&result).ok_or_else(|| {
        BackendError::ResponseInvalid(format!("no IPv4 address in host record {}", result))
    })?;

    info!(
        fqdn = %request.fqdn(),
        ip_address = %ip_address,
        "acquire_address_complete"
    );

    Ok(WebhookResponse::allocated(Some(ip_address.to_string())))
}

/// `result.ipv4addrs[0].ipv4addr` of a host creation answer.
fn first_ipv4(result: &Value) -> Option<&str> {
    result
        .get("result")?
        .get("ipv4addrs")?
        .as_array()?
        .first()?
        .get("ipv4addr")?
        .as_str()
}

/// Delete the host record matching the request's FQDN.
///
/// A missing record is not an error, so releasing twice is harmless.
pub async fn release_address(
    backend: &BackendClient,
    request: &ReleaseRequest,
) -> Result<WebhookResponse, BackendError> {
    let fqdn = request.fqdn();
    info!(fqdn = %fqdn, "release_address_start");

    let encoded: String = url::form_urlencoded::byte_serialize(fqdn.as_bytes()).collect();
    let found = backend
        .call(Method::GET, &format!("record:host?name={}", encoded), &json!({}))
        .await?;

    let reference = match &found {
        Value::Null => None,
        Value::Array(records) => match records.first() {
            None => None,
            Some(record) => Some(record.get("_ref").and_then(Value::as_str).ok_or_else(|| {
                BackendError::ResponseInvalid(format!("host record without _ref: {}", record))
            })?),
        },
        other => {
            return Err(BackendError::ResponseInvalid(format!(
                "expected a list of host records, got {}",
                other
            )))
        }
    };

    let Some(reference) = reference else {
        info!(fqdn = %fqdn, "release_address_no_match");
        return Ok(WebhookResponse::ok()
            .with_msg(format!("No host removed as none matched {}", fqdn)));
    };

    let deleted = backend.call(Method::DELETE, reference, &json!({})).await?;

    info!(fqdn = %fqdn, reference = %reference, "release_address_complete");
    debug!(response = %deleted, "release_address_backend_response");

    Ok(WebhookResponse::ok())
}

/// Hand back an address the platform manages itself.
pub fn static_address_ack(static_address: Option<&str>) -> WebhookResponse {
    info!(ip_address = ?static_address, "static_address_ack");
    WebhookResponse::allocated(static_address.map(str::to_string))
}
