//! Scalr event envelopes and their routing to address operations.
//!
//! ## Routing
//!
//! ```text
//! AllocateIpAddressRequest   + INFOBLOX_STATIC → StaticAddressAck
//! AllocateIpAddressRequest                     → AcquireAddress
//! DeregisterIpAddressRequest + INFOBLOX_STATIC → success, no backend call
//! DeregisterIpAddressRequest                   → ReleaseAddress
//! RegisterIpAddressRequest                     → success, no backend call
//! anything else                                → success = false
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{BackendClient, BackendError};
use crate::operations::{
    acquire_address, release_address, static_address_ack, AcquireRequest, ReleaseRequest,
    WebhookResponse, DEVICE_TYPE,
};

/// Data key marking a server whose address is managed by the platform.
pub const STATIC_ADDRESS_KEY: &str = "INFOBLOX_STATIC";

pub const HOSTNAME_KEY: &str = "SCALR_SERVER_HOSTNAME";
pub const ROLE_NAME_KEY: &str = "SCALR_ROLE_NAME";
pub const SERVER_DESCRIPTION_KEY: &str = "ServerDescription";
pub const CLOUD_PLATFORM_KEY: &str = "SCALR_CLOUD_PLATFORM";
pub const CLOUD_LOCATION_KEY: &str = "SCALR_CLOUD_LOCATION";
pub const IP_ADDRESS_KEY: &str = "SCALR_IP_ADDRESS";

const REQUIRED_KEYS: [&str; 3] = ["eventName", "data", "userData"];

/// Why a request body could not be turned into an operation.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("envelope is missing the '{0}' key")]
    MissingField(&'static str),

    #[error("envelope has an unexpected shape: {0}")]
    InvalidShape(#[source] serde_json::Error),

    #[error("event data is missing '{0}'")]
    MissingData(&'static str),

    #[error("userData must be a subnet string, got {0}")]
    InvalidSubnet(Value),
}

/// Failure while routing an envelope.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Malformed(#[from] EnvelopeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Inbound Scalr event.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "eventName")]
    pub event_name: String,
    /// Global variables of the server. Values are platform-defined and
    /// may be null or non-string.
    pub data: HashMap<String, Value>,
    /// Subnet to allocate from; only read by allocation.
    #[serde(rename = "userData")]
    pub user_data: Value,
}

impl EventEnvelope {
    /// Value of a data key as text. Numbers and booleans are rendered,
    /// null, objects and arrays read as absent.
    pub fn field(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

/// Parse a raw request body into an envelope.
pub fn parse_envelope(body: &[u8]) -> Result<EventEnvelope, EnvelopeError> {
    let value: Value = serde_json::from_slice(body).map_err(EnvelopeError::InvalidJson)?;

    let Some(object) = value.as_object() else {
        return Err(EnvelopeError::MissingField(REQUIRED_KEYS[0]));
    };

    if let Some(missing) = REQUIRED_KEYS.iter().find(|k| !object.contains_key(**k)) {
        return Err(EnvelopeError::MissingField(*missing));
    }

    serde_json::from_value(value).map_err(EnvelopeError::InvalidShape)
}

/// Operation selected for an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    StaticAddressAck { ip_address: Option<String> },
    AcquireAddress(AcquireRequest),
    /// Static addresses were never registered with the backend.
    StaticRelease,
    ReleaseAddress(ReleaseRequest),
    /// The address was already registered during allocation.
    Register { ip_address: Option<String> },
    Unhandled { event_name: String },
}

impl Operation {
    /// Execute the operation, calling the backend when it needs to.
    pub async fn execute(self, backend: &BackendClient) -> Result<WebhookResponse, BackendError> {
        match self {
            Operation::StaticAddressAck { ip_address } => {
                Ok(static_address_ack(ip_address.as_deref()))
            }
            Operation::AcquireAddress(request) => acquire_address(backend, &request).await,
            Operation::StaticRelease => {
                info!("static_release_ignored");
                Ok(WebhookResponse::ok())
            }
            Operation::ReleaseAddress(request) => release_address(backend, &request).await,
            Operation::Register { ip_address } => {
                info!(ip_address = ?ip_address, "register_ignored");
                Ok(WebhookResponse::ok())
            }
            Operation::Unhandled { event_name } => {
                warn!(event_name = %event_name, "event_unhandled");
                Ok(WebhookResponse::unhandled())
            }
        }
    }
}

/// Maps envelopes to operations.
#[derive(Debug, Clone)]
pub struct EventRouter {
    domain_field: String,
}

impl EventRouter {
    /// `domain_field` names the data key that carries the server's domain.
    pub fn new(domain_field: impl Into<String>) -> Self {
        Self {
            domain_field: domain_field.into(),
        }
    }

    /// Select the operation for an envelope without performing it.
    pub fn plan(&self, envelope: &EventEnvelope) -> Result<Operation, EnvelopeError> {
        let is_static = envelope.has_field(STATIC_ADDRESS_KEY);

        let operation = match (envelope.event_name.as_str(), is_static) {
            ("AllocateIpAddressRequest", true) => Operation::StaticAddressAck {
                ip_address: envelope.field(STATIC_ADDRESS_KEY),
            },
            ("AllocateIpAddressRequest", false) => {
                Operation::AcquireAddress(self.acquire_request(envelope)?)
            }
            ("DeregisterIpAddressRequest", true) => Operation::StaticRelease,
            ("DeregisterIpAddressRequest", false) => Operation::ReleaseAddress(ReleaseRequest {
                hostname: hostname(envelope)?,
                domain: self.domain(envelope),
            }),
            ("RegisterIpAddressRequest", _) => Operation::Register {
                ip_address: envelope.field(IP_ADDRESS_KEY),
            },
            (other, _) => Operation::Unhandled {
                event_name: other.to_string(),
            },
        };

        Ok(operation)
    }

    /// Plan and execute the operation for an envelope.
    pub async fn route(
        &self,
        envelope: &EventEnvelope,
        backend: &BackendClient,
    ) -> Result<WebhookResponse, RouteError> {
        let operation = self.plan(envelope)?;
        info!(
            event_name = %envelope.event_name,
            operation = ?operation,
            "event_routed"
        );
        Ok(operation.execute(backend).await?)
    }

    fn domain(&self, envelope: &EventEnvelope) -> Option<String> {
        envelope.field(&self.domain_field)
    }

    fn acquire_request(&self, envelope: &EventEnvelope) -> Result<AcquireRequest, EnvelopeError> {
        Ok(AcquireRequest {
            subnet: subnet(envelope)?,
            hostname: hostname(envelope)?,
            domain: self.domain(envelope),
            device_type: DEVICE_TYPE.to_string(),
            description: format!(
                "{} - {}",
                envelope
                    .field(ROLE_NAME_KEY)
                    .unwrap_or_else(|| "None".to_string()),
                envelope
                    .field(SERVER_DESCRIPTION_KEY)
                    .unwrap_or_else(|| "None".to_string()),
            ),
            vendor: envelope.field(CLOUD_PLATFORM_KEY),
            location: envelope.field(CLOUD_LOCATION_KEY),
        })
    }
}

fn hostname(envelope: &EventEnvelope) -> Result<String, EnvelopeError> {
    envelope
        .field(HOSTNAME_KEY)
        .ok_or(EnvelopeError::MissingData(HOSTNAME_KEY))
}

fn subnet(envelope: &EventEnvelope) -> Result<String, EnvelopeError> {
    match &envelope.user_data {
        Value::String(s) => Ok(s.clone()),
        other => Err(EnvelopeError::InvalidSubnet(other.clone())),
    }
}
