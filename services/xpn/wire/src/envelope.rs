//! JSON message envelopes for both directions of the control socket.
//!
//! Outbound envelopes are built from typed constructors and serialized
//! once, at the encoder. Inbound envelopes arrive as raw text frames and
//! are decoded leniently: the `service` field is mandatory, everything
//! else is optional so unknown message shapes survive the trip and can be
//! republished verbatim.

use crate::correlation::CorrelationId;
use crate::error::WireError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Service name for session status traffic
pub const SERVICE_STATUS: &str = "status";
/// Service name for the command sub-protocol
pub const SERVICE_XPRESSION: &str = "xpression";
/// Service name for remote-process liveness messages
pub const SERVICE_SERVER: &str = "server";

/// Outbound wire envelope
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Logical sub-protocol this message belongs to
    pub service: String,
    /// Message body
    pub data: EnvelopeData,
}

/// Body of an outbound envelope.
///
/// Session-level messages (login/logout) use the flat `userName`/`password`
/// fields; command messages use `category`/`action`/`properties`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnvelopeData {
    /// Command category (absent on session-level actions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Command action name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Login/logout user name
    #[serde(rename = "userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Login password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Action parameters, always carrying the `uuid` correlation token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

impl Envelope {
    /// Build a login envelope from the current settings
    pub fn login(username: &str, password: &str) -> Self {
        Self {
            service: "login".to_string(),
            data: EnvelopeData {
                user_name: Some(username.to_string()),
                password: Some(password.to_string()),
                ..Default::default()
            },
        }
    }

    /// Build a logout envelope
    pub fn logout(username: &str) -> Self {
        Self {
            service: "logout".to_string(),
            data: EnvelopeData {
                user_name: Some(username.to_string()),
                ..Default::default()
            },
        }
    }

    /// Build a command envelope on the `xpression` service
    pub fn command(category: Option<&str>, action: &str, properties: Value) -> Self {
        Self {
            service: SERVICE_XPRESSION.to_string(),
            data: EnvelopeData {
                category: category.map(str::to_string),
                action: Some(action.to_string()),
                properties: Some(properties),
                ..Default::default()
            },
        }
    }

    /// Build a join/leave envelope for a named sub-service
    pub fn membership(service: &str, properties: Value) -> Self {
        Self {
            service: service.to_string(),
            data: EnvelopeData {
                properties: Some(properties),
                ..Default::default()
            },
        }
    }

    /// Serialize to the single-line JSON text sent on the socket
    pub fn to_json(&self) -> String {
        // Serialization of a Value-bearing struct cannot fail
        serde_json::to_string(self).expect("envelope serialization")
    }
}

/// Decoded inbound wire envelope
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    /// Logical sub-protocol this message belongs to
    pub service: String,
    /// Decoded body fields
    pub data: InboundData,
    /// The `data` payload exactly as it arrived, for verbatim republish
    /// of unknown services
    pub data_raw: Value,
}

/// Body of an inbound envelope; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundData {
    /// Command category
    #[serde(default)]
    pub category: Option<String>,
    /// Command action name
    #[serde(default)]
    pub action: Option<String>,
    /// Status message kind (`login`, `error`)
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Human-readable status text
    #[serde(default)]
    pub message: Option<String>,
    /// Reply payload for correlated responses
    #[serde(default)]
    pub value: Option<ReplyValue>,
}

/// The `value` object of a correlated reply
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplyValue {
    /// Echoed correlation token
    #[serde(default)]
    pub uuid: Option<CorrelationId>,
    /// Take item the reply concerns, if any
    #[serde(default, rename = "takeID")]
    pub take_id: Option<i64>,
    /// Widget the reply concerns, if any
    #[serde(default)]
    pub name: Option<String>,
    /// Action-specific result
    #[serde(default)]
    pub response: Value,
}

/// Semantic reply republished on the event bus for pending requests
#[derive(Debug, Clone)]
pub struct Reply {
    /// Echoed correlation token
    pub uuid: Option<CorrelationId>,
    /// Take item the reply concerns, if any
    pub take_id: Option<i64>,
    /// Widget the reply concerns, if any
    pub name: Option<String>,
    /// Action that produced this reply
    pub action: String,
    /// Action-specific result
    pub response: Value,
}

impl Reply {
    /// Build a reply from a decoded `value` object and its action name
    pub fn from_value(action: &str, value: &ReplyValue) -> Self {
        Self {
            uuid: value.uuid.clone(),
            take_id: value.take_id,
            name: value.name.clone(),
            action: action.to_string(),
            response: value.response.clone(),
        }
    }
}

/// Decode an inbound text frame.
///
/// Fails only when the payload is not JSON or carries no `service` field;
/// any well-formed envelope decodes, whatever its shape.
pub fn decode(raw: &str) -> Result<InboundEnvelope, WireError> {
    let root: Value = serde_json::from_str(raw)?;
    let service = root
        .get("service")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingService)?
        .to_string();

    let data_raw = root.get("data").cloned().unwrap_or(Value::Null);
    let data: InboundData = serde_json::from_value(data_raw.clone()).unwrap_or_default();

    Ok(InboundEnvelope {
        service,
        data,
        data_raw,
    })
}
