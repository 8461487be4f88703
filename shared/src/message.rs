//! Message types exchanged between the relay core and devices
//!
//! This module defines:
//! - The action request handed to the relay by upstream callers
//! - The outbound command envelope published toward a device
//! - The inbound device response matched back to a pending request

use crate::{AccountId, CorrelationId, DeviceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The set of actions a device can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TurnOn,
    TurnOff,
    Toggle,
    Open,
    Close,
    SetLevel,
    QueryState,
}

/// Error returned when an action name is not recognized.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown action: `{0}`")]
pub struct UnknownAction(pub String);

impl FromStr for ActionKind {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "turn_on" => Ok(Self::TurnOn),
            "turn_off" => Ok(Self::TurnOff),
            "toggle" => Ok(Self::Toggle),
            "open" => Ok(Self::Open),
            "close" => Ok(Self::Close),
            "set_level" => Ok(Self::SetLevel),
            "query_state" => Ok(Self::QueryState),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::Toggle => "toggle",
            Self::Open => "open",
            Self::Close => "close",
            Self::SetLevel => "set_level",
            Self::QueryState => "query_state",
        };
        write!(f, "{}", name)
    }
}

/// A single "perform action on device" request from an upstream caller.
///
/// The action arrives as a raw string; the engine validates it against the
/// known action set. Parameters are an opaque key/value payload forwarded to
/// the device untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub device_id: DeviceId,
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub requester: AccountId,
}

impl ActionRequest {
    pub fn new(
        device_id: impl Into<DeviceId>,
        action: impl Into<String>,
        requester: impl Into<AccountId>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            action: action.into(),
            params: serde_json::Value::Null,
            requester: requester.into(),
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// The outbound command payload published toward a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CorrelationId,
    pub action: ActionKind,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Device-reported outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ResponseStatus {
    Success,
    Error { code: String },
}

impl ResponseStatus {
    pub fn error(code: impl Into<String>) -> Self {
        Self::Error { code: code.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error { code } => write!(f, "error ({})", code),
        }
    }
}

/// A decoded response from a device, matched to a pending request by its
/// correlation identifier. Transient: exists only between decode and
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceResponse {
    pub id: CorrelationId,
    #[serde(flatten)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub state: serde_json::Value,
}

impl DeviceResponse {
    pub fn success(id: CorrelationId, state: serde_json::Value) -> Self {
        Self {
            id,
            status: ResponseStatus::Success,
            state,
        }
    }

    pub fn error(id: CorrelationId, code: impl Into<String>) -> Self {
        Self {
            id,
            status: ResponseStatus::error(code),
            state: serde_json::Value::Null,
        }
    }
}

/// The result handed back to the caller once a device has answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub status: ResponseStatus,
    pub state: serde_json::Value,
}

impl From<DeviceResponse> for ActionResult {
    fn from(response: DeviceResponse) -> Self {
        Self {
            status: response.status,
            state: response.state,
        }
    }
}
