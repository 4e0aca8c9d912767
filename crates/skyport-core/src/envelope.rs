//! Wire envelope definitions for the client protocol and the backend API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound client envelope: a flat JSON object with an `action` discriminator.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    pub action: String,
    #[serde(flatten)]
    pub fields: Value,
}

impl ClientEnvelope {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Extract a required string field from the envelope body.
    pub fn require_str(&self, key: &str) -> Result<&str, String> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| format!("Missing required field: {key}"))
    }

    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }
}

/// Outbound request/response envelope.
///
/// Wire shape: `{ action, success?, data?, message }`. The `error` action
/// carries only a message; relayed responses carry the backend's `success`,
/// `data`, and `message` verbatim.
#[derive(Debug, Serialize)]
pub struct Response {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    pub message: String,
}

impl Response {
    pub fn ok(action: &'static str, data: Value) -> Self {
        Self {
            action,
            success: Some(true),
            data,
            message: String::new(),
        }
    }

    pub fn fail(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            success: Some(false),
            data: Value::Null,
            message: message.into(),
        }
    }

    /// Relay a backend envelope to the client under the given action.
    pub fn from_api(action: &'static str, envelope: ApiEnvelope) -> Self {
        Self {
            action,
            success: Some(envelope.success),
            data: envelope.data,
            message: envelope.message,
        }
    }

    /// Protocol-level error envelope (`{action: "error", message}`).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            action: "error",
            success: None,
            data: Value::Null,
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"action":"error","message":"internal serialization failure"}"#.to_string()
        })
    }
}

/// The backend API's response shape: `{success, data, message}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEnvelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: String,
}

impl ApiEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            message: message.into(),
        }
    }
}

/// Unsolicited push envelopes sent from the gateway to connected clients.
pub mod push {
    use super::*;
    use serde_json::json;

    pub fn connection_established(server_time: DateTime<Utc>) -> Value {
        json!({
            "action": "connection_established",
            "serverTime": server_time.to_rfc3339(),
        })
    }

    pub fn delivering_orders_update(orders: Value) -> Value {
        json!({"action": "delivering_orders_update", "orders": orders})
    }

    pub fn drone_status_update(drones: Value) -> Value {
        json!({"action": "drone_status_update", "drones": drones})
    }

    pub fn server_log(message: &str, kind: &str) -> Value {
        json!({"action": "server_log", "message": message, "type": kind})
    }

    pub fn connection_killed(message: &str) -> Value {
        json!({"action": "connection_killed", "message": message})
    }

    pub fn server_shutdown(message: &str) -> Value {
        json!({"action": "server_shutdown", "message": message})
    }
}
