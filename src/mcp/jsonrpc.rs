//! JSON-RPC 2.0 envelopes used over the Streamable HTTP transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An incoming JSON-RPC request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcIncoming {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcIncoming {
    /// A request carries an `id`; a notification does not and receives no
    /// response per JSON-RPC 2.0.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

pub const INVALID_PARAMS: i64 = -32602;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_REQUEST: i64 = -32600;
pub const INTERNAL_ERROR: i64 = -32603;

/// An outgoing JSON-RPC response. Notifications produce a response that
/// `should_send()` reports as `false`, so the transport layer can skip it.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcOutgoing {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcErrorObject>,
    #[serde(skip)]
    notification: bool,
}

impl JsonRpcOutgoing {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
            notification: false,
        }
    }

    pub fn error(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
            notification: false,
        }
    }

    pub fn no_response() -> Self {
        Self {
            jsonrpc: "2.0",
            id: None,
            result: None,
            error: None,
            notification: true,
        }
    }

    pub fn should_send(&self) -> bool {
        !self.notification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_has_no_response() {
        let req = JsonRpcIncoming {
            jsonrpc: "2.0".into(),
            id: None,
            method: "notifications/initialized".into(),
            params: None,
        };
        assert!(req.is_notification());
        assert!(!JsonRpcOutgoing::no_response().should_send());
    }

    #[test]
    fn success_response_serializes_without_error_field() {
        let resp = JsonRpcOutgoing::success(Some(serde_json::json!(1)), serde_json::json!({}));
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("\"error\""));
    }
}
