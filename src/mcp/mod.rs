//! Minimal MCP wire types: JSON-RPC envelopes and tool content blocks.
//!
//! The gateway only ever needs the subset of the MCP 2025-06-18 type system
//! that the Tool Registry & Dispatcher and the Transport Adapter touch —
//! shapes are mirrored from `turbomcp-protocol`'s `types` and `jsonrpc`
//! modules, trimmed to what this gateway actually emits.

pub mod jsonrpc;

use serde::{Deserialize, Serialize};

/// A single content block in a tool result. The gateway only ever produces
/// text content (JSON-stringified payloads), per spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Text content.
    #[serde(rename = "text")]
    Text(TextContent),
}

/// Plain text content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Result of a `tools/call` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl CallToolResult {
    /// Build a successful result whose single content block is the
    /// JSON-stringified `payload`, per spec.md §6's tool contract.
    pub fn success(payload: &impl Serialize) -> Self {
        let text = serde_json::to_string(payload)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failure: {e}"}}"#));
        Self {
            content: vec![ContentBlock::Text(TextContent { text })],
            is_error: None,
        }
    }

    /// Build an error result carrying a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::Text(TextContent {
                text: message.into(),
            })],
            is_error: Some(true),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// The text of the first content block, if any — used by tests that
    /// assert on the shape of a denial/error message.
    pub fn text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ContentBlock::Text(t) => Some(t.text.as_str()),
        })
    }
}

/// Input schema contract for a tool, expressed as a JSON Schema object.
/// Validated structurally before dispatch, per spec.md §4.3.
pub type InputSchema = serde_json::Value;
