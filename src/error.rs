//! Crate-wide error type and the two shaping paths every error must take:
//! an HTTP status for transport-layer failures, and an MCP tool-result
//! envelope for failures surfaced inside a `tools/call` response.

use crate::mcp::CallToolResult;

/// Result type used throughout the gateway.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors produced by the gateway's own components (session manager,
/// dispatcher, task engine, run-status resolver, audit emitter).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// No credentials presented, or credentials did not parse.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Session identity mismatch, or a permission the caller lacks.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Session, task, run or resource could not be located.
    #[error("not found: {0}")]
    NotFound(String),

    /// Tool input failed schema validation, or a parameter was out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// A backing service required for this tool was never wired in.
    #[error("{0} service is not available")]
    ServiceUnavailable(String),

    /// A backing service call completed but returned an error.
    #[error("{0}")]
    Upstream(String),

    /// An internal invariant was violated (poisoned lock, invalid state
    /// transition attempted by our own code).
    #[error("lifecycle error: {0}")]
    Lifecycle(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GatewayError {
    /// HTTP status code for errors that surface at the transport layer
    /// (session lookups, the initialize handshake) per spec.md §7.
    pub fn http_status(&self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Authorization(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Lifecycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shape this error as an MCP tool result with `isError: true`.
    ///
    /// Per spec.md §4.3, invalid input and backing-service failures must
    /// never become transport-level errors once a tool call has begun —
    /// the MCP client expects a structured result, not a dropped connection.
    pub fn to_tool_error(&self) -> CallToolResult {
        CallToolResult::error(self.to_string())
    }
}
