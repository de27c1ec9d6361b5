//! Transport Adapter: MCP Streamable HTTP framing — POST carries
//! JSON-RPC, GET opens a push stream, DELETE terminates a session
//! (spec.md §4.2).

pub mod http;
pub mod sse;

pub use http::{build_router, AppState};
