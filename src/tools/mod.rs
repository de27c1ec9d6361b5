//! Tool Registry & Dispatcher: the exact tool catalog (spec.md §4.3),
//! input-schema validation, the permission gate, and the sensitive
//! per-tool edge cases that must not be reordered.

pub mod catalog;
pub mod dispatcher;
pub mod registry;

pub use dispatcher::ToolDispatcher;
pub use registry::{ToolKind, ToolRegistry, ToolSpec};
