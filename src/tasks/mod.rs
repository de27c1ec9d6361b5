//! The Background-Task Engine: mirrors a long-running workflow run as an
//! MCP background task, with a monitor loop that polls run status and
//! writes terminal results without racing the status updater
//! (spec.md §4.4, §8).

pub mod engine;
pub mod store;

pub use engine::{BackgroundTaskEngine, TaskMonitorDeps};
pub use store::{InMemoryTaskStore, StoredTaskResult, Task, TaskState, TaskStore};
