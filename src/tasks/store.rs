//! `Task` and the `TaskStore` trait: per-task atomic state transitions,
//! TTL eviction, and a terminality guarantee no caller can violate
//! (spec.md §3, §5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Logical state of a background task (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Working,
    Completed,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Working)
    }
}

/// Result payload, populated only once the task reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StoredTaskResult {
    Working,
    Completed { result: serde_json::Value },
    Cancelled,
    Failed { error: String },
}

impl StoredTaskResult {
    pub fn state(&self) -> TaskState {
        match self {
            StoredTaskResult::Working => TaskState::Working,
            StoredTaskResult::Completed { .. } => TaskState::Completed,
            StoredTaskResult::Cancelled => TaskState::Cancelled,
            StoredTaskResult::Failed { .. } => TaskState::Failed,
        }
    }
}

/// A background task handle (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub run_id: String,
    pub state: TaskState,
    /// Echo of the underlying run's engine-state (e.g. `"RUNNING"`), not
    /// the task's own logical state.
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub result: Option<serde_json::Value>,
}

struct StoredTask {
    task: Task,
    owner_principal: String,
}

/// Storage backend for tasks. A single in-process implementation is
/// provided (`InMemoryTaskStore`); the trait boundary exists so a
/// distributed store could back a multi-instance deployment without
/// touching the engine (mirrors the session-store interface note in
/// spec.md §9).
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    async fn create_task(&self, run_id: String, owner_principal: String, ttl: Duration) -> String;
    async fn get_task(&self, task_id: &str) -> GatewayResult<Task>;

    /// Move a non-terminal task to a new non-terminal state, updating the
    /// status echo. Rejects any write once the task is already terminal
    /// (spec.md §3 invariant a, §5 "reject writes to already-terminal tasks").
    async fn update_task_status(
        &self,
        task_id: &str,
        state: TaskState,
        status_message: Option<String>,
    ) -> GatewayResult<()>;

    /// Write a terminal result. This is the *only* way a task becomes
    /// terminal — callers must not call `update_task_status` with a
    /// terminal state first (spec.md §4.4, §8 scenario 6).
    async fn store_task_result(
        &self,
        task_id: &str,
        result: StoredTaskResult,
    ) -> GatewayResult<()>;

    async fn cancel_task(&self, task_id: &str) -> GatewayResult<()>;
    async fn evict_expired(&self, now: DateTime<Utc>) -> usize;

    /// The principal that created this task via `run_workflow`. Backs the
    /// ownership check on the task-query operations (spec.md §4.4).
    async fn owner_of(&self, task_id: &str) -> Option<String>;
}

/// Thread-safe in-memory task store, modeled on
/// `turbomcp_server::task_storage::TaskStorage`: a single `RwLock<HashMap>`
/// guarding per-task atomic transitions.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, StoredTask>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create_task(&self, run_id: String, owner_principal: String, ttl: Duration) -> String {
        let task_id = uuid::Uuid::new_v4().to_string();
        let task = Task {
            task_id: task_id.clone(),
            run_id,
            state: TaskState::Working,
            status_message: None,
            created_at: Utc::now(),
            ttl,
            result: None,
        };
        self.tasks.write().insert(
            task_id.clone(),
            StoredTask {
                task,
                owner_principal,
            },
        );
        task_id
    }

    async fn get_task(&self, task_id: &str) -> GatewayResult<Task> {
        self.tasks
            .read()
            .get(task_id)
            .map(|t| t.task.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))
    }

    async fn update_task_status(
        &self,
        task_id: &str,
        state: TaskState,
        status_message: Option<String>,
    ) -> GatewayResult<()> {
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get_mut(task_id)
            .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

        if stored.task.state.is_terminal() {
            return Err(GatewayError::Lifecycle(format!(
                "task {task_id} is already terminal; rejecting status update"
            )));
        }
        if state.is_terminal() {
            return Err(GatewayError::Lifecycle(
                "update_task_status must not be used for terminal transitions; use store_task_result".to_string(),
            ));
        }

        stored.task.state = state;
        stored.task.status_message = status_message;
        Ok(())
    }

    async fn store_task_result(
        &self,
        task_id: &str,
        result: StoredTaskResult,
    ) -> GatewayResult<()> {
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get_mut(task_id)
            .ok_or_else(|| GatewayError::NotFound(format!("task {task_id}")))?;

        if stored.task.state.is_terminal() {
            // Monotonic terminality: once terminal, never overwritten.
            // This is not an error for the caller to handle specially —
            // the monitor's own failure-path write races a concurrent
            // terminal write and must swallow this (spec.md §4.4).
            return Err(GatewayError::Lifecycle(format!(
                "task {task_id} is already terminal"
            )));
        }

        stored.task.state = result.state();
        stored.task.result = match &result {
            StoredTaskResult::Completed { result } => Some(result.clone()),
            StoredTaskResult::Failed { error } => {
                Some(serde_json::json!({ "error": error }))
            }
            StoredTaskResult::Cancelled | StoredTaskResult::Working => None,
        };
        Ok(())
    }

    async fn cancel_task(&self, task_id: &str) -> GatewayResult<()> {
        self.store_task_result(task_id, StoredTaskResult::Cancelled)
            .await
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|_, stored| {
            let expiry = stored.task.created_at
                + chrono::Duration::from_std(stored.task.ttl).unwrap_or(chrono::Duration::zero());
            now < expiry
        });
        before - tasks.len()
    }

    async fn owner_of(&self, task_id: &str) -> Option<String> {
        self.tasks
            .read()
            .get(task_id)
            .map(|t| t.owner_principal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminal_write_blocks_further_status_updates() {
        let store = InMemoryTaskStore::new();
        let id = store
            .create_task("run-1".into(), "user-1".into(), Duration::from_secs(60))
            .await;

        store
            .store_task_result(&id, StoredTaskResult::Completed {
                result: serde_json::json!({"ok": true}),
            })
            .await
            .unwrap();

        let err = store
            .update_task_status(&id, TaskState::Working, Some("RUNNING".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Lifecycle(_)));

        let task = store.get_task(&id).await.unwrap();
        assert_eq!(task.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn second_terminal_write_is_rejected_not_overwritten() {
        let store = InMemoryTaskStore::new();
        let id = store
            .create_task("run-1".into(), "user-1".into(), Duration::from_secs(60))
            .await;

        store
            .store_task_result(&id, StoredTaskResult::Completed {
                result: serde_json::json!({"v": 1}),
            })
            .await
            .unwrap();

        let second = store
            .store_task_result(&id, StoredTaskResult::Failed {
                error: "late failure".into(),
            })
            .await;
        assert!(second.is_err());

        let task = store.get_task(&id).await.unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.result, Some(serde_json::json!({"v": 1})));
    }

    #[tokio::test]
    async fn expired_tasks_are_evicted() {
        let store = InMemoryTaskStore::new();
        let id = store
            .create_task("run-1".into(), "user-1".into(), Duration::from_secs(0))
            .await;
        let later = Utc::now() + chrono::Duration::seconds(1);
        let evicted = store.evict_expired(later).await;
        assert_eq!(evicted, 1);
        assert!(store.get_task(&id).await.is_err());
    }
}
