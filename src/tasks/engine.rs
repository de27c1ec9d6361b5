//! The monitor loop: one spawned task per background task, polling the
//! workflow engine until the run reaches a terminal status and writing
//! exactly one terminal result (spec.md §4.4).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::auth::context::AuthContext;
use crate::error::GatewayResult;
use crate::services::types::{EngineError, RunRepo, RunStatus, WorkflowEngineClient};

use super::store::{StoredTaskResult, TaskStore};

/// Dependencies the monitor loop needs, grouped so `spawn_monitor` takes
/// one argument instead of four (mirrors `turbomcp_server`'s task-runner
/// dependency bundle).
#[derive(Clone)]
pub struct TaskMonitorDeps {
    pub engine: Arc<dyn WorkflowEngineClient>,
    pub store: Arc<dyn TaskStore>,
    /// The gateway's own run registry, so a run created here is bound to
    /// its creating tenant before any `get_run_status` lookup can race
    /// it (spec.md §4.5 tenant-checked lookup).
    pub runs: Arc<dyn RunRepo>,
    pub poll_interval: Duration,
}

/// Owns the spawn side of the Background-Task Engine. The store itself
/// is shared with the dispatcher so `get_task`/`get_task_result` read
/// the same state the monitor writes.
#[derive(Clone)]
pub struct BackgroundTaskEngine {
    deps: TaskMonitorDeps,
}

impl BackgroundTaskEngine {
    pub fn new(deps: TaskMonitorDeps) -> Self {
        Self { deps }
    }

    /// Start a run and register a task that mirrors it, spawning the
    /// monitor loop in the background. Returns the task id immediately
    /// (spec.md §4.4, "run_workflow returns a task handle without
    /// waiting for completion").
    pub async fn start_and_monitor(
        &self,
        ctx: &AuthContext,
        workflow_id: &str,
        inputs: serde_json::Value,
        ttl: Duration,
    ) -> GatewayResult<String> {
        let run_id = self.deps.engine.start_run(ctx, workflow_id, inputs).await?;
        // Bind the run to the creating tenant immediately, so no other
        // tenant's get_run_status call can race the first lookup.
        let _ = self.deps.runs.get(ctx, &run_id).await;
        let task_id = self
            .deps
            .store
            .create_task(run_id.clone(), ctx.principal_id.clone(), ttl)
            .await;

        let deps = self.deps.clone();
        let ctx = ctx.clone();
        let monitored_task_id = task_id.clone();
        tokio::spawn(async move {
            monitor_loop(deps, ctx, monitored_task_id, run_id).await;
        });

        Ok(task_id)
    }
}

/// Poll until the engine reports a terminal status (or the run vanishes,
/// in which case we infer `Failed` rather than leaving the task stuck in
/// `Working` forever). Every iteration either leaves the task `Working`
/// with a refreshed status echo, or writes a terminal result and stops —
/// never both in the same turn, since `store_task_result` is the only
/// path to terminal state (spec.md §4.4).
async fn monitor_loop(deps: TaskMonitorDeps, ctx: AuthContext, task_id: String, run_id: String) {
    loop {
        match deps.engine.describe_workflow(&ctx, &run_id).await {
            Ok(describe) if describe.status.is_terminal() => {
                let result = terminal_result(&deps, &ctx, &run_id, describe.status).await;
                if let Err(err) = deps.store.store_task_result(&task_id, result).await {
                    // A concurrent terminal write (e.g. an explicit
                    // cancel_run call) already landed first; this is
                    // expected, not a bug.
                    tracing::debug!(
                        target: "gateway::tasks",
                        task_id = %task_id,
                        error = %err,
                        "terminal write lost the race, dropping"
                    );
                }
                return;
            }
            Ok(describe) => {
                let status_message = format!("{:?}", describe.status);
                if let Err(err) = deps
                    .store
                    .update_task_status(&task_id, super::store::TaskState::Working, Some(status_message))
                    .await
                {
                    tracing::debug!(
                        target: "gateway::tasks",
                        task_id = %task_id,
                        error = %err,
                        "status echo update failed, task likely already terminal"
                    );
                    return;
                }
            }
            Err(EngineError::NotFound) => {
                let _ = deps
                    .store
                    .store_task_result(
                        &task_id,
                        StoredTaskResult::Failed {
                            error: "run disappeared from workflow engine".to_string(),
                        },
                    )
                    .await;
                return;
            }
            Err(EngineError::Other(message)) => {
                tracing::warn!(
                    target: "gateway::tasks",
                    task_id = %task_id,
                    run_id = %run_id,
                    error = %message,
                    "transient error polling run status, will retry"
                );
            }
        }

        sleep(deps.poll_interval).await;
    }
}

async fn terminal_result(
    deps: &TaskMonitorDeps,
    ctx: &AuthContext,
    run_id: &str,
    status: RunStatus,
) -> StoredTaskResult {
    match status {
        RunStatus::Completed => match deps.engine.get_run_result(ctx, run_id).await {
            Ok(result) => StoredTaskResult::Completed { result },
            Err(err) => StoredTaskResult::Failed {
                error: format!("run completed but result fetch failed: {err}"),
            },
        },
        RunStatus::Cancelled => StoredTaskResult::Cancelled,
        RunStatus::Failed | RunStatus::Terminated | RunStatus::TimedOut => StoredTaskResult::Failed {
            error: format!("run ended with status {status:?}"),
        },
        _ => unreachable!("terminal_result called with a non-terminal status"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::AuthContext;
    use crate::runstatus::InMemoryRunRepo;
    use crate::services::mock::MockWorkflowEngine;
    use crate::tasks::store::{InMemoryTaskStore, TaskState};
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    fn ctx() -> AuthContext {
        AuthContext::public_link("tenant-1")
    }

    #[tokio::test]
    async fn monitor_loop_writes_completed_result_once_terminal() {
        let engine = Arc::new(MockWorkflowEngine::new());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let run_id = "run-1".to_string();
        engine.seed_run(&run_id, RunStatus::Running, 1);

        let task_id = store
            .create_task(run_id.clone(), "user-1".to_string(), StdDuration::from_secs(60))
            .await;

        let deps = TaskMonitorDeps {
            engine: engine.clone(),
            store: store.clone(),
            runs: Arc::new(InMemoryRunRepo::new()),
            poll_interval: StdDuration::from_millis(5),
        };

        let handle = tokio::spawn(monitor_loop(deps, ctx(), task_id.clone(), run_id.clone()));

        // Flip to terminal after the monitor has observed Running once.
        tokio::time::sleep(StdDuration::from_millis(15)).await;
        engine.set_run_status(&run_id, RunStatus::Completed);

        timeout(StdDuration::from_secs(1), handle).await.unwrap().unwrap();

        let task = store.get_task(&task_id).await.unwrap();
        assert_eq!(task.state, TaskState::Completed);
    }

    #[tokio::test]
    async fn monitor_loop_fails_task_when_run_vanishes() {
        let engine = Arc::new(MockWorkflowEngine::new());
        let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
        let run_id = "run-missing".to_string();
        // Never seeded: describe_workflow immediately returns NotFound.

        let task_id = store
            .create_task(run_id.clone(), "user-1".to_string(), StdDuration::from_secs(60))
            .await;

        let deps = TaskMonitorDeps {
            engine,
            store: store.clone(),
            runs: Arc::new(InMemoryRunRepo::new()),
            poll_interval: StdDuration::from_millis(5),
        };

        timeout(
            StdDuration::from_secs(1),
            monitor_loop(deps, ctx(), task_id.clone(), run_id),
        )
        .await
        .unwrap();

        let task = store.get_task(&task_id).await.unwrap();
        assert_eq!(task.state, TaskState::Failed);
    }
}
