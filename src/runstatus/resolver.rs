//! `RunStatusResolver::resolve`: the single place the cache-hit,
//! cache-miss and trace-inference paths of spec.md §4.5 come together.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::context::AuthContext;
use crate::error::GatewayResult;
use crate::services::types::{
    EngineError, HumanInputsService, RunRepo, RunStatus, TraceCounts, TraceService,
    WorkflowEngineClient,
};

use std::sync::Arc;

/// What the resolver hands back to a caller: the status plus the
/// progress counters a `get_run_status` response needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStatus {
    pub status: RunStatus,
    pub total_actions: u64,
    pub completed_actions: u64,
    /// Only set for a terminal run (spec.md §8 scenario 3:
    /// `{status: "COMPLETED", completedAt: "...", ...}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

pub struct RunStatusResolver {
    pub runs: Arc<dyn RunRepo>,
    pub engine: Arc<dyn WorkflowEngineClient>,
    pub trace: Arc<dyn TraceService>,
    pub human_inputs: Arc<dyn HumanInputsService>,
}

impl RunStatusResolver {
    pub fn new(
        runs: Arc<dyn RunRepo>,
        engine: Arc<dyn WorkflowEngineClient>,
        trace: Arc<dyn TraceService>,
        human_inputs: Arc<dyn HumanInputsService>,
    ) -> Self {
        Self {
            runs,
            engine,
            trace,
            human_inputs,
        }
    }

    /// Resolve `run_id`'s current status for `ctx`. Steps follow
    /// spec.md §4.5 exactly: tenant-checked load, cache hit short-circuit,
    /// cache miss calls the engine (caching a newly-terminal status
    /// fire-and-forget, inferring from trace on engine `NotFound`), then
    /// the `AWAITING_INPUT` override.
    pub async fn resolve(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<ResolvedStatus> {
        let record = self.runs.get(ctx, run_id).await?;

        let (mut status, mut completed_at) = if let Some(stored) = record.stored_status {
            if stored.is_terminal() {
                (stored, record.close_time)
            } else {
                self.resolve_live(ctx, run_id, record.total_actions).await?
            }
        } else {
            self.resolve_live(ctx, run_id, record.total_actions).await?
        };

        if status == RunStatus::Running
            && self.human_inputs.has_pending_for_run(run_id).await.unwrap_or(false)
        {
            status = RunStatus::AwaitingInput;
            completed_at = None;
        }

        let counts = self.trace.counts(run_id).await.unwrap_or_default();
        Ok(ResolvedStatus {
            status,
            total_actions: record.total_actions,
            completed_actions: counts.node_completed,
            completed_at,
        })
    }

    /// Returns the resolved status plus, when that status is terminal,
    /// the close time the caller should surface as `completedAt`.
    async fn resolve_live(
        &self,
        ctx: &AuthContext,
        run_id: &str,
        total_actions: u64,
    ) -> GatewayResult<(RunStatus, Option<DateTime<Utc>>)> {
        match self.engine.describe_workflow(ctx, run_id).await {
            Ok(describe) => {
                if describe.status.is_terminal() {
                    let runs = self.runs.clone();
                    let run_id_owned = run_id.to_string();
                    let status = describe.status;
                    let close_time = Utc::now();
                    tokio::spawn(async move {
                        if let Err(err) =
                            runs.cache_terminal_status(&run_id_owned, status, close_time).await
                        {
                            tracing::warn!(
                                target: "gateway::runstatus",
                                run_id = %run_id_owned,
                                error = %err,
                                "failed to cache terminal run status"
                            );
                        }
                    });
                    Ok((describe.status, Some(close_time)))
                } else {
                    Ok((describe.status, None))
                }
            }
            Err(EngineError::NotFound) => {
                let counts = self.trace.counts(run_id).await.unwrap_or_default();
                let status = infer_status(counts, total_actions);
                // Inferred statuses are never cached, so there is no
                // stored close time to surface (spec.md §4.5, §9 STALE note).
                Ok((status, None))
            }
            Err(EngineError::Other(message)) => {
                Err(crate::error::GatewayError::Upstream(message))
            }
        }
    }
}

/// Trace-inferred status table (spec.md §4.5). `STALE` is never cached
/// by the caller — only this function's result.
fn infer_status(counts: TraceCounts, total_actions: u64) -> RunStatus {
    if counts.started == 0 {
        return RunStatus::Stale;
    }
    if counts.failed > 0 {
        return RunStatus::Failed;
    }
    if total_actions > 0 && counts.completed >= total_actions {
        return RunStatus::Completed;
    }
    if counts.started > 0 && counts.completed < total_actions {
        return RunStatus::Failed;
    }
    RunStatus::Failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{MockHumanInputsService, MockTraceService, MockWorkflowEngine};
    use crate::services::types::{HumanInput, RunRecord};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockRunRepo {
        records: Mutex<HashMap<String, RunRecord>>,
        cache_writes: Mutex<Vec<(String, RunStatus)>>,
    }

    impl MockRunRepo {
        fn seed(&self, record: RunRecord) {
            self.records.lock().insert(record.run_id.clone(), record);
        }
    }

    #[async_trait]
    impl RunRepo for MockRunRepo {
        async fn get(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<RunRecord> {
            self.records
                .lock()
                .get(run_id)
                .filter(|r| r.tenant_id == ctx.tenant_id)
                .cloned()
                .ok_or_else(|| crate::error::GatewayError::NotFound(format!("run {run_id}")))
        }

        async fn cache_terminal_status(
            &self,
            run_id: &str,
            status: RunStatus,
            _close_time: chrono::DateTime<Utc>,
        ) -> Result<(), String> {
            self.cache_writes.lock().push((run_id.to_string(), status));
            if let Some(record) = self.records.lock().get_mut(run_id) {
                if record.stored_status.map(|s| !s.is_terminal()).unwrap_or(true) {
                    record.stored_status = Some(status);
                }
            }
            Ok(())
        }
    }

    fn record(run_id: &str, tenant: &str, stored: Option<RunStatus>, total: u64) -> RunRecord {
        RunRecord {
            run_id: run_id.to_string(),
            tenant_id: tenant.to_string(),
            stored_status: stored,
            close_time: None,
            total_actions: total,
            first_seen: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    fn ctx() -> AuthContext {
        AuthContext::public_link("tenant-1")
    }

    #[tokio::test]
    async fn cache_hit_terminal_status_skips_engine_call() {
        let runs = Arc::new(MockRunRepo::default());
        let close_time = "2025-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        runs.seed(RunRecord {
            close_time: Some(close_time),
            ..record("run-1", "tenant-1", Some(RunStatus::Completed), 5)
        });
        let engine = Arc::new(MockWorkflowEngine::new());
        // Deliberately do not seed the engine with this run: if the
        // resolver calls describeWorkflow it gets NotFound and the test
        // would observe an inferred status instead of the cached one.
        let trace = Arc::new(MockTraceService::new());
        let human_inputs = Arc::new(MockHumanInputsService::new());

        let resolver = RunStatusResolver::new(runs, engine, trace, human_inputs);
        let resolved = resolver.resolve(&ctx(), "run-1").await.unwrap();
        assert_eq!(resolved.status, RunStatus::Completed);
        assert_eq!(resolved.completed_at, Some(close_time));
    }

    #[tokio::test]
    async fn cache_miss_infers_failed_when_engine_reports_not_found() {
        let runs = Arc::new(MockRunRepo::default());
        runs.seed(record("run-2", "tenant-1", None, 10));
        let engine = Arc::new(MockWorkflowEngine::new());
        let trace = Arc::new(MockTraceService::new());
        trace.seed_counts(
            "run-2",
            TraceCounts {
                started: 3,
                completed: 2,
                failed: 0,
                node_completed: 2,
            },
        );
        let human_inputs = Arc::new(MockHumanInputsService::new());

        let resolver = RunStatusResolver::new(runs, engine, trace, human_inputs);
        let resolved = resolver.resolve(&ctx(), "run-2").await.unwrap();
        // started > 0, completed < total => inferred FAILED, never cached.
        assert_eq!(resolved.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn orphan_run_with_no_trace_events_is_stale() {
        let runs = Arc::new(MockRunRepo::default());
        runs.seed(record("run-3", "tenant-1", None, 10));
        let engine = Arc::new(MockWorkflowEngine::new());
        let trace = Arc::new(MockTraceService::new());
        let human_inputs = Arc::new(MockHumanInputsService::new());

        let resolver = RunStatusResolver::new(runs, engine, trace, human_inputs);
        let resolved = resolver.resolve(&ctx(), "run-3").await.unwrap();
        assert_eq!(resolved.status, RunStatus::Stale);
    }

    #[tokio::test]
    async fn running_with_pending_human_input_is_overridden() {
        let runs = Arc::new(MockRunRepo::default());
        runs.seed(record("run-4", "tenant-1", None, 10));
        let engine = Arc::new(MockWorkflowEngine::new());
        engine.seed_run("run-4", RunStatus::Running, 10);
        let trace = Arc::new(MockTraceService::new());
        let human_inputs = Arc::new(MockHumanInputsService::new());
        human_inputs.seed(HumanInput {
            id: "hi-1".into(),
            run_id: "run-4".into(),
            tenant_id: "tenant-1".into(),
            prompt: "approve?".into(),
            resolved: false,
        });

        let resolver = RunStatusResolver::new(runs, engine, trace, human_inputs);
        let resolved = resolver.resolve(&ctx(), "run-4").await.unwrap();
        assert_eq!(resolved.status, RunStatus::AwaitingInput);
    }

    #[tokio::test]
    async fn tenant_mismatch_is_not_found() {
        let runs = Arc::new(MockRunRepo::default());
        runs.seed(record("run-5", "tenant-other", Some(RunStatus::Completed), 1));
        let engine = Arc::new(MockWorkflowEngine::new());
        let trace = Arc::new(MockTraceService::new());
        let human_inputs = Arc::new(MockHumanInputsService::new());

        let resolver = RunStatusResolver::new(runs, engine, trace, human_inputs);
        let err = resolver.resolve(&ctx(), "run-5").await.unwrap_err();
        assert!(matches!(err, crate::error::GatewayError::NotFound(_)));
    }
}
