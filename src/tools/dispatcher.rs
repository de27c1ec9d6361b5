//! `ToolDispatcher::dispatch`: schema validation, the permission gate,
//! and the per-tool handler match, shaped into `CallToolResult` so a
//! failure of any kind becomes `isError: true` rather than a dropped
//! connection (spec.md §4.3).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::auth::audit::{AuditEmitter, AuditRecord};
use crate::auth::context::AuthContext;
use crate::auth::permission::PermissionEvaluator;
use crate::error::{GatewayError, GatewayResult};
use crate::mcp::CallToolResult;
use crate::runstatus::RunStatusResolver;
use crate::services::facade::ServiceClientFacade;
use crate::tasks::engine::BackgroundTaskEngine;
use crate::tasks::store::TaskStore;

use super::catalog::{resolve_human_input_payload, schedule_input_payload, view_artifact_window, ArtifactView};
use super::registry::{ToolKind, ToolRegistry};

pub struct ToolDispatcher {
    pub registry: ToolRegistry,
    pub services: Arc<ServiceClientFacade>,
    pub audit: Arc<AuditEmitter>,
    pub permissions: PermissionEvaluator,
    pub tasks: Arc<BackgroundTaskEngine>,
    pub task_store: Arc<dyn TaskStore>,
    pub run_status: Arc<RunStatusResolver>,
    /// Background-task TTL, threaded from `GatewayConfig::task_ttl`
    /// (spec.md §5, default 12h) rather than a local default.
    pub task_ttl: Duration,
}

fn param(params: &Value, key: &str) -> Option<Value> {
    params.get(key).cloned()
}

fn str_param(params: &Value, key: &str) -> GatewayResult<String> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Validation(format!("missing or non-string '{key}'")))
}

fn usize_param(params: &Value, key: &str, default: usize) -> usize {
    params
        .get(key)
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

impl ToolDispatcher {
    /// Validate input, gate on permission, then invoke the named tool.
    /// Every branch — schema failure, permission denial, handler error —
    /// returns a `CallToolResult`; nothing here propagates a transport
    /// error (spec.md §4.3).
    pub async fn dispatch(&self, ctx: &AuthContext, tool_name: &str, params: Value) -> CallToolResult {
        let Some(spec) = self.registry.find(tool_name) else {
            return CallToolResult::error(format!("unknown tool '{tool_name}'"));
        };

        if let Err(message) = self.validate_input(spec, &params) {
            return CallToolResult::error(message);
        }

        if let Some(path) = spec.permission_path {
            use crate::auth::permission::PermissionDecision;
            if self.permissions.evaluate(ctx, path) == PermissionDecision::Denied {
                return CallToolResult::error(PermissionEvaluator::denial_message(path));
            }
        }

        match self.invoke(ctx, spec.kind, tool_name, params).await {
            Ok(result) => result,
            Err(err) => err.to_tool_error(),
        }
    }

    fn validate_input(&self, spec: &super::registry::ToolSpec, params: &Value) -> Result<(), String> {
        let validator = match jsonschema::validator_for(&spec.input_schema) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(target: "gateway::tools", tool = spec.name, error = %err, "schema failed to compile");
                return Ok(());
            }
        };
        let errors: Vec<String> = validator.iter_errors(params).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(format!("invalid input for '{}': {}", spec.name, errors.join("; ")))
        }
    }

    async fn invoke(
        &self,
        ctx: &AuthContext,
        kind: ToolKind,
        name: &str,
        params: Value,
    ) -> GatewayResult<CallToolResult> {
        if kind == ToolKind::TaskSupporting {
            return self.invoke_task_supporting(ctx, name, params).await;
        }

        match name {
            "list_workflows" => {
                let workflows = self.services.workflow_engine()?.list(ctx).await?;
                Ok(CallToolResult::success(&workflows))
            }
            "get_workflow" => {
                let id = str_param(&params, "id")?;
                let workflow = self.services.workflow_engine()?.find_by_id(ctx, &id).await?;
                Ok(CallToolResult::success(&workflow))
            }
            "create_workflow" => {
                let workflow_name = str_param(&params, "name")?;
                let graph = param(&params, "graph").unwrap_or(Value::Null);
                let workflow = self
                    .services
                    .workflow_engine()?
                    .create(ctx, &workflow_name, graph)
                    .await?;
                self.audit("workflow.create", "workflow", &workflow.id, ctx).await;
                Ok(CallToolResult::success(&workflow))
            }
            "update_workflow" => {
                let id = str_param(&params, "id")?;
                let graph = param(&params, "graph").unwrap_or(Value::Null);
                let workflow = self.services.workflow_engine()?.update(ctx, &id, graph).await?;
                self.audit("workflow.update", "workflow", &id, ctx).await;
                Ok(CallToolResult::success(&workflow))
            }
            "update_workflow_metadata" => {
                let id = str_param(&params, "id")?;
                let metadata = param(&params, "metadata").unwrap_or(Value::Null);
                let workflow = self
                    .services
                    .workflow_engine()?
                    .update_metadata(ctx, &id, metadata)
                    .await?;
                self.audit("workflow.update_metadata", "workflow", &id, ctx).await;
                Ok(CallToolResult::success(&workflow))
            }
            "delete_workflow" => {
                let id = str_param(&params, "id")?;
                self.services.workflow_engine()?.delete(ctx, &id).await?;
                self.audit("workflow.delete", "workflow", &id, ctx).await;
                Ok(CallToolResult::success(&serde_json::json!({"deleted": true})))
            }
            "list_runs" => {
                let workflow_id = str_param(&params, "workflow_id")?;
                let runs = self.services.workflow_engine()?.list_runs(ctx, &workflow_id).await?;
                Ok(CallToolResult::success(&runs))
            }
            "get_run_status" => {
                let run_id = str_param(&params, "run_id")?;
                let resolved = self.run_status.resolve(ctx, &run_id).await?;
                Ok(CallToolResult::success(&resolved))
            }
            "get_run_result" => {
                let run_id = str_param(&params, "run_id")?;
                let result = self.services.workflow_engine()?.get_run_result(ctx, &run_id).await?;
                Ok(CallToolResult::success(&result))
            }
            "get_run_config" => {
                let run_id = str_param(&params, "run_id")?;
                let config = self.services.workflow_engine()?.get_run_config(ctx, &run_id).await?;
                Ok(CallToolResult::success(&config))
            }
            "get_run_trace" => {
                let run_id = str_param(&params, "run_id")?;
                let trace = self.services.trace()?.get_trace(ctx, &run_id).await?;
                Ok(CallToolResult::success(&trace))
            }
            "list_run_node_io" => {
                let run_id = str_param(&params, "run_id")?;
                self.services.workflow_engine()?.ensure_run_access(ctx, &run_id).await?;
                let io = self.services.node_io()?.list_run_node_io(ctx, &run_id).await?;
                Ok(CallToolResult::success(&io))
            }
            "get_node_io" => {
                let run_id = str_param(&params, "run_id")?;
                let node_id = str_param(&params, "node_id")?;
                // Tenant-access check must happen before the read, so a
                // cross-tenant guess at a valid node id is rejected
                // regardless of what the node-I/O store itself checks
                // (spec.md §4.3).
                self.services.workflow_engine()?.ensure_run_access(ctx, &run_id).await?;
                let io = self.services.node_io()?.get_node_io(ctx, &run_id, &node_id).await?;
                Ok(CallToolResult::success(&io))
            }
            "get_run_logs" => {
                let run_id = str_param(&params, "run_id")?;
                let logs = self.services.logs()?.get_logs(ctx, &run_id).await?;
                Ok(CallToolResult::success(&logs))
            }
            "list_child_runs" => {
                let run_id = str_param(&params, "run_id")?;
                let runs = self.services.workflow_engine()?.list_child_runs(ctx, &run_id).await?;
                Ok(CallToolResult::success(&runs))
            }
            "cancel_run" => {
                let run_id = str_param(&params, "run_id")?;
                self.services.workflow_engine()?.cancel_run(ctx, &run_id).await?;
                self.audit("run.cancel", "run", &run_id, ctx).await;
                Ok(CallToolResult::success(&serde_json::json!({"cancelled": true})))
            }
            "list_components" => {
                let components = self.services.components()?.list().await?;
                Ok(CallToolResult::success(&components))
            }
            "get_component" => {
                let id = str_param(&params, "id")?;
                let component = self.services.components()?.get(&id).await?;
                Ok(CallToolResult::success(&component))
            }
            "list_artifacts" => {
                let artifacts = self.services.artifacts()?.list_artifacts(ctx).await?;
                Ok(CallToolResult::success(&artifacts))
            }
            "list_run_artifacts" => {
                let run_id = str_param(&params, "run_id")?;
                let artifacts = self.services.artifacts()?.list_run_artifacts(ctx, &run_id).await?;
                Ok(CallToolResult::success(&artifacts))
            }
            "view_artifact" => {
                let id = str_param(&params, "id")?;
                let offset = usize_param(&params, "offset", 0);
                let limit = usize_param(&params, "limit", 8192);
                let downloaded = self.services.artifacts()?.download_artifact(ctx, &id).await?;
                let view = view_artifact_window(
                    &downloaded.buffer,
                    &downloaded.artifact.mime_type,
                    offset,
                    limit,
                );
                match view {
                    ArtifactView::Text { content, has_more } => Ok(CallToolResult::success(&serde_json::json!({
                        "content": content,
                        "hasMore": has_more,
                    }))),
                    ArtifactView::Binary { size, mime_type } => Ok(CallToolResult::success(&serde_json::json!({
                        "size": size,
                        "mimeType": mime_type,
                    }))),
                }
            }
            "list_schedules" => {
                let schedules = self.services.schedules()?.list(ctx).await?;
                Ok(CallToolResult::success(&schedules))
            }
            "get_schedule" => {
                let id = str_param(&params, "id")?;
                let schedule = self.services.schedules()?.get(ctx, &id).await?;
                Ok(CallToolResult::success(&schedule))
            }
            "create_schedule" => {
                let workflow_id = str_param(&params, "workflow_id")?;
                let cron = str_param(&params, "cron")?;
                let payload = schedule_input_payload(param(&params, "inputs"));
                let schedule = self
                    .services
                    .schedules()?
                    .create(ctx, &workflow_id, &cron, payload)
                    .await?;
                self.audit("schedule.create", "schedule", &schedule.id, ctx).await;
                Ok(CallToolResult::success(&schedule))
            }
            "update_schedule" => {
                let id = str_param(&params, "id")?;
                let payload = param(&params, "inputs").map(schedule_input_payload);
                let schedule = self.services.schedules()?.update(ctx, &id, payload).await?;
                self.audit("schedule.update", "schedule", &id, ctx).await;
                Ok(CallToolResult::success(&schedule))
            }
            "pause_schedule" => {
                let id = str_param(&params, "id")?;
                let schedule = self.services.schedules()?.pause(ctx, &id).await?;
                Ok(CallToolResult::success(&schedule))
            }
            "resume_schedule" => {
                let id = str_param(&params, "id")?;
                let schedule = self.services.schedules()?.resume(ctx, &id).await?;
                Ok(CallToolResult::success(&schedule))
            }
            "trigger_schedule" => {
                let id = str_param(&params, "id")?;
                let run_id = self.services.schedules()?.trigger(ctx, &id).await?;
                Ok(CallToolResult::success(&serde_json::json!({"runId": run_id})))
            }
            "delete_schedule" => {
                let id = str_param(&params, "id")?;
                self.services.schedules()?.delete(ctx, &id).await?;
                self.audit("schedule.delete", "schedule", &id, ctx).await;
                Ok(CallToolResult::success(&serde_json::json!({"deleted": true})))
            }
            "list_secrets" => {
                let secrets = self.services.secrets()?.list(ctx).await?;
                Ok(CallToolResult::success(&secrets))
            }
            "create_secret" => {
                let secret_name = str_param(&params, "name")?;
                let value = str_param(&params, "value")?;
                let meta = self.services.secrets()?.create(ctx, &secret_name, &value).await?;
                self.audit("secret.create", "secret", &meta.id, ctx).await;
                Ok(CallToolResult::success(&meta))
            }
            "rotate_secret" => {
                let id = str_param(&params, "id")?;
                let value = str_param(&params, "value")?;
                let meta = self.services.secrets()?.rotate(ctx, &id, &value).await?;
                self.audit("secret.rotate", "secret", &id, ctx).await;
                Ok(CallToolResult::success(&meta))
            }
            "update_secret" => {
                let id = str_param(&params, "id")?;
                let new_name = params.get("name").and_then(Value::as_str);
                let meta = self.services.secrets()?.update(ctx, &id, new_name).await?;
                self.audit("secret.update", "secret", &id, ctx).await;
                Ok(CallToolResult::success(&meta))
            }
            "delete_secret" => {
                let id = str_param(&params, "id")?;
                self.services.secrets()?.delete(ctx, &id).await?;
                self.audit("secret.delete", "secret", &id, ctx).await;
                Ok(CallToolResult::success(&serde_json::json!({"deleted": true})))
            }
            "list_human_inputs" => {
                let inputs = self.services.human_inputs()?.list(ctx).await?;
                Ok(CallToolResult::success(&inputs))
            }
            "get_human_input" => {
                let id = str_param(&params, "id")?;
                let input = self.services.human_inputs()?.get(ctx, &id).await?;
                Ok(CallToolResult::success(&input))
            }
            "resolve_human_input" => {
                let id = str_param(&params, "id")?;
                let action = str_param(&params, "action")?;
                let data = param(&params, "data");
                let response_data = resolve_human_input_payload(&action, data)?;
                let input = self
                    .services
                    .human_inputs()?
                    .resolve(ctx, &id, response_data)
                    .await?;
                self.audit("human_input.resolve", "human_input", &id, ctx).await;
                Ok(CallToolResult::success(&input))
            }
            other => Err(GatewayError::NotFound(format!("tool '{other}' has no handler"))),
        }
    }

    async fn invoke_task_supporting(
        &self,
        ctx: &AuthContext,
        name: &str,
        params: Value,
    ) -> GatewayResult<CallToolResult> {
        match name {
            "run_workflow" => {
                let workflow_id = str_param(&params, "workflow_id")?;
                let inputs = param(&params, "inputs").unwrap_or_else(|| serde_json::json!({}));
                let task_id = self
                    .tasks
                    .start_and_monitor(ctx, &workflow_id, inputs, self.task_ttl)
                    .await?;
                self.audit("run.start", "run", &task_id, ctx).await;
                Ok(CallToolResult::success(&serde_json::json!({"taskId": task_id})))
            }
            other => Err(GatewayError::NotFound(format!("task-supporting tool '{other}' has no handler"))),
        }
    }

    async fn audit(&self, action: &str, resource_type: &str, resource_id: &str, ctx: &AuthContext) {
        self.audit
            .emit(AuditRecord::new(action, resource_type, resource_id, ctx));
    }

    /// The three task-query operations the Background-Task Engine
    /// exposes to the client directly (spec.md §4.4), gated by
    /// ownership rather than the permission matrix: a task belongs to
    /// whoever created it via `run_workflow`.
    pub async fn get_task(&self, ctx: &AuthContext, task_id: &str) -> GatewayResult<CallToolResult> {
        self.ensure_task_owner(ctx, task_id).await?;
        let task = self.task_store.get_task(task_id).await?;
        Ok(CallToolResult::success(&task))
    }

    pub async fn get_task_result(&self, ctx: &AuthContext, task_id: &str) -> GatewayResult<CallToolResult> {
        self.ensure_task_owner(ctx, task_id).await?;
        let task = self.task_store.get_task(task_id).await?;
        Ok(CallToolResult::success(&task.result))
    }

    pub async fn cancel_task(&self, ctx: &AuthContext, task_id: &str) -> GatewayResult<CallToolResult> {
        self.ensure_task_owner(ctx, task_id).await?;
        self.task_store.cancel_task(task_id).await?;
        Ok(CallToolResult::success(&serde_json::json!({"cancelled": true})))
    }

    async fn ensure_task_owner(&self, ctx: &AuthContext, task_id: &str) -> GatewayResult<()> {
        match self.task_store.owner_of(task_id).await {
            Some(owner) if owner == ctx.principal_id => Ok(()),
            Some(_) => Err(GatewayError::Authorization(format!(
                "task {task_id} does not belong to the caller"
            ))),
            None => Err(GatewayError::NotFound(format!("task {task_id}"))),
        }
    }
}
