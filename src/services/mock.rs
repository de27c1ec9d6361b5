//! In-memory test doubles for the backing-service traits. Used by unit
//! and scenario tests; never compiled into the production binary wiring
//! (spec.md §6 lists these as external collaborators this gateway does
//! not implement for real).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::auth::context::AuthContext;
use crate::error::{GatewayError, GatewayResult};

use super::types::{
    ApiKeyAuthenticator, Artifact, ArtifactsService, Component, ComponentsService,
    DownloadedArtifact, EngineDescribe, EngineError, HumanInput, HumanInputsService,
    LogStreamService, NodeIoService, RunStatus, RunSummary, Schedule, ScheduleInputPayload,
    SchedulesService, SecretMeta, SecretsService, TraceCounts, TraceService, Workflow,
    WorkflowEngineClient, WorkflowSummary,
};

/// A scripted workflow-engine double: tests pre-load runs with a status
/// and the mock simply echoes it back, optionally incrementing
/// `total_actions` to simulate progress between polls.
#[derive(Default)]
pub struct MockWorkflowEngine {
    workflows: Mutex<HashMap<String, Workflow>>,
    runs: Mutex<HashMap<String, (RunStatus, u64)>>,
}

impl MockWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_run(&self, run_id: impl Into<String>, status: RunStatus, total_actions: u64) {
        self.runs.lock().insert(run_id.into(), (status, total_actions));
    }

    pub fn set_run_status(&self, run_id: &str, status: RunStatus) {
        if let Some(entry) = self.runs.lock().get_mut(run_id) {
            entry.0 = status;
        }
    }

    pub fn remove_run(&self, run_id: &str) {
        self.runs.lock().remove(run_id);
    }
}

#[async_trait]
impl WorkflowEngineClient for MockWorkflowEngine {
    async fn list(&self, _ctx: &AuthContext) -> GatewayResult<Vec<WorkflowSummary>> {
        Ok(self
            .workflows
            .lock()
            .values()
            .map(|w| WorkflowSummary {
                id: w.id.clone(),
                name: w.name.clone(),
                tenant_id: w.tenant_id.clone(),
            })
            .collect())
    }

    async fn find_by_id(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<Workflow> {
        self.workflows
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("workflow {id}")))
    }

    async fn create(&self, ctx: &AuthContext, name: &str, graph: Value) -> GatewayResult<Workflow> {
        let id = uuid::Uuid::new_v4().to_string();
        let workflow = Workflow {
            id: id.clone(),
            name: name.to_string(),
            tenant_id: ctx.tenant_id.clone(),
            graph,
        };
        self.workflows.lock().insert(id, workflow.clone());
        Ok(workflow)
    }

    async fn update(&self, _ctx: &AuthContext, id: &str, graph: Value) -> GatewayResult<Workflow> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("workflow {id}")))?;
        workflow.graph = graph;
        Ok(workflow.clone())
    }

    async fn update_metadata(
        &self,
        _ctx: &AuthContext,
        id: &str,
        metadata: Value,
    ) -> GatewayResult<Workflow> {
        let mut workflows = self.workflows.lock();
        let workflow = workflows
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("workflow {id}")))?;
        if let Some(name) = metadata.get("name").and_then(Value::as_str) {
            workflow.name = name.to_string();
        }
        Ok(workflow.clone())
    }

    async fn delete(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<()> {
        self.workflows.lock().remove(id);
        Ok(())
    }

    async fn start_run(
        &self,
        _ctx: &AuthContext,
        workflow_id: &str,
        _inputs: Value,
    ) -> GatewayResult<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.runs.lock().insert(run_id.clone(), (RunStatus::Running, 0));
        let _ = workflow_id;
        Ok(run_id)
    }

    async fn list_runs(&self, _ctx: &AuthContext, _workflow_id: &str) -> GatewayResult<Vec<RunSummary>> {
        Ok(Vec::new())
    }

    async fn describe_workflow(
        &self,
        _ctx: &AuthContext,
        run_id: &str,
    ) -> Result<EngineDescribe, EngineError> {
        match self.runs.lock().get(run_id) {
            Some((status, total_actions)) => Ok(EngineDescribe {
                status: *status,
                total_actions: *total_actions,
            }),
            None => Err(EngineError::NotFound),
        }
    }

    async fn get_run_result(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Value> {
        Ok(json!({}))
    }

    async fn get_run_config(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Value> {
        Ok(json!({}))
    }

    async fn list_child_runs(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Vec<RunSummary>> {
        Ok(Vec::new())
    }

    async fn cancel_run(&self, _ctx: &AuthContext, run_id: &str) -> GatewayResult<()> {
        self.set_run_status(run_id, RunStatus::Cancelled);
        Ok(())
    }

    async fn ensure_run_access(&self, _ctx: &AuthContext, run_id: &str) -> GatewayResult<()> {
        if self.runs.lock().contains_key(run_id) {
            Ok(())
        } else {
            Err(GatewayError::NotFound(format!("run {run_id}")))
        }
    }
}

#[derive(Default)]
pub struct MockArtifactsService {
    artifacts: Mutex<HashMap<String, (Artifact, Vec<u8>)>>,
}

impl MockArtifactsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, artifact: Artifact, buffer: Vec<u8>) {
        self.artifacts.lock().insert(artifact.id.clone(), (artifact, buffer));
    }
}

#[async_trait]
impl ArtifactsService for MockArtifactsService {
    async fn list_artifacts(&self, ctx: &AuthContext) -> GatewayResult<Vec<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .values()
            .map(|(a, _)| a.clone())
            .filter(|a| a.tenant_id == ctx.tenant_id)
            .collect())
    }

    async fn list_run_artifacts(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Vec<Artifact>> {
        Ok(self
            .artifacts
            .lock()
            .values()
            .map(|(a, _)| a.clone())
            .filter(|a| a.tenant_id == ctx.tenant_id && a.run_id.as_deref() == Some(run_id))
            .collect())
    }

    async fn download_artifact(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<DownloadedArtifact> {
        self.artifacts
            .lock()
            .get(id)
            .map(|(artifact, buffer)| DownloadedArtifact {
                buffer: buffer.clone(),
                artifact: artifact.clone(),
            })
            .ok_or_else(|| GatewayError::NotFound(format!("artifact {id}")))
    }

    async fn delete_artifact(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<()> {
        self.artifacts.lock().remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSchedulesService {
    schedules: Mutex<HashMap<String, Schedule>>,
}

impl MockSchedulesService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulesService for MockSchedulesService {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<Schedule>> {
        Ok(self
            .schedules
            .lock()
            .values()
            .filter(|s| s.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn get(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<Schedule> {
        self.schedules
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("schedule {id}")))
    }

    async fn create(
        &self,
        ctx: &AuthContext,
        workflow_id: &str,
        cron: &str,
        input_payload: ScheduleInputPayload,
    ) -> GatewayResult<Schedule> {
        let id = uuid::Uuid::new_v4().to_string();
        let schedule = Schedule {
            id: id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            workflow_id: workflow_id.to_string(),
            cron: cron.to_string(),
            paused: false,
            input_payload: serde_json::to_value(input_payload)
                .map_err(GatewayError::Serialization)?,
        };
        self.schedules.lock().insert(id, schedule.clone());
        Ok(schedule)
    }

    async fn update(
        &self,
        _ctx: &AuthContext,
        id: &str,
        input_payload: Option<ScheduleInputPayload>,
    ) -> GatewayResult<Schedule> {
        let mut schedules = self.schedules.lock();
        let schedule = schedules
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("schedule {id}")))?;
        if let Some(payload) = input_payload {
            schedule.input_payload =
                serde_json::to_value(payload).map_err(GatewayError::Serialization)?;
        }
        Ok(schedule.clone())
    }

    async fn pause(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<Schedule> {
        let mut schedules = self.schedules.lock();
        let schedule = schedules
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("schedule {id}")))?;
        schedule.paused = true;
        Ok(schedule.clone())
    }

    async fn resume(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<Schedule> {
        let mut schedules = self.schedules.lock();
        let schedule = schedules
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("schedule {id}")))?;
        schedule.paused = false;
        Ok(schedule.clone())
    }

    async fn trigger(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<String> {
        if self.schedules.lock().contains_key(id) {
            Ok(uuid::Uuid::new_v4().to_string())
        } else {
            Err(GatewayError::NotFound(format!("schedule {id}")))
        }
    }

    async fn delete(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<()> {
        self.schedules.lock().remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockSecretsService {
    secrets: Mutex<HashMap<String, SecretMeta>>,
}

impl MockSecretsService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretsService for MockSecretsService {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<SecretMeta>> {
        Ok(self
            .secrets
            .lock()
            .values()
            .filter(|s| s.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn create(&self, ctx: &AuthContext, name: &str, _value: &str) -> GatewayResult<SecretMeta> {
        let id = uuid::Uuid::new_v4().to_string();
        let meta = SecretMeta {
            id: id.clone(),
            tenant_id: ctx.tenant_id.clone(),
            name: name.to_string(),
        };
        self.secrets.lock().insert(id, meta.clone());
        Ok(meta)
    }

    async fn rotate(&self, _ctx: &AuthContext, id: &str, _value: &str) -> GatewayResult<SecretMeta> {
        self.secrets
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("secret {id}")))
    }

    async fn update(&self, _ctx: &AuthContext, id: &str, name: Option<&str>) -> GatewayResult<SecretMeta> {
        let mut secrets = self.secrets.lock();
        let meta = secrets
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("secret {id}")))?;
        if let Some(name) = name {
            meta.name = name.to_string();
        }
        Ok(meta.clone())
    }

    async fn delete(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<()> {
        self.secrets.lock().remove(id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MockHumanInputsService {
    inputs: Mutex<HashMap<String, HumanInput>>,
}

impl MockHumanInputsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, input: HumanInput) {
        self.inputs.lock().insert(input.id.clone(), input);
    }
}

#[async_trait]
impl HumanInputsService for MockHumanInputsService {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<HumanInput>> {
        Ok(self
            .inputs
            .lock()
            .values()
            .filter(|i| i.tenant_id == ctx.tenant_id)
            .cloned()
            .collect())
    }

    async fn get(&self, _ctx: &AuthContext, id: &str) -> GatewayResult<HumanInput> {
        self.inputs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("human input {id}")))
    }

    async fn resolve(
        &self,
        _ctx: &AuthContext,
        id: &str,
        _response_data: Value,
    ) -> GatewayResult<HumanInput> {
        let mut inputs = self.inputs.lock();
        let input = inputs
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound(format!("human input {id}")))?;
        input.resolved = true;
        Ok(input.clone())
    }

    async fn has_pending_for_run(&self, run_id: &str) -> GatewayResult<bool> {
        Ok(self
            .inputs
            .lock()
            .values()
            .any(|i| i.run_id == run_id && !i.resolved))
    }
}

#[derive(Default)]
pub struct MockComponentsService {
    components: Mutex<HashMap<String, Component>>,
}

impl MockComponentsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, component: Component) {
        self.components.lock().insert(component.id.clone(), component);
    }
}

#[async_trait]
impl ComponentsService for MockComponentsService {
    async fn list(&self) -> GatewayResult<Vec<Component>> {
        Ok(self.components.lock().values().cloned().collect())
    }

    async fn get(&self, id: &str) -> GatewayResult<Component> {
        self.components
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("component {id}")))
    }
}

#[derive(Default)]
pub struct MockTraceService {
    counts: Mutex<HashMap<String, TraceCounts>>,
}

impl MockTraceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_counts(&self, run_id: impl Into<String>, counts: TraceCounts) {
        self.counts.lock().insert(run_id.into(), counts);
    }
}

#[async_trait]
impl TraceService for MockTraceService {
    async fn counts(&self, run_id: &str) -> GatewayResult<TraceCounts> {
        Ok(self.counts.lock().get(run_id).copied().unwrap_or_default())
    }

    async fn get_trace(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Value> {
        Ok(json!([]))
    }
}

#[derive(Default)]
pub struct MockLogStreamService;

#[async_trait]
impl LogStreamService for MockLogStreamService {
    async fn get_logs(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockNodeIoService;

#[async_trait]
impl NodeIoService for MockNodeIoService {
    async fn list_run_node_io(&self, _ctx: &AuthContext, _run_id: &str) -> GatewayResult<Value> {
        Ok(json!([]))
    }

    async fn get_node_io(&self, _ctx: &AuthContext, _run_id: &str, _node_id: &str) -> GatewayResult<Value> {
        Ok(json!({}))
    }
}

/// Scripted identity provider: keys are pre-registered with the exact
/// `AuthContext` they should resolve to.
#[derive(Default)]
pub struct MockApiKeyAuthenticator {
    keys: Mutex<HashMap<String, AuthContext>>,
}

impl MockApiKeyAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, bearer_token: impl Into<String>, ctx: AuthContext) {
        self.keys.lock().insert(bearer_token.into(), ctx);
    }
}

#[async_trait]
impl ApiKeyAuthenticator for MockApiKeyAuthenticator {
    async fn authenticate(&self, bearer_token: &str) -> GatewayResult<AuthContext> {
        self.keys
            .lock()
            .get(bearer_token)
            .cloned()
            .ok_or_else(|| GatewayError::Authentication("unknown API key".to_string()))
    }
}
