//! Data shapes and trait contracts for the backing services the gateway
//! delegates to (spec.md §6). These are the "external collaborators":
//! the workflow engine, artifacts, schedules, secrets, human-inputs,
//! trace, log-stream, node-I/O and the components catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::context::AuthContext;
use crate::error::GatewayResult;

/// The standard run-status set (spec.md §3, Glossary). `Stale` is
/// inferred only and is never produced directly by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Queued,
    AwaitingInput,
    Completed,
    Failed,
    Cancelled,
    Terminated,
    TimedOut,
    Stale,
}

impl RunStatus {
    /// Terminal statuses never transition further (spec.md Glossary).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed
                | RunStatus::Failed
                | RunStatus::Cancelled
                | RunStatus::Terminated
                | RunStatus::TimedOut
        )
    }
}

/// Error surfaced by a workflow-engine call that distinguishes "the run
/// is gone from the engine's perspective" from any other failure, since
/// the Run-Status Resolver branches on exactly that distinction
/// (spec.md §4.5).
#[derive(Debug, Clone)]
pub enum EngineError {
    NotFound,
    Other(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound => write!(f, "run not found in workflow engine"),
            EngineError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

/// What `describeWorkflow` returns on success.
#[derive(Debug, Clone)]
pub struct EngineDescribe {
    pub status: RunStatus,
    pub total_actions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub tenant_id: String,
    pub graph: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub workflow_id: String,
    pub tenant_id: String,
    pub status: RunStatus,
}

/// The backing workflow engine: the durable-execution system this
/// gateway is explicitly not implementing (spec.md §1). Optional
/// — a `None` facade field surfaces `ServiceUnavailable`.
#[async_trait]
pub trait WorkflowEngineClient: Send + Sync {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<WorkflowSummary>>;
    async fn find_by_id(&self, ctx: &AuthContext, id: &str) -> GatewayResult<Workflow>;
    async fn create(&self, ctx: &AuthContext, name: &str, graph: Value) -> GatewayResult<Workflow>;
    async fn update(&self, ctx: &AuthContext, id: &str, graph: Value) -> GatewayResult<Workflow>;
    async fn update_metadata(
        &self,
        ctx: &AuthContext,
        id: &str,
        metadata: Value,
    ) -> GatewayResult<Workflow>;
    async fn delete(&self, ctx: &AuthContext, id: &str) -> GatewayResult<()>;

    /// Start a run of `workflow_id`, returning its run id.
    async fn start_run(
        &self,
        ctx: &AuthContext,
        workflow_id: &str,
        inputs: Value,
    ) -> GatewayResult<String>;

    async fn list_runs(&self, ctx: &AuthContext, workflow_id: &str) -> GatewayResult<Vec<RunSummary>>;

    /// Live status from the engine's perspective. Distinguishes
    /// `EngineError::NotFound` from any other failure (spec.md §4.5).
    async fn describe_workflow(
        &self,
        ctx: &AuthContext,
        run_id: &str,
    ) -> Result<EngineDescribe, EngineError>;

    async fn get_run_result(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Value>;
    async fn get_run_config(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Value>;
    async fn list_child_runs(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Vec<RunSummary>>;
    async fn cancel_run(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<()>;

    /// Tenant-access check that must run before any node-I/O read
    /// (spec.md §4.3, "sensitive edge cases").
    async fn ensure_run_access(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub run_id: Option<String>,
    pub tenant_id: String,
    pub name: String,
    pub mime_type: String,
    pub size: usize,
}

pub struct DownloadedArtifact {
    pub buffer: Vec<u8>,
    pub artifact: Artifact,
}

#[async_trait]
pub trait ArtifactsService: Send + Sync {
    async fn list_artifacts(&self, ctx: &AuthContext) -> GatewayResult<Vec<Artifact>>;
    async fn list_run_artifacts(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Vec<Artifact>>;
    async fn download_artifact(&self, ctx: &AuthContext, id: &str) -> GatewayResult<DownloadedArtifact>;
    async fn delete_artifact(&self, ctx: &AuthContext, id: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub tenant_id: String,
    pub workflow_id: String,
    pub cron: String,
    pub paused: bool,
    pub input_payload: Value,
}

/// DTO the schedules service actually accepts, per spec.md §4.3's
/// mandatory `inputs` → `inputPayload` translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInputPayload {
    #[serde(rename = "runtimeInputs")]
    pub runtime_inputs: Value,
    #[serde(rename = "nodeOverrides")]
    pub node_overrides: Value,
}

#[async_trait]
pub trait SchedulesService: Send + Sync {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<Schedule>>;
    async fn get(&self, ctx: &AuthContext, id: &str) -> GatewayResult<Schedule>;
    async fn create(
        &self,
        ctx: &AuthContext,
        workflow_id: &str,
        cron: &str,
        input_payload: ScheduleInputPayload,
    ) -> GatewayResult<Schedule>;
    async fn update(
        &self,
        ctx: &AuthContext,
        id: &str,
        input_payload: Option<ScheduleInputPayload>,
    ) -> GatewayResult<Schedule>;
    async fn pause(&self, ctx: &AuthContext, id: &str) -> GatewayResult<Schedule>;
    async fn resume(&self, ctx: &AuthContext, id: &str) -> GatewayResult<Schedule>;
    async fn trigger(&self, ctx: &AuthContext, id: &str) -> GatewayResult<String>;
    async fn delete(&self, ctx: &AuthContext, id: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretMeta {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
}

#[async_trait]
pub trait SecretsService: Send + Sync {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<SecretMeta>>;
    async fn create(&self, ctx: &AuthContext, name: &str, value: &str) -> GatewayResult<SecretMeta>;
    async fn rotate(&self, ctx: &AuthContext, id: &str, value: &str) -> GatewayResult<SecretMeta>;
    async fn update(&self, ctx: &AuthContext, id: &str, name: Option<&str>) -> GatewayResult<SecretMeta>;
    async fn delete(&self, ctx: &AuthContext, id: &str) -> GatewayResult<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanInput {
    pub id: String,
    pub run_id: String,
    pub tenant_id: String,
    pub prompt: String,
    pub resolved: bool,
}

#[async_trait]
pub trait HumanInputsService: Send + Sync {
    async fn list(&self, ctx: &AuthContext) -> GatewayResult<Vec<HumanInput>>;
    async fn get(&self, ctx: &AuthContext, id: &str) -> GatewayResult<HumanInput>;

    /// Resolve a pending human-input request. `response_data` is the
    /// fully-assembled payload (caller data with the server-derived
    /// `status` already overridden — see
    /// `crate::tools::catalog::resolve_human_input`).
    async fn resolve(
        &self,
        ctx: &AuthContext,
        id: &str,
        response_data: Value,
    ) -> GatewayResult<HumanInput>;

    /// Whether there is a pending human-input row for `run_id` — used by
    /// the Run-Status Resolver's `AWAITING_INPUT` override (spec.md §4.5).
    async fn has_pending_for_run(&self, run_id: &str) -> GatewayResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEventType {
    Started,
    NodeCompleted,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TraceCounts {
    pub started: u64,
    pub completed: u64,
    pub failed: u64,
    pub node_completed: u64,
}

#[async_trait]
pub trait TraceService: Send + Sync {
    async fn counts(&self, run_id: &str) -> GatewayResult<TraceCounts>;
    async fn get_trace(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Value>;
}

#[async_trait]
pub trait LogStreamService: Send + Sync {
    async fn get_logs(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Vec<String>>;
}

#[async_trait]
pub trait NodeIoService: Send + Sync {
    async fn list_run_node_io(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<Value>;
    async fn get_node_io(&self, ctx: &AuthContext, run_id: &str, node_id: &str) -> GatewayResult<Value>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[async_trait]
pub trait ComponentsService: Send + Sync {
    async fn list(&self) -> GatewayResult<Vec<Component>>;
    async fn get(&self, id: &str) -> GatewayResult<Component>;
}

/// Stored run record as seen by the Run-Status Resolver's cache (spec.md
/// §3, `RunStatusSnapshot`).
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub tenant_id: String,
    pub stored_status: Option<RunStatus>,
    pub close_time: Option<DateTime<Utc>>,
    pub total_actions: u64,
    pub first_seen: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// The identity provider that issues and validates API keys — explicitly
/// out of scope for this gateway to implement (spec.md §1), but the
/// authentication middleware needs a typed boundary to call into it.
#[async_trait]
pub trait ApiKeyAuthenticator: Send + Sync {
    /// Resolve a bearer token to an `AuthContext`. `Authentication` on
    /// any credential failure (spec.md §4.1, "missing authentication →
    /// 401").
    async fn authenticate(&self, bearer_token: &str) -> GatewayResult<AuthContext>;
}

#[async_trait]
pub trait RunRepo: Send + Sync {
    /// Tenant-checked lookup. `NotFound` if the caller's tenant cannot
    /// see this run (spec.md §4.5 step 1).
    async fn get(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<RunRecord>;

    /// Fire-and-forget cache write for a newly-observed terminal status.
    /// Once written, never overwritten (spec.md §3, §4.5 step 3;
    /// monotonic terminality, spec.md §8).
    async fn cache_terminal_status(
        &self,
        run_id: &str,
        status: RunStatus,
        close_time: DateTime<Utc>,
    ) -> Result<(), String>;
}
