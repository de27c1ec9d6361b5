//! The tool catalog: metadata only (name, description, input schema,
//! permission path, dispatch kind). Handlers live in
//! [`crate::tools::dispatcher`] and are matched by name, mirroring
//! `turbomcp_server`'s `ToolHandler::tool_definition` split between
//! metadata and invocation.

use serde_json::{json, Value};

use crate::mcp::InputSchema;

/// Whether a tool completes synchronously or hands back a background
/// task handle (spec.md §3, `Tool`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Sync,
    TaskSupporting,
}

/// Catalog entry for one tool. Immutable once built; not bound to any
/// particular `AuthContext` (spec.md §3 notes the MCP-level `Tool` is
/// scoped per-session by closure capture — this gateway instead carries
/// the context explicitly through the dispatcher, since there is no
/// per-session handler closure here).
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: InputSchema,
    pub permission_path: Option<&'static str>,
    pub kind: ToolKind,
}

fn obj_schema(properties: Value, required: &[&str]) -> InputSchema {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn empty_schema() -> InputSchema {
    json!({ "type": "object", "properties": {} })
}

/// Owns the full, fixed tool catalog (spec.md §4.3's "exact set" table).
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: catalog() }
    }

    pub fn find(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn all(&self) -> &[ToolSpec] {
        &self.tools
    }
}

fn catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "list_workflows",
            description: "List workflows visible to the caller's tenant.",
            input_schema: empty_schema(),
            permission_path: Some("workflows.list"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_workflow",
            description: "Fetch a single workflow by id.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("workflows.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "create_workflow",
            description: "Create a new workflow graph.",
            input_schema: obj_schema(
                json!({"name": {"type": "string"}, "graph": {"type": "object"}}),
                &["name", "graph"],
            ),
            permission_path: Some("workflows.create"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "update_workflow",
            description: "Replace a workflow's graph.",
            input_schema: obj_schema(
                json!({"id": {"type": "string"}, "graph": {"type": "object"}}),
                &["id", "graph"],
            ),
            permission_path: Some("workflows.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "update_workflow_metadata",
            description: "Patch a workflow's metadata (e.g. name) without touching its graph.",
            input_schema: obj_schema(
                json!({"id": {"type": "string"}, "metadata": {"type": "object"}}),
                &["id", "metadata"],
            ),
            permission_path: Some("workflows.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "delete_workflow",
            description: "Delete a workflow.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("workflows.delete"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "run_workflow",
            description: "Start a workflow run and return a background task handle.",
            input_schema: obj_schema(
                json!({"workflow_id": {"type": "string"}, "inputs": {"type": "object"}}),
                &["workflow_id"],
            ),
            permission_path: Some("workflows.run"),
            kind: ToolKind::TaskSupporting,
        },
        ToolSpec {
            name: "list_runs",
            description: "List runs of a workflow.",
            input_schema: obj_schema(json!({"workflow_id": {"type": "string"}}), &["workflow_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_run_status",
            description: "Resolve a run's current status (cache-first, trace-inferred fallback).",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_run_result",
            description: "Fetch the final result payload of a completed run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_run_config",
            description: "Fetch the resolved configuration a run executed with.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_run_trace",
            description: "Fetch the trace-event log for a run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_run_node_io",
            description: "List per-node input/output records for a run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_node_io",
            description: "Fetch a single node's input/output record.",
            input_schema: obj_schema(
                json!({"run_id": {"type": "string"}, "node_id": {"type": "string"}}),
                &["run_id", "node_id"],
            ),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_run_logs",
            description: "Fetch log lines emitted during a run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_child_runs",
            description: "List runs spawned as children of a parent run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "cancel_run",
            description: "Cancel an in-progress run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("runs.cancel"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_components",
            description: "List the built-in component catalog.",
            input_schema: empty_schema(),
            permission_path: None,
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_component",
            description: "Fetch a single component's description.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: None,
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_artifacts",
            description: "List artifacts visible to the caller's tenant.",
            input_schema: empty_schema(),
            permission_path: Some("artifacts.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_run_artifacts",
            description: "List artifacts produced by a specific run.",
            input_schema: obj_schema(json!({"run_id": {"type": "string"}}), &["run_id"]),
            permission_path: Some("artifacts.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "view_artifact",
            description: "View a windowed slice of an artifact's content.",
            input_schema: obj_schema(
                json!({
                    "id": {"type": "string"},
                    "offset": {"type": "integer"},
                    "limit": {"type": "integer"},
                }),
                &["id"],
            ),
            permission_path: Some("artifacts.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_schedules",
            description: "List schedules for the caller's tenant.",
            input_schema: empty_schema(),
            permission_path: Some("schedules.list"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_schedule",
            description: "Fetch a single schedule.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("schedules.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "create_schedule",
            description: "Create a cron-driven schedule for a workflow.",
            input_schema: obj_schema(
                json!({
                    "workflow_id": {"type": "string"},
                    "cron": {"type": "string"},
                    "inputs": {"type": "object"},
                }),
                &["workflow_id", "cron"],
            ),
            permission_path: Some("schedules.create"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "update_schedule",
            description: "Update a schedule's inputs.",
            input_schema: obj_schema(
                json!({"id": {"type": "string"}, "inputs": {"type": "object"}}),
                &["id"],
            ),
            permission_path: Some("schedules.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "pause_schedule",
            description: "Pause a schedule.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("schedules.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "resume_schedule",
            description: "Resume a paused schedule.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("schedules.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "trigger_schedule",
            description: "Trigger a schedule to run immediately.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("schedules.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "delete_schedule",
            description: "Delete a schedule.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("schedules.delete"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_secrets",
            description: "List secret metadata for the caller's tenant (never values).",
            input_schema: empty_schema(),
            permission_path: Some("secrets.list"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "create_secret",
            description: "Create a new secret.",
            input_schema: obj_schema(
                json!({"name": {"type": "string"}, "value": {"type": "string"}}),
                &["name", "value"],
            ),
            permission_path: Some("secrets.create"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "rotate_secret",
            description: "Rotate a secret's value.",
            input_schema: obj_schema(
                json!({"id": {"type": "string"}, "value": {"type": "string"}}),
                &["id", "value"],
            ),
            permission_path: Some("secrets.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "update_secret",
            description: "Rename a secret.",
            input_schema: obj_schema(
                json!({"id": {"type": "string"}, "name": {"type": "string"}}),
                &["id"],
            ),
            permission_path: Some("secrets.update"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "delete_secret",
            description: "Delete a secret.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("secrets.delete"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "list_human_inputs",
            description: "List pending and resolved human-input requests.",
            input_schema: empty_schema(),
            permission_path: Some("human-inputs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "get_human_input",
            description: "Fetch a single human-input request.",
            input_schema: obj_schema(json!({"id": {"type": "string"}}), &["id"]),
            permission_path: Some("human-inputs.read"),
            kind: ToolKind::Sync,
        },
        ToolSpec {
            name: "resolve_human_input",
            description: "Approve or reject a pending human-input request.",
            input_schema: obj_schema(
                json!({
                    "id": {"type": "string"},
                    "action": {"type": "string", "enum": ["approve", "reject"]},
                    "data": {"type": "object"},
                }),
                &["id", "action"],
            ),
            permission_path: Some("human-inputs.resolve"),
            kind: ToolKind::Sync,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_no_duplicate_names() {
        let registry = ToolRegistry::new();
        let mut names: Vec<&str> = registry.all().iter().map(|t| t.name).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }

    #[test]
    fn components_tools_have_no_permission_path() {
        let registry = ToolRegistry::new();
        assert!(registry.find("list_components").unwrap().permission_path.is_none());
        assert!(registry.find("get_component").unwrap().permission_path.is_none());
    }

    #[test]
    fn run_workflow_is_task_supporting() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.find("run_workflow").unwrap().kind, ToolKind::TaskSupporting);
    }
}
