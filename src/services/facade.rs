//! `ServiceClientFacade`: the single aggregate the dispatcher and the
//! background-task engine hold onto. Each backing service is optional —
//! a deployment wires up only the services it has credentials for, and
//! a tool whose service is absent fails with `ServiceUnavailable`
//! rather than panicking (spec.md §4.7, §6).

use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};

use super::types::{
    ArtifactsService, ComponentsService, HumanInputsService, LogStreamService, NodeIoService,
    SchedulesService, SecretsService, TraceService, WorkflowEngineClient,
};

#[derive(Clone, Default)]
pub struct ServiceClientFacade {
    pub workflow_engine: Option<Arc<dyn WorkflowEngineClient>>,
    pub artifacts: Option<Arc<dyn ArtifactsService>>,
    pub schedules: Option<Arc<dyn SchedulesService>>,
    pub secrets: Option<Arc<dyn SecretsService>>,
    pub human_inputs: Option<Arc<dyn HumanInputsService>>,
    pub components: Option<Arc<dyn ComponentsService>>,
    pub trace: Option<Arc<dyn TraceService>>,
    pub logs: Option<Arc<dyn LogStreamService>>,
    pub node_io: Option<Arc<dyn NodeIoService>>,
}

impl ServiceClientFacade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workflow_engine(mut self, client: Arc<dyn WorkflowEngineClient>) -> Self {
        self.workflow_engine = Some(client);
        self
    }

    pub fn with_artifacts(mut self, svc: Arc<dyn ArtifactsService>) -> Self {
        self.artifacts = Some(svc);
        self
    }

    pub fn with_schedules(mut self, svc: Arc<dyn SchedulesService>) -> Self {
        self.schedules = Some(svc);
        self
    }

    pub fn with_secrets(mut self, svc: Arc<dyn SecretsService>) -> Self {
        self.secrets = Some(svc);
        self
    }

    pub fn with_human_inputs(mut self, svc: Arc<dyn HumanInputsService>) -> Self {
        self.human_inputs = Some(svc);
        self
    }

    pub fn with_components(mut self, svc: Arc<dyn ComponentsService>) -> Self {
        self.components = Some(svc);
        self
    }

    pub fn with_trace(mut self, svc: Arc<dyn TraceService>) -> Self {
        self.trace = Some(svc);
        self
    }

    pub fn with_logs(mut self, svc: Arc<dyn LogStreamService>) -> Self {
        self.logs = Some(svc);
        self
    }

    pub fn with_node_io(mut self, svc: Arc<dyn NodeIoService>) -> Self {
        self.node_io = Some(svc);
        self
    }

    pub fn workflow_engine(&self) -> GatewayResult<&Arc<dyn WorkflowEngineClient>> {
        self.workflow_engine
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("workflow engine".to_string()))
    }

    pub fn artifacts(&self) -> GatewayResult<&Arc<dyn ArtifactsService>> {
        self.artifacts
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("artifacts service".to_string()))
    }

    pub fn schedules(&self) -> GatewayResult<&Arc<dyn SchedulesService>> {
        self.schedules
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("schedules service".to_string()))
    }

    pub fn secrets(&self) -> GatewayResult<&Arc<dyn SecretsService>> {
        self.secrets
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("secrets service".to_string()))
    }

    pub fn human_inputs(&self) -> GatewayResult<&Arc<dyn HumanInputsService>> {
        self.human_inputs
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("human-inputs service".to_string()))
    }

    pub fn components(&self) -> GatewayResult<&Arc<dyn ComponentsService>> {
        self.components
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("components service".to_string()))
    }

    pub fn trace(&self) -> GatewayResult<&Arc<dyn TraceService>> {
        self.trace
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("trace service".to_string()))
    }

    pub fn logs(&self) -> GatewayResult<&Arc<dyn LogStreamService>> {
        self.logs
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("log stream service".to_string()))
    }

    pub fn node_io(&self) -> GatewayResult<&Arc<dyn NodeIoService>> {
        self.node_io
            .as_ref()
            .ok_or_else(|| GatewayError::ServiceUnavailable("node-I/O service".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_service_surfaces_service_unavailable() {
        let facade = ServiceClientFacade::new();
        let err = facade.workflow_engine().unwrap_err();
        assert!(matches!(err, GatewayError::ServiceUnavailable(_)));
    }
}
