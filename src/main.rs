//! Binary entry point: loads configuration, wires the Service Client
//! Facade against in-memory backing-service doubles, and serves the
//! Streamable HTTP transport (spec.md §1, SPEC_FULL.md §A).

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use studio_mcp_gateway::auth::{AuditEmitter, PermissionEvaluator};
use studio_mcp_gateway::auth::audit::InMemoryAuditSink;
use studio_mcp_gateway::config::{Cli, GatewayConfig};
use studio_mcp_gateway::runstatus::{InMemoryRunRepo, RunStatusResolver};
use studio_mcp_gateway::services::facade::ServiceClientFacade;
use studio_mcp_gateway::services::mock::{
    MockApiKeyAuthenticator, MockArtifactsService, MockComponentsService, MockHumanInputsService,
    MockLogStreamService, MockNodeIoService, MockSchedulesService, MockSecretsService,
    MockTraceService, MockWorkflowEngine,
};
use studio_mcp_gateway::session::SessionManager;
use studio_mcp_gateway::tasks::engine::{BackgroundTaskEngine, TaskMonitorDeps};
use studio_mcp_gateway::tasks::store::InMemoryTaskStore;
use studio_mcp_gateway::tools::dispatcher::ToolDispatcher;
use studio_mcp_gateway::tools::registry::ToolRegistry;
use studio_mcp_gateway::transport::{build_router, AppState};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config: GatewayConfig = cli.resolve()?;
    tracing::info!(target: "gateway::startup", bind = %config.bind_address, "starting studio-mcp-gateway");

    // Backing services are out of scope to implement for real (spec.md
    // §1); production deployments wire their own `ServiceClientFacade`
    // clients here instead of these in-memory doubles.
    let services = Arc::new(
        ServiceClientFacade::new()
            .with_workflow_engine(Arc::new(MockWorkflowEngine::new()))
            .with_artifacts(Arc::new(MockArtifactsService::new()))
            .with_schedules(Arc::new(MockSchedulesService::new()))
            .with_secrets(Arc::new(MockSecretsService::new()))
            .with_human_inputs(Arc::new(MockHumanInputsService::new()))
            .with_components(Arc::new(MockComponentsService::new()))
            .with_trace(Arc::new(MockTraceService::new()))
            .with_logs(Arc::new(MockLogStreamService))
            .with_node_io(Arc::new(MockNodeIoService)),
    );

    let audit = Arc::new(AuditEmitter::new(Arc::new(InMemoryAuditSink::new())));
    let permissions = PermissionEvaluator::new();

    let task_store: Arc<dyn studio_mcp_gateway::tasks::store::TaskStore> =
        Arc::new(InMemoryTaskStore::new());
    let runs = Arc::new(InMemoryRunRepo::new());

    let task_engine = Arc::new(BackgroundTaskEngine::new(TaskMonitorDeps {
        engine: services
            .workflow_engine()
            .expect("workflow engine wired above")
            .clone(),
        store: task_store.clone(),
        runs: runs.clone(),
        poll_interval: config.task_poll_interval,
    }));

    let run_status = Arc::new(RunStatusResolver::new(
        runs.clone(),
        services
            .workflow_engine()
            .expect("workflow engine wired above")
            .clone(),
        services.trace().expect("trace service wired above").clone(),
        services
            .human_inputs()
            .expect("human-inputs service wired above")
            .clone(),
    ));

    let dispatcher = Arc::new(ToolDispatcher {
        registry: ToolRegistry::new(),
        services: services.clone(),
        audit: audit.clone(),
        permissions,
        tasks: task_engine,
        task_store: task_store.clone(),
        run_status,
        task_ttl: config.task_ttl,
    });

    let sessions = SessionManager::new();
    let authenticator = Arc::new(MockApiKeyAuthenticator::new());

    spawn_janitors(sessions.clone(), task_store, config.session_idle_timeout);

    let app = build_router(AppState {
        sessions,
        authenticator,
        dispatcher,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(target: "gateway::startup", addr = %config.bind_address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Background reapers, mirrored on `turbomcp_server`'s periodic
/// maintenance tasks: expired background tasks and idle sessions never
/// accumulate past their TTL (SPEC_FULL.md §B).
fn spawn_janitors(
    sessions: SessionManager,
    task_store: Arc<dyn studio_mcp_gateway::tasks::store::TaskStore>,
    session_idle_timeout: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let evicted = task_store.evict_expired(chrono::Utc::now()).await;
            if evicted > 0 {
                tracing::debug!(target: "gateway::tasks", evicted, "swept expired background tasks");
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let reaped = sessions.evict_idle(session_idle_timeout);
            if reaped > 0 {
                tracing::debug!(target: "gateway::session", reaped, "reaped idle sessions");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!(target: "gateway::startup", "shutdown signal received");
}
