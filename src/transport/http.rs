//! Axum wiring for the Streamable HTTP framing: one `/mcp` endpoint
//! multiplexing POST (JSON-RPC), GET (push stream) and DELETE (session
//! termination), per spec.md §4.2's classification rules.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::stream::Stream;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::GatewayError;
use crate::mcp::jsonrpc::{JsonRpcIncoming, JsonRpcOutgoing, INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND};
use crate::services::types::ApiKeyAuthenticator;
use crate::session::manager::SessionManager;
use crate::session::session::SessionId;
use crate::tools::ToolDispatcher;

use super::sse::{BroadcastTransportHandle, SseEvent, StreamCloseGuard};

/// The header carrying a session id on continuation/stream/terminate
/// requests, and on the initialize response (spec.md §4.1, §4.2).
pub const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub authenticator: Arc<dyn ApiKeyAuthenticator>,
    pub dispatcher: Arc<ToolDispatcher>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/mcp", post(post_handler).get(get_handler).delete(delete_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn session_id_header(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(SessionId::from)
}

/// Classification per spec.md §4.2: POST + initialize body → Initialize;
/// POST + session header → Continuation; anything else on POST → 400.
fn is_initialize(message: &JsonRpcIncoming) -> bool {
    message.method == "initialize"
}

async fn post_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let message: JsonRpcIncoming = match serde_json::from_slice(&body) {
        Ok(m) => m,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                axum::Json(JsonRpcOutgoing::error(None, INVALID_REQUEST, "malformed JSON-RPC body")),
            )
                .into_response()
        }
    };

    if is_initialize(&message) {
        return handle_initialize(state, headers, message).await;
    }

    let Some(session_id) = session_id_header(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(JsonRpcOutgoing::error(
                message.id.clone(),
                INVALID_REQUEST,
                "missing session id and not an initialize request",
            )),
        )
            .into_response();
    };

    let Some(bearer) = bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let ctx = match state.authenticator.authenticate(bearer).await {
        Ok(ctx) => ctx,
        Err(err) => return err.http_status().into_response(),
    };

    let session = match state.sessions.lookup(&session_id, &ctx.principal_id, &ctx.tenant_id) {
        Ok(session) => session,
        Err(crate::session::manager::SessionLookupError::NoSuchSession) => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(crate::session::manager::SessionLookupError::PrincipalMismatch) => {
            return (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({"error": "Session belongs to a different principal"})),
            )
                .into_response()
        }
    };
    let _ = session;

    handle_continuation(state, ctx, message).await
}

async fn handle_initialize(state: AppState, headers: HeaderMap, message: JsonRpcIncoming) -> Response {
    let Some(bearer) = bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let ctx = match state.authenticator.authenticate(bearer).await {
        Ok(ctx) => ctx,
        Err(err) => return err.http_status().into_response(),
    };

    let session = state.sessions.create(
        ctx.principal_id.clone(),
        ctx.tenant_id.clone(),
        Arc::new(crate::session::session::NullTransportHandle),
    );

    let body = JsonRpcOutgoing::success(
        message.id.clone(),
        serde_json::json!({
            "protocolVersion": "2025-06-18",
            "serverInfo": { "name": "studio-mcp-gateway", "version": env!("CARGO_PKG_VERSION") },
        }),
    );

    let mut response = (StatusCode::OK, axum::Json(body)).into_response();
    if let Ok(value) = session.id.as_str().parse() {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

async fn handle_continuation(
    state: AppState,
    ctx: crate::auth::context::AuthContext,
    message: JsonRpcIncoming,
) -> Response {
    if message.is_notification() {
        // No response is sent for a notification (e.g.
        // `notifications/initialized`); acknowledge at the HTTP layer only.
        return StatusCode::ACCEPTED.into_response();
    }

    let params = message.params.clone().unwrap_or(Value::Null);
    let result = match message.method.as_str() {
        "tools/list" => {
            let tools: Vec<Value> = state
                .dispatcher
                .registry
                .all()
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "inputSchema": t.input_schema,
                    })
                })
                .collect();
            Ok(serde_json::json!({ "tools": tools }))
        }
        "tools/call" => {
            let name = params.get("name").and_then(Value::as_str).unwrap_or_default();
            let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
            let call_result = state.dispatcher.dispatch(&ctx, name, arguments).await;
            serde_json::to_value(call_result).map_err(GatewayError::Serialization)
        }
        "tasks/get" => dispatch_task_op(&state, &ctx, &params, TaskOp::Get).await,
        "tasks/result" => dispatch_task_op(&state, &ctx, &params, TaskOp::Result).await,
        "tasks/cancel" => dispatch_task_op(&state, &ctx, &params, TaskOp::Cancel).await,
        other => {
            return axum::Json(JsonRpcOutgoing::error(
                message.id,
                METHOD_NOT_FOUND,
                format!("unknown method '{other}'"),
            ))
            .into_response()
        }
    };

    match result {
        Ok(value) => axum::Json(JsonRpcOutgoing::success(message.id, value)).into_response(),
        Err(err) => axum::Json(JsonRpcOutgoing::error(message.id, INTERNAL_ERROR, err.to_string())).into_response(),
    }
}

enum TaskOp {
    Get,
    Result,
    Cancel,
}

async fn dispatch_task_op(
    state: &AppState,
    ctx: &crate::auth::context::AuthContext,
    params: &Value,
    op: TaskOp,
) -> Result<Value, GatewayError> {
    let task_id = params
        .get("taskId")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Validation("missing 'taskId'".to_string()))?;

    let result = match op {
        TaskOp::Get => state.dispatcher.get_task(ctx, task_id).await?,
        TaskOp::Result => state.dispatcher.get_task_result(ctx, task_id).await?,
        TaskOp::Cancel => state.dispatcher.cancel_task(ctx, task_id).await?,
    };
    serde_json::to_value(result).map_err(GatewayError::Serialization)
}

async fn get_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_header(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(bearer) = bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let ctx = match state.authenticator.authenticate(bearer).await {
        Ok(ctx) => ctx,
        Err(err) => return err.http_status().into_response(),
    };
    let session = match state.sessions.lookup(&session_id, &ctx.principal_id, &ctx.tenant_id) {
        Ok(session) => session,
        Err(crate::session::manager::SessionLookupError::NoSuchSession) => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(crate::session::manager::SessionLookupError::PrincipalMismatch) => {
            return (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({"error": "Session belongs to a different principal"})),
            )
                .into_response()
        }
    };
    let _ = session;

    let (handle, receiver) = BroadcastTransportHandle::new(64);
    let guard = StreamCloseGuard::new(state.sessions.clone(), session_id);

    let stream = sse_stream(receiver, guard, handle);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

/// Adapts the broadcast receiver into an SSE byte stream. `guard` is
/// moved into the generator so it drops — destroying the session —
/// exactly when the stream itself is dropped, whichever side ends it
/// first (spec.md §4.2, "Stream lifecycle").
fn sse_stream(
    mut receiver: tokio::sync::broadcast::Receiver<SseEvent>,
    guard: StreamCloseGuard,
    handle: Arc<BroadcastTransportHandle>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let _guard = guard;
        // Keeps the broadcast sender alive for the stream's lifetime —
        // dropping it early would close every receiver immediately.
        let _handle = handle;
        loop {
            match receiver.recv().await {
                Ok(event) => yield Ok(Event::default().data(event.data)),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

async fn delete_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_header(&headers) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(bearer) = bearer_token(&headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    let ctx = match state.authenticator.authenticate(bearer).await {
        Ok(ctx) => ctx,
        Err(err) => return err.http_status().into_response(),
    };
    match state.sessions.lookup(&session_id, &ctx.principal_id, &ctx.tenant_id) {
        Ok(_) => {}
        Err(crate::session::manager::SessionLookupError::NoSuchSession) => {
            return StatusCode::NOT_FOUND.into_response()
        }
        Err(crate::session::manager::SessionLookupError::PrincipalMismatch) => {
            return (
                StatusCode::FORBIDDEN,
                axum::Json(serde_json::json!({"error": "Session belongs to a different principal"})),
            )
                .into_response()
        }
    }

    state.sessions.destroy(&session_id);
    StatusCode::NO_CONTENT.into_response()
}
