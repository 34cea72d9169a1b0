//! HTTP coordination server.
//!
//! Serves the agent-facing RPC surface as JSON-RPC over HTTP. One server
//! instance handles every project; spawned agents reach it through the
//! `COORDINATION_ENDPOINT` environment variable.

use axum::{extract::State, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::errors::{DomainError, DomainResult};
use crate::services::coordination::CoordinationStore;

use super::handlers::{dispatch_tool, tool_listing};
use super::types::{JsonRpcRequest, JsonRpcResponse};

/// Shared state for the coordination server.
#[derive(Clone)]
pub struct CoordinationAppState {
    pub store: Arc<CoordinationStore>,
}

/// Build the router serving the coordination RPC surface.
pub fn coordination_router(store: Arc<CoordinationStore>) -> Router {
    let state = CoordinationAppState { store };
    Router::new()
        .route("/", post(handle_coordination_request))
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(store: Arc<CoordinationStore>, bind_addr: &str, port: u16) -> DomainResult<()> {
    let app = coordination_router(store);
    let addr = format!("{}:{}", bind_addr, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DomainError::Io(format!("cannot bind {}: {}", addr, e)))?;

    info!(addr = %addr, "coordination server listening");
    axum::serve(listener, app)
        .await
        .map_err(|e| DomainError::Io(e.to_string()))?;
    Ok(())
}

pub async fn handle_coordination_request(
    State(state): State<CoordinationAppState>,
    Json(request): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    debug!(method = %request.method, "coordination request");
    let id = request.id.clone();

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "trunkline-coordination",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),
        "tools/list" => JsonRpcResponse::success(id, tool_listing()),
        "tools/call" => handle_tool_call(&state, request).await,
        other => JsonRpcResponse::error(id, -32601, format!("Method not found: {}", other)),
    };

    Json(response)
}

async fn handle_tool_call(state: &CoordinationAppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();

    let Some(params) = request.params else {
        return JsonRpcResponse::error(id, -32600, "Missing params");
    };
    let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
        return JsonRpcResponse::error(id, -32600, "Missing tool name");
    };
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let envelope = dispatch_tool(&state.store, tool_name, arguments).await;
    let text = serde_json::to_string(&envelope)
        .unwrap_or_else(|_| r#"{"status":"error","message":"serialization failed","data":{}}"#.to_string());

    JsonRpcResponse::success(
        id,
        json!({
            "content": [
                { "type": "text", "text": text }
            ]
        }),
    )
}
