//! Axum route handlers for the agent's JSON-RPC surface.

use crate::tasks::TaskManager;
use a2a_types::*;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub manager: TaskManager,
    pub card: AgentCard,
    pub start_time: Instant,
}

// POST /
pub async fn rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = match A2ARequest::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            log::warn!("[TaskManager] Rejected request: {}", err.error);
            return reply(err.into_response::<Value>());
        }
    };

    log::debug!(
        "[TaskManager] {} id={}",
        request.method(),
        request.id().map(ToString::to_string).unwrap_or_default()
    );
    match request {
        A2ARequest::SendTask(req) => reply(state.manager.on_send_task(req).await),
        A2ARequest::GetTask(req) => reply(state.manager.on_get_task(req).await),
    }
}

/// Caller mistakes map to 400; everything else, including unknown tasks, is
/// a normal 200 JSON-RPC reply.
fn reply<T: Serialize>(response: JsonRpcResponse<T>) -> Response {
    let status = match &response.error {
        Some(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    };
    (status, Json(response)).into_response()
}

// GET /.well-known/agent.json
pub async fn agent_card(State(state): State<Arc<AppState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<AgentStatus>) {
    (
        StatusCode::OK,
        Json(AgentStatus {
            running: true,
            agent: state.card.name.clone(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            tasks: state.manager.store().len(),
        }),
    )
}
