//! Shared wire types for the care agents and their RPC clients.
//!
//! Every agent speaks JSON-RPC 2.0 over `POST /` with two methods,
//! `tasks/send` and `tasks/get`, and describes itself with an [`AgentCard`].

mod card;
mod jsonrpc;
mod task;

pub use card::{AgentCard, AgentSkill, WELL_KNOWN_CARD_PATH};
pub use jsonrpc::*;
pub use task::{Message, Part, Role, Task, TaskQueryParams, TaskSendParams, TaskState, TaskStatus};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SEND_TASK: &str = "tasks/send";
pub const GET_TASK: &str = "tasks/get";

pub type SendTaskRequest = JsonRpcRequest<TaskSendParams>;
pub type GetTaskRequest = JsonRpcRequest<TaskQueryParams>;
pub type SendTaskResponse = JsonRpcResponse<Task>;
pub type GetTaskResponse = JsonRpcResponse<Task>;

pub fn send_task_request(params: TaskSendParams) -> SendTaskRequest {
    JsonRpcRequest::new(SEND_TASK, params)
}

pub fn get_task_request(params: TaskQueryParams) -> GetTaskRequest {
    JsonRpcRequest::new(GET_TASK, params)
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    pub running: bool,
    pub agent: String,
    pub uptime_secs: u64,
    pub tasks: usize,
}

// =====================================================
// Inbound Dispatch
// =====================================================

/// An inbound request, discriminated by its `method`.
#[derive(Debug, Clone)]
pub enum A2ARequest {
    SendTask(SendTaskRequest),
    GetTask(GetTaskRequest),
}

/// A request that could not be decoded, with whatever id could be salvaged
/// so the error response can still be correlated.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestError {
    pub id: Option<RequestId>,
    pub error: JsonRpcError,
}

impl RequestError {
    fn new(id: Option<RequestId>, error: JsonRpcError) -> Self {
        Self { id, error }
    }

    pub fn into_response<T>(self) -> JsonRpcResponse<T> {
        JsonRpcResponse::failure(self.id, self.error)
    }
}

#[derive(Deserialize)]
struct Envelope {
    jsonrpc: Option<String>,
    id: Option<RequestId>,
    method: String,
    params: Option<Value>,
}

impl A2ARequest {
    pub fn from_slice(body: &[u8]) -> Result<Self, RequestError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| RequestError::new(None, JsonRpcError::parse_error(e.to_string())))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let salvaged_id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        let envelope: Envelope = serde_json::from_value(value).map_err(|e| {
            RequestError::new(salvaged_id.clone(), JsonRpcError::invalid_request(e.to_string()))
        })?;

        if let Some(version) = envelope.jsonrpc.as_deref() {
            if version != JSONRPC_VERSION {
                return Err(RequestError::new(
                    envelope.id,
                    JsonRpcError::invalid_request(format!("unsupported jsonrpc version {}", version)),
                ));
            }
        }

        let id = envelope.id;
        let params = envelope.params.unwrap_or(Value::Null);
        match envelope.method.as_str() {
            SEND_TASK => {
                let params: TaskSendParams = serde_json::from_value(params).map_err(|e| {
                    RequestError::new(id.clone(), JsonRpcError::invalid_params(e.to_string()))
                })?;
                Ok(A2ARequest::SendTask(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    method: envelope.method,
                    params,
                }))
            }
            GET_TASK => {
                let params: TaskQueryParams = serde_json::from_value(params).map_err(|e| {
                    RequestError::new(id.clone(), JsonRpcError::invalid_params(e.to_string()))
                })?;
                Ok(A2ARequest::GetTask(JsonRpcRequest {
                    jsonrpc: JSONRPC_VERSION.to_string(),
                    id,
                    method: envelope.method,
                    params,
                }))
            }
            other => Err(RequestError::new(id, JsonRpcError::method_not_found(other))),
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            A2ARequest::SendTask(req) => req.id.as_ref(),
            A2ARequest::GetTask(req) => req.id.as_ref(),
        }
    }

    pub fn method(&self) -> &str {
        match self {
            A2ARequest::SendTask(_) => SEND_TASK,
            A2ARequest::GetTask(_) => GET_TASK,
        }
    }
}
