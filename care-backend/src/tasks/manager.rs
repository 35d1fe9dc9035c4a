use super::store::TaskStore;
use crate::ai::Reasoner;
use crate::error::CareError;
use a2a_types::*;
use std::sync::Arc;
use std::time::Duration;

/// Runs one agent's inbound tasks through its reasoner.
pub struct TaskManager {
    agent_name: String,
    store: Arc<TaskStore>,
    reasoner: Arc<dyn Reasoner>,
    reasoning_timeout: Duration,
}

impl TaskManager {
    pub fn new(
        agent_name: impl Into<String>,
        store: Arc<TaskStore>,
        reasoner: Arc<dyn Reasoner>,
        reasoning_timeout: Duration,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            store,
            reasoner,
            reasoning_timeout,
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub async fn on_send_task(&self, request: SendTaskRequest) -> SendTaskResponse {
        let SendTaskRequest { id, params, .. } = request;

        if params.message.role != Role::User {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_params("inbound message must come from the user"),
            );
        }
        let Some(query) = params.message.first_text().map(str::to_string) else {
            return JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_params("message must start with a text part"),
            );
        };

        let task_id = params.id.clone();
        let session_id = params.session_id.clone();
        self.store.upsert(&params);
        self.store.transition(&task_id, TaskState::Working);
        log::info!(
            "[TaskManager] {} working on task {} (session {})",
            self.agent_name,
            task_id,
            session_id
        );

        let (reply, state) = match self.reason(&query, &session_id).await {
            Ok(text) => (text, TaskState::Completed),
            Err(e) => {
                log::error!("[TaskManager] Task {} failed: {}", task_id, e);
                (
                    format!("Sorry, an internal error occurred: {}", e),
                    TaskState::Failed,
                )
            }
        };

        match self.store.complete(&task_id, Message::agent(reply), state) {
            Some(task) => {
                log::info!("[TaskManager] Task {} {}", task_id, state);
                JsonRpcResponse::success(id, task.with_history_limit(params.history_length))
            }
            None => JsonRpcResponse::failure(id, JsonRpcError::task_not_found(&task_id)),
        }
    }

    pub async fn on_get_task(&self, request: GetTaskRequest) -> GetTaskResponse {
        let GetTaskRequest { id, params, .. } = request;
        match self.store.get(&params.id, params.history_length) {
            Some(task) => JsonRpcResponse::success(id, task),
            None => {
                log::debug!("[TaskManager] Unknown task {}", params.id);
                JsonRpcResponse::failure(id, JsonRpcError::task_not_found(&params.id))
            }
        }
    }

    async fn reason(&self, query: &str, session_id: &str) -> Result<String, CareError> {
        match tokio::time::timeout(
            self.reasoning_timeout,
            self.reasoner.invoke(query, session_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CareError::Reasoning(format!(
                "no reply within {:?}",
                self.reasoning_timeout
            ))),
        }
    }
}
