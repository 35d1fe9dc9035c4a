//! JSON-RPC client for a peer agent.

use crate::error::{CareError, CareResult};
use crate::http::{shared_client, AGENT_CALL_TIMEOUT};
use a2a_types::*;
use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;

const MAX_ERROR_BODY: usize = 512;

pub struct AgentConnector {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl AgentConnector {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            client: shared_client().clone(),
        }
    }

    pub fn from_card(card: &AgentCard) -> Self {
        Self::new(card.name.clone(), card.url.clone())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one user utterance as a brand-new task and wait for the peer's answer.
    pub async fn send_task(
        &self,
        text: &str,
        session_id: &str,
        metadata: Option<Map<String, Value>>,
    ) -> CareResult<Task> {
        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let mut params = TaskSendParams::new(task_id, session_id, Message::user(text));
        params.metadata = metadata;
        self.send(params).await
    }

    pub async fn send(&self, params: TaskSendParams) -> CareResult<Task> {
        log::info!(
            "[Connector] tasks/send -> {} (task {}, session {})",
            self.name,
            params.id,
            params.session_id
        );
        self.call(send_task_request(params)).await
    }

    pub async fn get_task(&self, task_id: &str, history_length: Option<usize>) -> CareResult<Task> {
        let mut params = TaskQueryParams::new(task_id);
        params.history_length = history_length;
        self.call(get_task_request(params)).await
    }

    pub async fn fetch_card(&self) -> CareResult<AgentCard> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), WELL_KNOWN_CARD_PATH);
        let response = self
            .client
            .get(&url)
            .timeout(AGENT_CALL_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        self.decode(response).await
    }

    async fn call<P: Serialize>(&self, request: JsonRpcRequest<P>) -> CareResult<Task> {
        let response = self
            .client
            .post(&self.base_url)
            .timeout(AGENT_CALL_TIMEOUT)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let decoded: JsonRpcResponse<Task> = self.decode(response).await?;
        if let Some(err) = decoded.error {
            log::warn!("[Connector] {} answered with error {}", self.name, err);
            return Err(CareError::Rpc(err));
        }
        decoded.result.ok_or_else(|| {
            CareError::Decode(format!("{} sent a response with no result", self.name))
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> CareResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CareError::transport(format!("{}: failed to read body: {}", self.name, e)))?;

        if !status.is_success() {
            log::warn!("[Connector] {} returned HTTP {}", self.name, status);
            return Err(CareError::transport_status(
                format!("{}: {}", self.name, truncate(&body)),
                status.as_u16(),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            CareError::Decode(format!("invalid response from {}: {}", self.name, e))
        })
    }

    fn unreachable(&self, e: reqwest::Error) -> CareError {
        let reason = if e.is_timeout() { "timed out" } else { "unavailable" };
        log::warn!("[Connector] {} at {} {}: {}", self.name, self.base_url, reason, e);
        CareError::transport(format!("{} {}: {}", self.name, reason, e))
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Connectors keyed by agent name, rebuilt when a card's url changes.
#[derive(Default)]
pub struct ConnectorCache {
    connectors: DashMap<String, Arc<AgentConnector>>,
}

impl ConnectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create under the entry's shard lock, so concurrent callers for
    /// one name always share a connector.
    pub fn connector_for(&self, card: &AgentCard) -> Arc<AgentConnector> {
        let entry = self
            .connectors
            .entry(card.name.clone())
            .and_modify(|existing| {
                if existing.base_url() != card.url {
                    *existing = Arc::new(AgentConnector::from_card(card));
                }
            })
            .or_insert_with(|| Arc::new(AgentConnector::from_card(card)));
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    /// Serve `router` on an ephemeral port and return its base url.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    /// A base url nothing is listening on.
    pub async fn dead_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/", addr)
    }
}
