//! OpenAI-compatible chat completions client with a function-tool loop.
//!
//! Groq, Gemini and OpenAI all accept this wire format, so one client serves
//! every provider; only the endpoint, model and key differ.

use super::tools::{ToolDefinition, ToolSet};
use super::{LlmSettings, Reasoner, EMPTY_REPLY};
use crate::error::{CareError, CareResult};
use crate::http::shared_client;
use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_TOOL_ROUNDS: usize = 5;
/// Per-session memory cap, in chat messages (system prompt excluded).
const MAX_SESSION_MESSAGES: usize = 40;
/// Sessions kept in memory; the least recently used one goes first.
const MAX_SESSIONS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    fn tool_result(call_id: &str, content: String) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::new("tool", content)
        }
    }
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    /// JSON-encoded arguments object.
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct ToolSpec<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolDefinition,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSpec<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// One conversation. The history lock is held for a whole turn, so turns in
/// the same session run one after another.
struct Session {
    history: Mutex<Vec<ChatMessage>>,
    last_used: parking_lot::Mutex<Instant>,
}

impl Session {
    fn new() -> Self {
        Self {
            history: Mutex::new(Vec::new()),
            last_used: parking_lot::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }
}

pub struct OpenAiReasoner {
    client: Client,
    settings: LlmSettings,
    instruction: String,
    tools: Option<Arc<dyn ToolSet>>,
    sessions: DashMap<String, Arc<Session>>,
    max_sessions: usize,
    retry_base_delay: Duration,
}

impl OpenAiReasoner {
    pub fn new(settings: LlmSettings, instruction: impl Into<String>) -> Self {
        Self {
            client: shared_client().clone(),
            settings,
            instruction: instruction.into(),
            tools: None,
            sessions: DashMap::new(),
            max_sessions: MAX_SESSIONS,
            retry_base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolSet>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_retry_delay(mut self, base_delay: Duration) -> Self {
        self.retry_base_delay = base_delay;
        self
    }

    pub fn with_session_limit(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> CareResult<ChatMessage> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages,
            tools: tools
                .iter()
                .map(|function| ToolSpec {
                    kind: "function",
                    function,
                })
                .collect(),
        };

        let mut last_error: Option<String> = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay = self.retry_base_delay * (1 << (attempt - 1));
                log::warn!(
                    "[LLM] Retry attempt {}/{} after {}ms delay",
                    attempt,
                    MAX_RETRIES,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&self.settings.endpoint)
                .bearer_auth(&self.settings.api_key)
                .timeout(REQUEST_TIMEOUT)
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("[LLM] Request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(format!("{} request failed: {}", self.settings.provider, e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                if matches!(status.as_u16(), 429 | 502 | 503 | 504) {
                    log::warn!(
                        "[LLM] Received retryable status {} (attempt {}), will retry",
                        status,
                        attempt + 1
                    );
                    last_error = Some(format!("HTTP {}: {}", status, body));
                    continue;
                }
                return Err(CareError::Reasoning(format!(
                    "{} returned error status {}: {}",
                    self.settings.provider, status, body
                )));
            }

            let parsed: ChatResponse = response.json().await.map_err(|e| {
                CareError::Reasoning(format!("failed to parse {} response: {}", self.settings.provider, e))
            })?;
            return parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message)
                .ok_or_else(|| CareError::Reasoning("model returned no choices".to_string()));
        }

        Err(CareError::Reasoning(
            last_error.unwrap_or_else(|| "Max retries exceeded".to_string()),
        ))
    }

    async fn run_tool(&self, tools: &dyn ToolSet, call: &ToolCall, session_id: &str) -> String {
        let args: Value = if call.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str(&call.function.arguments) {
                Ok(args) => args,
                Err(e) => return format!("Error: arguments are not valid JSON: {}", e),
            }
        };
        log::info!("[LLM] Tool call {} {}", call.function.name, args);
        match tools.execute(&call.function.name, &args, session_id).await {
            Ok(output) => output,
            Err(e) => {
                log::warn!("[LLM] Tool {} failed: {}", call.function.name, e);
                format!("Error: {}", e)
            }
        }
    }

    fn session(&self, session_id: &str) -> Arc<Session> {
        let existing = self
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()));
        let session = match existing {
            Some(session) => session,
            None => {
                if self.sessions.len() >= self.max_sessions {
                    self.evict_idlest();
                }
                Arc::clone(
                    self.sessions
                        .entry(session_id.to_string())
                        .or_insert_with(|| Arc::new(Session::new()))
                        .value(),
                )
            }
        };
        session.touch();
        session
    }

    fn evict_idlest(&self) {
        let idlest = self
            .sessions
            .iter()
            .min_by_key(|entry| *entry.value().last_used.lock())
            .map(|entry| entry.key().clone());
        if let Some(session_id) = idlest {
            log::debug!("[LLM] Evicting idle session {}", session_id);
            self.sessions.remove(&session_id);
        }
    }

    /// Run one turn on top of `prior` and return the reply with the
    /// conversation as it should be remembered.
    async fn converse(
        &self,
        prior: &[ChatMessage],
        query: &str,
        session_id: &str,
    ) -> CareResult<(String, Vec<ChatMessage>)> {
        let mut history = prior.to_vec();
        history.push(ChatMessage::new("user", query));

        let definitions = self
            .tools
            .as_ref()
            .map(|tools| tools.definitions())
            .unwrap_or_default();

        for round in 0..=MAX_TOOL_ROUNDS {
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(ChatMessage::new("system", self.instruction.as_str()));
            messages.extend(history.iter().cloned());

            // The last round offers no tools so the model has to answer.
            let offered: &[ToolDefinition] = if round < MAX_TOOL_ROUNDS { &definitions } else { &[] };
            let reply = self.complete(&messages, offered).await?;
            let calls = reply.tool_calls.clone().unwrap_or_default();
            history.push(reply);

            let (Some(tools), false) = (self.tools.as_deref(), calls.is_empty()) else {
                let text = history
                    .last()
                    .and_then(|m| m.content.clone())
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| EMPTY_REPLY.to_string());
                return Ok((text, history));
            };

            for call in &calls {
                let output = self.run_tool(tools, call, session_id).await;
                history.push(ChatMessage::tool_result(&call.id, output));
            }
        }

        Err(CareError::Reasoning(format!(
            "model kept calling tools after {} rounds",
            MAX_TOOL_ROUNDS
        )))
    }
}

/// Drop the oldest messages past the cap, restarting at a user turn so no
/// tool result is left without the call that produced it.
fn trim_history(history: &mut Vec<ChatMessage>) {
    if history.len() <= MAX_SESSION_MESSAGES {
        return;
    }
    let mut start = history.len() - MAX_SESSION_MESSAGES;
    while start < history.len() && history[start].role != "user" {
        start += 1;
    }
    history.drain(..start);
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn invoke(&self, query: &str, session_id: &str) -> CareResult<String> {
        let session = self.session(session_id);
        let mut history = session.history.lock().await;

        match self.converse(&history, query, session_id).await {
            Ok((text, mut turn)) => {
                trim_history(&mut turn);
                *history = turn;
                Ok(text)
            }
            Err(e) => {
                if history.is_empty() {
                    self.sessions
                        .remove_if(session_id, |_, current| Arc::ptr_eq(current, &session));
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::tools::RecordTools;
    use crate::ai::LlmProvider;
    use crate::connector::test_support::spawn;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(endpoint: String) -> LlmSettings {
        LlmSettings {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o".to_string(),
            endpoint,
            api_key: "sk-test".to_string(),
        }
    }

    fn content(text: &str) -> Value {
        json!({"choices": [{"message": {"role": "assistant", "content": text}}]})
    }

    /// Calls `fetch_patient_record` first, then echoes the tool output.
    async fn records_model(Json(body): Json<Value>) -> Json<Value> {
        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        let last = messages.last().cloned().unwrap_or_default();
        if last["role"] == "tool" {
            return Json(content(&format!("Record: {}", last["content"].as_str().unwrap_or(""))));
        }
        Json(json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "fetch_patient_record", "arguments": "{\"patient_id\": \"101\"}"}
            }]
        }}]}))
    }

    #[tokio::test]
    async fn test_tool_loop_feeds_results_back() {
        let url = spawn(Router::new().route("/", post(records_model))).await;
        let reasoner = OpenAiReasoner::new(settings(url), "You manage health records.")
            .with_tools(Arc::new(RecordTools::new()));

        let reply = reasoner.invoke("Get record for patient 101", "s1").await.unwrap();
        assert_eq!(reply, "Record: Patient 101: Diabetes Type 2, on Metformin.");
        assert_eq!(reasoner.session_count(), 1);
    }

    #[tokio::test]
    async fn test_session_memory_is_replayed() {
        let router = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                let count = body["messages"].as_array().map(Vec::len).unwrap_or(0);
                Json(content(&format!("saw {} messages", count)))
            }),
        );
        let reasoner = OpenAiReasoner::new(settings(spawn(router).await), "Be brief.");

        assert_eq!(reasoner.invoke("hi", "s1").await.unwrap(), "saw 2 messages");
        assert_eq!(reasoner.invoke("again", "s1").await.unwrap(), "saw 4 messages");
        assert_eq!(reasoner.invoke("hi", "s2").await.unwrap(), "saw 2 messages");
    }

    fn counting_model(delay: Duration) -> Router {
        Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| async move {
                tokio::time::sleep(delay).await;
                let count = body["messages"].as_array().map(Vec::len).unwrap_or(0);
                Json(content(&format!("saw {} messages", count)))
            }),
        )
    }

    #[tokio::test]
    async fn test_overlapping_turns_in_one_session_are_all_kept() {
        let url = spawn(counting_model(Duration::from_millis(100))).await;
        let reasoner = OpenAiReasoner::new(settings(url), "Be brief.");

        let (first, second) = tokio::join!(
            reasoner.invoke("first", "s1"),
            reasoner.invoke("second", "s1")
        );
        let mut replies = vec![first.unwrap(), second.unwrap()];
        replies.sort();
        assert_eq!(replies, vec!["saw 2 messages", "saw 4 messages"]);

        assert_eq!(reasoner.invoke("third", "s1").await.unwrap(), "saw 6 messages");
    }

    #[tokio::test]
    async fn test_session_limit_evicts_least_recently_used() {
        let url = spawn(counting_model(Duration::ZERO)).await;
        let reasoner = OpenAiReasoner::new(settings(url), "Be brief.").with_session_limit(2);

        reasoner.invoke("hi", "s1").await.unwrap();
        reasoner.invoke("hi", "s2").await.unwrap();
        reasoner.invoke("again", "s1").await.unwrap();
        reasoner.invoke("hi", "s3").await.unwrap();
        assert_eq!(reasoner.session_count(), 2);

        assert_eq!(reasoner.invoke("more", "s1").await.unwrap(), "saw 6 messages");
        assert_eq!(reasoner.invoke("back", "s2").await.unwrap(), "saw 2 messages");
        assert_eq!(reasoner.session_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_transient_status() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/",
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"error": "busy"})))
                    } else {
                        (StatusCode::OK, Json(content("")))
                    }
                }),
            )
            .with_state(Arc::clone(&hits));
        let reasoner = OpenAiReasoner::new(settings(spawn(router).await), "Be brief.")
            .with_retry_delay(Duration::from_millis(10));

        assert_eq!(reasoner.invoke("hi", "s1").await.unwrap(), EMPTY_REPLY);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let router = Router::new().route(
            "/",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let reasoner = OpenAiReasoner::new(settings(spawn(router).await), "Be brief.");
        let err = reasoner.invoke("hi", "s1").await.unwrap_err();
        assert!(matches!(err, CareError::Reasoning(msg) if msg.contains("401")));
        assert_eq!(reasoner.session_count(), 0);
    }

    #[test]
    fn test_trim_history_starts_at_user_turn() {
        let mut history = vec![ChatMessage::new("user", "q0")];
        for i in 0..MAX_SESSION_MESSAGES {
            let role = if i % 2 == 0 { "assistant" } else { "user" };
            history.push(ChatMessage::new(role, format!("m{}", i)));
        }
        history.insert(2, ChatMessage::tool_result("call_1", "out".to_string()));

        trim_history(&mut history);
        assert!(history.len() <= MAX_SESSION_MESSAGES);
        assert_eq!(history[0].role, "user");
    }
}
