//! Function tools the model may call, and their Rust implementations.

use crate::connector::ConnectorCache;
use crate::discovery::AgentRegistry;
use crate::error::{CareError, CareResult};
use a2a_types::{AgentCard, Message, Task};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reply text when a peer's task comes back without a readable answer.
pub const NO_RESPONSE: &str = "No response";

#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// A named group of tools exposed to the model.
#[async_trait]
pub trait ToolSet: Send + Sync {
    fn definitions(&self) -> Vec<ToolDefinition>;

    async fn execute(&self, name: &str, args: &Value, session_id: &str) -> CareResult<String>;
}

fn string_arg<'a>(args: &'a Value, key: &str) -> CareResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CareError::Reasoning(format!("missing string argument '{}'", key)))
}

/// Text of the first part of the newest history entry.
pub fn reply_text(task: &Task) -> String {
    task.last_message()
        .and_then(Message::first_text)
        .map(str::to_string)
        .unwrap_or_else(|| NO_RESPONSE.to_string())
}

// =====================================================
// Delegation
// =====================================================

/// `list_agents` and `call_agent` over the shared registry.
pub struct DelegationTools {
    registry: Arc<AgentRegistry>,
    connectors: Arc<ConnectorCache>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentSummary<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    url: &'a str,
    capabilities: Vec<&'a str>,
    skills: Vec<&'a str>,
}

impl<'a> From<&'a AgentCard> for AgentSummary<'a> {
    fn from(card: &'a AgentCard) -> Self {
        Self {
            name: &card.name,
            description: card.description.as_deref(),
            url: &card.url,
            capabilities: card.capabilities.iter().map(String::as_str).collect(),
            skills: card.skills.iter().map(|s| s.name.as_str()).collect(),
        }
    }
}

impl DelegationTools {
    pub fn new(registry: Arc<AgentRegistry>, connectors: Arc<ConnectorCache>) -> Self {
        Self {
            registry,
            connectors,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn list_agents(&self) -> Vec<AgentCard> {
        self.registry.list_all()
    }

    /// Forward `message` to the agent whose name matches `agent_name` and
    /// return the text of its reply.
    pub async fn call_agent(
        &self,
        agent_name: &str,
        message: &str,
        session_id: &str,
    ) -> CareResult<String> {
        let card = self
            .registry
            .find_by_name(agent_name)
            .ok_or_else(|| CareError::NotFound(format!("Agent '{}' not found.", agent_name)))?;
        let connector = self.connectors.connector_for(&card);
        let task = connector.send_task(message, session_id, None).await?;
        Ok(reply_text(&task))
    }
}

#[async_trait]
impl ToolSet for DelegationTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "list_agents",
                "List the healthcare agents that can take a request, with their skills.",
                json!({"type": "object", "properties": {}}),
            ),
            ToolDefinition::new(
                "call_agent",
                "Send a message to another agent by name and return its reply.",
                json!({
                    "type": "object",
                    "properties": {
                        "agent_name": {"type": "string", "description": "Name (or part of the name) of the agent"},
                        "message": {"type": "string", "description": "Text to forward to the agent"}
                    },
                    "required": ["agent_name", "message"]
                }),
            ),
        ]
    }

    async fn execute(&self, name: &str, args: &Value, session_id: &str) -> CareResult<String> {
        match name {
            "list_agents" => {
                let cards = self.list_agents();
                let summaries: Vec<AgentSummary> = cards.iter().map(AgentSummary::from).collect();
                serde_json::to_string(&summaries)
                    .map_err(|e| CareError::Reasoning(format!("cannot encode agent list: {}", e)))
            }
            "call_agent" => {
                let agent_name = string_arg(args, "agent_name")?;
                let message = string_arg(args, "message")?;
                self.call_agent(agent_name, message, session_id).await
            }
            other => Err(CareError::Reasoning(format!("unknown tool '{}'", other))),
        }
    }
}

// =====================================================
// Health Records
// =====================================================

pub const NO_RECORD: &str = "No record found for this ID.";

/// Mock electronic medical record book.
pub struct RecordTools {
    records: BTreeMap<String, String>,
    /// Written by `update_patient_note`; the record summaries never change.
    notes: RwLock<BTreeMap<String, Vec<String>>>,
}

impl Default for RecordTools {
    fn default() -> Self {
        let records = [
            ("101", "Patient 101: Diabetes Type 2, on Metformin."),
            ("102", "Patient 102: Hypertension, last visit: May 2025."),
            ("103", "Patient 103: No known conditions, annual checkup due."),
        ]
        .into_iter()
        .map(|(id, summary)| (id.to_string(), summary.to_string()))
        .collect();

        Self {
            records,
            notes: RwLock::new(BTreeMap::new()),
        }
    }
}

impl RecordTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetch_patient_record(&self, patient_id: &str) -> String {
        self.records
            .get(patient_id.trim())
            .cloned()
            .unwrap_or_else(|| NO_RECORD.to_string())
    }

    pub fn update_patient_note(&self, patient_id: &str, note: &str) -> String {
        let patient_id = patient_id.trim();
        self.notes
            .write()
            .entry(patient_id.to_string())
            .or_default()
            .push(note.to_string());
        log::info!("[Records] Note added to patient {}", patient_id);
        format!("Note added to patient {}: '{}'", patient_id, note)
    }

    pub fn notes_for(&self, patient_id: &str) -> Vec<String> {
        self.notes
            .read()
            .get(patient_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Patient ids arrive as strings or bare numbers depending on the model.
fn patient_id_arg(args: &Value) -> CareResult<String> {
    match args.get("patient_id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(CareError::Reasoning(
            "missing argument 'patient_id'".to_string(),
        )),
    }
}

#[async_trait]
impl ToolSet for RecordTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "fetch_patient_record",
                "Fetch the health record summary for a patient ID.",
                json!({
                    "type": "object",
                    "properties": {"patient_id": {"type": "string"}},
                    "required": ["patient_id"]
                }),
            ),
            ToolDefinition::new(
                "update_patient_note",
                "Add a clinical note to a patient's record.",
                json!({
                    "type": "object",
                    "properties": {
                        "patient_id": {"type": "string"},
                        "note": {"type": "string"}
                    },
                    "required": ["patient_id", "note"]
                }),
            ),
        ]
    }

    async fn execute(&self, name: &str, args: &Value, _session_id: &str) -> CareResult<String> {
        match name {
            "fetch_patient_record" => Ok(self.fetch_patient_record(&patient_id_arg(args)?)),
            "update_patient_note" => {
                let patient_id = patient_id_arg(args)?;
                let note = string_arg(args, "note")?;
                Ok(self.update_patient_note(&patient_id, note))
            }
            other => Err(CareError::Reasoning(format!("unknown tool '{}'", other))),
        }
    }
}
