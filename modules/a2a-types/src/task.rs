//! Task, message and lifecycle types.

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// =====================================================
// Lifecycle
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Canceled,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
            TaskState::Unknown => "unknown",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default = "Utc::now", with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
        }
    }
}

/// RFC 3339 on the wire. Peers that emit naive local timestamps are read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}

// =====================================================
// Messages
// =====================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
        }
    }
}

/// One piece of message content, discriminated by `type`.
///
/// Kinds this crate does not know are kept verbatim in `Other`, so history
/// from newer peers still decodes and is written back unchanged.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Part {
    Text { text: String },
    Data { data: Value },
    Other(Value),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownPartRef<'a> {
    Text { text: &'a str },
    Data { data: &'a Value },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownPart {
    Text { text: String },
    Data { data: Value },
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Part::Text { text } => KnownPartRef::Text { text }.serialize(serializer),
            Part::Data { data } => KnownPartRef::Data { data }.serialize(serializer),
            Part::Other(raw) => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        match raw.get("type").and_then(Value::as_str) {
            Some("text") | Some("data") => {
                match serde_json::from_value(raw).map_err(de::Error::custom)? {
                    KnownPart::Text { text } => Ok(Part::Text { text }),
                    KnownPart::Data { data } => Ok(Part::Data { data }),
                }
            }
            Some(_) => Ok(Part::Other(raw)),
            None => Err(de::Error::missing_field("type")),
        }
    }
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
            metadata: None,
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            parts: vec![Part::text(text)],
            metadata: None,
        }
    }

    /// Text of the first part, if that part is text.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.first().and_then(Part::as_text)
    }

    /// All text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// =====================================================
// Task
// =====================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub session_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Task {
    pub fn submitted(id: impl Into<String>, session_id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            status: TaskStatus::new(TaskState::Submitted),
            history: vec![message],
            metadata: None,
        }
    }

    pub fn state(&self) -> TaskState {
        self.status.state
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.history.last()
    }

    /// Keep only the newest `limit` history entries. `None` keeps everything.
    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            let skip = self.history.len().saturating_sub(limit);
            self.history.drain(..skip);
        }
        self
    }
}

// =====================================================
// Request Params
// =====================================================

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSendParams {
    pub id: String,
    #[serde(default = "new_session_id")]
    pub session_id: String,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskSendParams {
    pub fn new(id: impl Into<String>, session_id: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            message,
            history_length: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TaskQueryParams {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history_length: None,
            metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_wire_round_trip() {
        let mut task = Task::submitted("t1", "s1", Message::user("I have a fever"));
        task.history.push(Message::agent("Rest and drink fluids."));
        task.status = TaskStatus::new(TaskState::Completed);

        let wire = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&wire).unwrap();

        assert_eq!(decoded, task);
        assert_eq!(decoded.state(), TaskState::Completed);
        assert_eq!(decoded.history.len(), 2);
    }

    #[test]
    fn test_task_uses_camel_case_and_kebab_states() {
        let mut task = Task::submitted("t1", "s1", Message::user("hi"));
        task.status = TaskStatus::new(TaskState::InputRequired);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["status"]["state"], "input-required");
        assert_eq!(value["history"][0]["role"], "user");
        assert_eq!(value["history"][0]["parts"][0], json!({"type": "text", "text": "hi"}));
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_unrecognised_state_decodes_as_unknown() {
        let task: Task = serde_json::from_value(json!({
            "id": "t1",
            "status": {"state": "paused", "timestamp": "2025-05-01T10:00:00Z"},
            "history": []
        }))
        .unwrap();
        assert_eq!(task.state(), TaskState::Unknown);
        assert_eq!(task.session_id, "");
    }

    #[test]
    fn test_naive_timestamp_is_read_as_utc() {
        let status: TaskStatus = serde_json::from_value(json!({
            "state": "completed",
            "timestamp": "2025-05-01T10:00:00.123456"
        }))
        .unwrap();
        assert_eq!(status.timestamp.to_rfc3339(), "2025-05-01T10:00:00.123456+00:00");
    }

    #[test]
    fn test_history_limit_keeps_newest_entries() {
        let mut task = Task::submitted("t1", "s1", Message::user("one"));
        task.history.push(Message::agent("two"));
        task.history.push(Message::user("three"));

        let last_two = task.clone().with_history_limit(Some(2));
        assert_eq!(last_two.history.len(), 2);
        assert_eq!(last_two.history[0].first_text(), Some("two"));

        assert_eq!(task.clone().with_history_limit(Some(10)).history.len(), 3);
        assert!(task.clone().with_history_limit(Some(0)).history.is_empty());
        assert_eq!(task.with_history_limit(None).history.len(), 3);
    }

    #[test]
    fn test_send_params_generate_session_id() {
        let params: TaskSendParams = serde_json::from_value(json!({
            "id": "t1",
            "message": {"role": "user", "parts": [{"type": "text", "text": "hello"}]}
        }))
        .unwrap();
        assert_eq!(params.session_id.len(), 32);
        assert!(params.history_length.is_none());
    }

    #[test]
    fn test_data_part_is_preserved() {
        let message: Message = serde_json::from_value(json!({
            "role": "agent",
            "parts": [{"type": "data", "data": {"slot": "09:00"}}, {"type": "text", "text": "Booked"}]
        }))
        .unwrap();
        assert_eq!(message.first_text(), None);
        assert_eq!(message.text(), "Booked");
    }

    #[test]
    fn test_unknown_part_kind_is_kept_verbatim() {
        let raw = json!({"type": "file", "file": {"name": "xray.png", "uri": "s3://scans/xray.png"}});
        let message: Message = serde_json::from_value(json!({
            "role": "user",
            "parts": [raw.clone(), {"type": "text", "text": "see attached"}]
        }))
        .unwrap();

        assert_eq!(message.parts[0], Part::Other(raw.clone()));
        assert_eq!(message.text(), "see attached");
        assert_eq!(serde_json::to_value(&message).unwrap()["parts"][0], raw);
    }

    #[test]
    fn test_part_without_type_is_rejected() {
        assert!(serde_json::from_value::<Part>(json!({"text": "hi"})).is_err());
        assert!(serde_json::from_value::<Part>(json!({"type": "text"})).is_err());
    }
}
