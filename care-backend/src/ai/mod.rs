pub mod offline;
pub mod openai;
pub mod tools;

pub use offline::OfflineReasoner;
pub use openai::OpenAiReasoner;
pub use tools::{DelegationTools, RecordTools, ToolDefinition, ToolSet};

use crate::error::CareResult;
use async_trait::async_trait;
use std::fmt;

/// Reply returned when the model produces no text.
pub const EMPTY_REPLY: &str = "No response generated.";

/// Turns one user utterance into one reply, remembering context per session.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn invoke(&self, query: &str, session_id: &str) -> CareResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Groq,
    Google,
    OpenAI,
}

impl LlmProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "groq" => Some(LlmProvider::Groq),
            "google" | "gemini" => Some(LlmProvider::Google),
            "openai" => Some(LlmProvider::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::Groq => "groq",
            LlmProvider::Google => "google",
            LlmProvider::OpenAI => "openai",
        }
    }

    /// All three expose an OpenAI-compatible chat completions endpoint.
    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::Groq => "https://api.groq.com/openai/v1/chat/completions",
            LlmProvider::Google => {
                "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
            }
            LlmProvider::OpenAI => "https://api.openai.com/v1/chat/completions",
        }
    }

    pub fn api_key_var(self) -> &'static str {
        match self {
            LlmProvider::Groq => "GROQ_API_KEY",
            LlmProvider::Google => "GOOGLE_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: String,
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}
