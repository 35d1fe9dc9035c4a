use crate::agents::AgentRole;
use crate::ai::{LlmProvider, LlmSettings};
use crate::discovery::NameMatch;
use crate::error::{CareError, CareResult};
use crate::routing::RoutingMode;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REGISTRY_PATH: &str = "./agent_registry.json";
const DEFAULT_FALLBACK_AGENT: &str = "SymptomCheckerAgent";
const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub role: AgentRole,
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub registry_path: PathBuf,
    pub name_match: NameMatch,
    pub routing_mode: RoutingMode,
    /// Keyword-routing default. `None` turns an unmatched utterance into an error.
    pub fallback_agent: Option<String>,
    pub reasoning_timeout: Duration,
    /// `None` runs the agent with its offline reasoner.
    pub llm: Option<LlmSettings>,
}

impl Config {
    pub fn from_env() -> CareResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> CareResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let role = match var("AGENT_ROLE") {
            Some(raw) => AgentRole::parse(&raw)
                .ok_or_else(|| CareError::Config(format!("AGENT_ROLE '{}' is not a known role", raw)))?,
            None => AgentRole::Orchestrator,
        };

        let host = var("AGENT_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match var("AGENT_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| CareError::Config(format!("AGENT_PORT '{}' must be a valid port", raw)))?,
            None => role.default_port(),
        };
        let public_url = var("AGENT_PUBLIC_URL")
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("http://{}:{}/", host, port));

        let registry_path = PathBuf::from(
            var("AGENT_REGISTRY_PATH").unwrap_or_else(|| DEFAULT_REGISTRY_PATH.to_string()),
        );

        let name_match = match var("AGENT_NAME_MATCH") {
            Some(raw) => NameMatch::parse(&raw).ok_or_else(|| {
                CareError::Config(format!("AGENT_NAME_MATCH '{}' must be 'substring' or 'exact'", raw))
            })?,
            None => NameMatch::Substring,
        };

        let routing_mode = match var("ROUTING_MODE") {
            Some(raw) => RoutingMode::parse(&raw).ok_or_else(|| {
                CareError::Config(format!("ROUTING_MODE '{}' must be 'keyword' or 'capability'", raw))
            })?,
            None => RoutingMode::Keyword,
        };

        let fallback_agent = match var("ROUTING_FALLBACK_AGENT") {
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(raw),
            None => Some(DEFAULT_FALLBACK_AGENT.to_string()),
        };

        let reasoning_timeout = match var("REASONING_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    CareError::Config(format!(
                        "REASONING_TIMEOUT_SECS '{}' must be a positive number",
                        raw
                    ))
                })?,
            None => Duration::from_secs(DEFAULT_REASONING_TIMEOUT_SECS),
        };

        let llm = Self::llm_from_lookup(role, &var)?;

        Ok(Self {
            role,
            host,
            port,
            public_url,
            registry_path,
            name_match,
            routing_mode,
            fallback_agent,
            reasoning_timeout,
            llm,
        })
    }

    fn llm_from_lookup<F>(role: AgentRole, var: &F) -> CareResult<Option<LlmSettings>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (default_provider, default_model) = role.default_llm();
        let provider = match var("LLM_PROVIDER") {
            Some(raw) => LlmProvider::parse(&raw).ok_or_else(|| {
                CareError::Config(format!("LLM_PROVIDER '{}' must be groq, google or openai", raw))
            })?,
            None => default_provider,
        };

        let api_key = var("LLM_API_KEY")
            .or_else(|| var(provider.api_key_var()))
            .filter(|key| !key.is_empty());
        let Some(api_key) = api_key else {
            return Ok(None);
        };

        Ok(Some(LlmSettings {
            provider,
            model: var("LLM_MODEL").unwrap_or_else(|| default_model.to_string()),
            endpoint: var("LLM_ENDPOINT").unwrap_or_else(|| provider.default_endpoint().to_string()),
            api_key,
        }))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
