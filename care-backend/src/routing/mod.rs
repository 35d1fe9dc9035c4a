//! Orchestrator routing: pick a specialist for an utterance and relay its reply.

mod keyword;

pub use keyword::KeywordRules;

use crate::ai::{DelegationTools, Reasoner};
use crate::error::{CareError, CareResult};
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    Keyword,
    Capability,
}

impl RoutingMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "keyword" => Some(RoutingMode::Keyword),
            "capability" => Some(RoutingMode::Capability),
            _ => None,
        }
    }
}

pub enum RoutingPolicy {
    /// Deterministic rule table, then one delegated call.
    Keyword(KeywordRules),
    /// A reasoner holding the delegation tools decides which agents to call.
    Capability(Arc<dyn Reasoner>),
}

pub struct Router {
    policy: RoutingPolicy,
    delegation: Arc<DelegationTools>,
}

impl Router {
    pub fn new(policy: RoutingPolicy, delegation: Arc<DelegationTools>) -> Self {
        Self { policy, delegation }
    }

    pub fn keyword(rules: KeywordRules, delegation: Arc<DelegationTools>) -> Self {
        Self::new(RoutingPolicy::Keyword(rules), delegation)
    }

    pub async fn route(&self, utterance: &str, session_id: &str) -> CareResult<String> {
        match &self.policy {
            RoutingPolicy::Keyword(rules) => {
                let target = rules.select(utterance).ok_or_else(|| {
                    CareError::NotFound(format!("no agent matches '{}'", utterance))
                })?;
                log::info!("[Router] Routing to {} (session {})", target, session_id);
                self.delegation
                    .call_agent(target, utterance, session_id)
                    .await
                    .inspect_err(|e| log::warn!("[Router] Delegation to {} failed: {}", target, e))
            }
            RoutingPolicy::Capability(reasoner) => {
                log::info!(
                    "[Router] Capability routing over {} agent(s) (session {})",
                    self.delegation.registry().len(),
                    session_id
                );
                reasoner.invoke(utterance, session_id).await
            }
        }
    }
}

#[async_trait]
impl Reasoner for Router {
    async fn invoke(&self, query: &str, session_id: &str) -> CareResult<String> {
        self.route(query, session_id).await
    }
}
