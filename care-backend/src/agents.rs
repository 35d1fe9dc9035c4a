//! The four agent roles: identity, card, and reasoner wiring.

use crate::ai::{
    DelegationTools, LlmProvider, OfflineReasoner, OpenAiReasoner, Reasoner, RecordTools, ToolSet,
};
use crate::config::Config;
use crate::connector::ConnectorCache;
use crate::discovery::AgentRegistry;
use crate::error::{CareError, CareResult};
use crate::routing::{KeywordRules, Router, RoutingMode, RoutingPolicy};
use a2a_types::{AgentCard, AgentSkill};
use std::sync::Arc;

const SYMPTOM_INSTRUCTION: &str = "You are a Symptom Checker Assistant. Your job is to:\n\
- Analyze a user's symptoms\n\
- Suggest a probable condition OR\n\
- Route the user to an appropriate specialist by calling list_agents() and then call_agent(agent_name, message).\n\n\
Example:\n\
If a user says 'I have skin rashes', call list_agents(), find 'Dermatologist', and delegate with call_agent().";

const APPOINTMENT_INSTRUCTION: &str = "You handle appointment requests for healthcare. \
Work out the specialist and the preferred time from the request and confirm the booking. \
Use list_agents() and call_agent() to route users to proper specialists.";

const RECORDS_INSTRUCTION: &str = "You are a Health Records Manager, a trusted digital assistant for doctors and staff. \
Manage secure patient records using the EMR tools: fetch_patient_record to read a summary and \
update_patient_note to add a note. Answer with an accurate, concise patient summary or a confirmation.";

const ORCHESTRATOR_INSTRUCTION: &str = "You route healthcare requests. Call list_agents() to see the \
available specialists, pick the one whose skills fit the request, forward the user's message with \
call_agent(agent_name, message), and return its answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Orchestrator,
    SymptomChecker,
    Appointment,
    HealthRecords,
}

impl AgentRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().replace('-', "_").as_str() {
            "orchestrator" | "host" => Some(AgentRole::Orchestrator),
            "symptom_checker" | "symptom" => Some(AgentRole::SymptomChecker),
            "appointment" => Some(AgentRole::Appointment),
            "health_records" | "healthrecords" | "records" => Some(AgentRole::HealthRecords),
            _ => None,
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            AgentRole::Orchestrator => "OrchestratorAgent",
            AgentRole::SymptomChecker => "SymptomCheckerAgent",
            AgentRole::Appointment => "AppointmentAgent",
            AgentRole::HealthRecords => "HealthRecordsAgent",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            AgentRole::Orchestrator => 10000,
            AgentRole::Appointment => 10010,
            AgentRole::SymptomChecker => 10020,
            AgentRole::HealthRecords => 10030,
        }
    }

    /// Provider and model each role runs on when a key is present.
    pub fn default_llm(self) -> (LlmProvider, &'static str) {
        match self {
            AgentRole::SymptomChecker => (LlmProvider::Groq, "llama3-70b-8192"),
            AgentRole::Appointment => (LlmProvider::Google, "gemini-1.5-flash-latest"),
            AgentRole::HealthRecords | AgentRole::Orchestrator => (LlmProvider::OpenAI, "gpt-4o"),
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            AgentRole::Orchestrator => ORCHESTRATOR_INSTRUCTION,
            AgentRole::SymptomChecker => SYMPTOM_INSTRUCTION,
            AgentRole::Appointment => APPOINTMENT_INSTRUCTION,
            AgentRole::HealthRecords => RECORDS_INSTRUCTION,
        }
    }

    pub fn card(self, url: &str) -> AgentCard {
        let card = AgentCard::new(self.agent_name(), url);
        match self {
            AgentRole::Orchestrator => card
                .with_description("Routes tasks to the appropriate healthcare agents")
                .with_capability("routing")
                .with_skill(AgentSkill::new("delegate_to_symptom_agent", "delegate_to_symptom_agent"))
                .with_skill(AgentSkill::new("connect_health_records", "connect_health_records"))
                .with_skill(AgentSkill::new("book_appointments", "book_appointments")),
            AgentRole::SymptomChecker => card
                .with_description("Agent that checks symptoms and suggests potential health issues.")
                .with_capability("symptom-checking")
                .with_skill(
                    AgentSkill::new("check_symptoms", "Symptom Checker")
                        .with_description("Analyzes symptoms and suggests potential conditions")
                        .with_tags(&["healthcare", "diagnosis", "symptoms"])
                        .with_examples(&["I have a fever and sore throat", "Why does my back hurt?"]),
                ),
            AgentRole::Appointment => card
                .with_description(
                    "Agent that schedules healthcare appointments based on symptoms and patient preferences.",
                )
                .with_capability("scheduling")
                .with_skill(
                    AgentSkill::new("book_appointment", "Doctor Appointment Scheduler")
                        .with_description(
                            "Schedules medical appointments based on patient symptoms and preferences",
                        )
                        .with_tags(&["healthcare", "appointment", "doctor", "scheduler"])
                        .with_examples(&[
                            "Book a dentist appointment for tomorrow morning",
                            "Schedule a cardiologist for chest pain symptoms",
                            "I need to see an eye specialist next week",
                        ]),
                ),
            AgentRole::HealthRecords => card
                .with_description("Agent that manages patient health records.")
                .with_capability("health-records")
                .with_skill(
                    AgentSkill::new("manage_health_records", "Health Records Manager")
                        .with_description("Retrieves and updates patient health records securely.")
                        .with_tags(&["healthcare", "EMR", "records"])
                        .with_examples(&[
                            "Get record for patient 101",
                            "Add note to 102: Patient is recovering",
                        ]),
                ),
        }
    }

    /// Wire the role's reasoner. Roles that delegate share `registry` through
    /// one connector cache.
    pub fn build_reasoner(
        self,
        config: &Config,
        registry: Arc<AgentRegistry>,
    ) -> CareResult<Arc<dyn Reasoner>> {
        let delegation = Arc::new(DelegationTools::new(registry, Arc::new(ConnectorCache::new())));

        let reasoner: Arc<dyn Reasoner> = match self {
            AgentRole::Orchestrator => {
                let policy = match config.routing_mode {
                    RoutingMode::Keyword => {
                        RoutingPolicy::Keyword(KeywordRules::healthcare(config.fallback_agent.clone()))
                    }
                    RoutingMode::Capability => {
                        let reasoner = self.llm_reasoner(config, delegation.clone()).ok_or_else(|| {
                            CareError::Config(
                                "ROUTING_MODE=capability needs an LLM API key".to_string(),
                            )
                        })?;
                        RoutingPolicy::Capability(reasoner)
                    }
                };
                Arc::new(Router::new(policy, delegation)) as Arc<dyn Reasoner>
            }
            AgentRole::SymptomChecker => self
                .llm_reasoner(config, delegation)
                .unwrap_or_else(|| Arc::new(OfflineReasoner::SymptomChecker) as Arc<dyn Reasoner>),
            AgentRole::Appointment => self
                .llm_reasoner(config, delegation)
                .unwrap_or_else(|| Arc::new(OfflineReasoner::Appointment) as Arc<dyn Reasoner>),
            AgentRole::HealthRecords => {
                let records = Arc::new(RecordTools::new());
                self.llm_reasoner(config, records.clone()).unwrap_or_else(|| {
                    Arc::new(OfflineReasoner::HealthRecords(records)) as Arc<dyn Reasoner>
                })
            }
        };

        if config.llm.is_none() && self != AgentRole::Orchestrator {
            log::info!("[LLM] No API key configured, {} runs offline", self.agent_name());
        }
        Ok(reasoner)
    }

    fn llm_reasoner(self, config: &Config, tools: Arc<dyn ToolSet>) -> Option<Arc<dyn Reasoner>> {
        let settings = config.llm.clone()?;
        log::info!(
            "[LLM] {} using {} model {}",
            self.agent_name(),
            settings.provider,
            settings.model
        );
        Some(Arc::new(OpenAiReasoner::new(settings, self.instruction()).with_tools(tools)))
    }
}
