//! Agent cards, served at `/.well-known/agent.json` and listed in registries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const WELL_KNOWN_CARD_PATH: &str = "/.well-known/agent.json";

fn default_version() -> String {
    "1.0.0".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, deserialize_with = "capabilities::deserialize")]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

impl AgentCard {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            url: url.into(),
            version: default_version(),
            capabilities: BTreeSet::new(),
            skills: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.insert(capability.into());
        self
    }

    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl AgentSkill {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            tags: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_examples(mut self, examples: &[&str]) -> Self {
        self.examples = examples.iter().map(|e| e.to_string()).collect();
        self
    }
}

/// Registries in the wild write capabilities as a list of names, a list of
/// `{name}` / `{type}` objects, or a map of boolean flags. All collapse to a
/// set of names.
mod capabilities {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use std::collections::{BTreeMap, BTreeSet};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Name(String),
        Object {
            name: Option<String>,
            #[serde(rename = "type")]
            kind: Option<String>,
        },
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<Entry>),
        Flags(BTreeMap<String, Value>),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
        let raw = Option::<Raw>::deserialize(d)?;
        Ok(match raw {
            None => BTreeSet::new(),
            Some(Raw::List(entries)) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    Entry::Name(name) => Some(name),
                    Entry::Object { name, kind } => name.or(kind),
                })
                .collect(),
            Some(Raw::Flags(flags)) => flags
                .into_iter()
                .filter(|(_, v)| v.as_bool() == Some(true))
                .map(|(k, _)| k)
                .collect(),
        })
    }
}
