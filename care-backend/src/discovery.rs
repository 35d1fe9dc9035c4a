//! Agent discovery backed by a JSON registry file.
//!
//! The file holds either `{"agents": [card, ...]}` or a bare array of cards.
//! A missing file yields an empty registry; a malformed one is a config error.

use crate::error::{CareError, CareResult};
use a2a_types::AgentCard;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// How `find_by_name` compares the query against card names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Case-insensitive substring: "symptom" finds "SymptomCheckerAgent".
    Substring,
    /// Case-insensitive equality.
    Exact,
}

impl NameMatch {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "substring" => Some(NameMatch::Substring),
            "exact" => Some(NameMatch::Exact),
            _ => None,
        }
    }

    fn matches(self, query: &str, name: &str) -> bool {
        let name = name.to_lowercase();
        match self {
            NameMatch::Substring => name.contains(query),
            NameMatch::Exact => name == query,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryFile {
    Wrapped { agents: Vec<AgentCard> },
    Bare(Vec<AgentCard>),
}

pub struct AgentRegistry {
    agents: RwLock<Vec<AgentCard>>,
    source: Option<PathBuf>,
    name_match: NameMatch,
}

impl AgentRegistry {
    /// Load cards from `path`. Absent file means no known agents.
    pub fn load(path: impl AsRef<Path>, name_match: NameMatch) -> CareResult<Self> {
        let path = path.as_ref();
        let agents = read_cards(path)?;
        log::info!(
            "[Discovery] Loaded {} agent(s) from {}",
            agents.len(),
            path.display()
        );
        Ok(Self {
            agents: RwLock::new(agents),
            source: Some(path.to_path_buf()),
            name_match,
        })
    }

    /// In-memory registry with no backing file.
    pub fn from_cards(cards: Vec<AgentCard>, name_match: NameMatch) -> CareResult<Self> {
        check_unique(&cards)?;
        Ok(Self {
            agents: RwLock::new(cards),
            source: None,
            name_match,
        })
    }

    /// First card, in source order, whose name matches `name`.
    pub fn find_by_name(&self, name: &str) -> Option<AgentCard> {
        let query = name.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.agents
            .read()
            .iter()
            .find(|card| self.name_match.matches(&query, &card.name))
            .cloned()
    }

    /// Snapshot of every known card, in source order.
    pub fn list_all(&self) -> Vec<AgentCard> {
        self.agents.read().clone()
    }

    pub fn len(&self) -> usize {
        self.agents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.read().is_empty()
    }

    /// Re-read the backing file. On failure the previous snapshot stays in place.
    pub fn reload(&self) -> CareResult<usize> {
        let Some(path) = &self.source else {
            return Ok(self.len());
        };
        let agents = read_cards(path).inspect_err(|e| {
            log::warn!("[Discovery] Reload of {} failed: {}", path.display(), e);
        })?;
        let count = agents.len();
        *self.agents.write() = agents;
        log::info!("[Discovery] Reloaded {} agent(s)", count);
        Ok(count)
    }
}

fn read_cards(path: &Path) -> CareResult<Vec<AgentCard>> {
    if !path.exists() {
        log::warn!(
            "[Discovery] Registry {} not found, starting with no agents",
            path.display()
        );
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CareError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let file: RegistryFile = serde_json::from_str(&raw)
        .map_err(|e| CareError::Config(format!("malformed registry {}: {}", path.display(), e)))?;
    let cards = match file {
        RegistryFile::Wrapped { agents } => agents,
        RegistryFile::Bare(agents) => agents,
    };
    check_unique(&cards)?;
    Ok(cards)
}

fn check_unique(cards: &[AgentCard]) -> CareResult<()> {
    let mut seen = HashSet::new();
    for card in cards {
        if !seen.insert(card.name.to_lowercase()) {
            return Err(CareError::Config(format!(
                "duplicate agent name '{}' in registry",
                card.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn registry_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const THREE_AGENTS: &str = r#"{
        "agents": [
            {"name": "SymptomCheckerAgent", "url": "http://localhost:10020/", "capabilities": ["triage"]},
            {"name": "AppointmentAgent", "url": "http://localhost:10010/"},
            {"name": "HealthRecordsAgent", "url": "http://localhost:10030/"}
        ]
    }"#;

    #[test]
    fn test_find_by_name_substring() {
        let file = registry_file(THREE_AGENTS);
        let registry = AgentRegistry::load(file.path(), NameMatch::Substring).unwrap();

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.find_by_name("symptom").unwrap().url,
            "http://localhost:10020/"
        );
        assert_eq!(
            registry.find_by_name("HEALTHRECORDSAGENT").unwrap().name,
            "HealthRecordsAgent"
        );
        // "agent" is in every name: first in file order wins.
        assert_eq!(registry.find_by_name("agent").unwrap().name, "SymptomCheckerAgent");
        assert!(registry.find_by_name("pharmacy").is_none());
        assert!(registry.find_by_name("  ").is_none());
    }

    #[test]
    fn test_find_by_name_exact() {
        let file = registry_file(THREE_AGENTS);
        let registry = AgentRegistry::load(file.path(), NameMatch::Exact).unwrap();

        assert!(registry.find_by_name("symptom").is_none());
        assert!(registry.find_by_name("appointmentagent").is_some());
    }

    #[test]
    fn test_bare_array_and_list_order() {
        let file = registry_file(
            r#"[{"name": "B", "url": "http://b/"}, {"name": "A", "url": "http://a/"}]"#,
        );
        let registry = AgentRegistry::load(file.path(), NameMatch::Substring).unwrap();
        let names: Vec<_> = registry.list_all().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            AgentRegistry::load(dir.path().join("absent.json"), NameMatch::Substring).unwrap();
        assert!(registry.is_empty());
        assert!(registry.find_by_name("symptom").is_none());
    }

    #[test]
    fn test_malformed_and_duplicate_are_config_errors() {
        let malformed = registry_file(r#"{"agents": [{"name": "NoUrl"}]}"#);
        let err = AgentRegistry::load(malformed.path(), NameMatch::Substring)
            .err()
            .unwrap();
        assert!(matches!(err, CareError::Config(_)));

        let duplicate = registry_file(
            r#"[{"name": "Twin", "url": "http://a/"}, {"name": "twin", "url": "http://b/"}]"#,
        );
        let err = AgentRegistry::load(duplicate.path(), NameMatch::Substring)
            .err()
            .unwrap();
        assert!(matches!(err, CareError::Config(_)));
    }

    #[test]
    fn test_reload_keeps_snapshot_on_failure() {
        let file = registry_file(THREE_AGENTS);
        let registry = AgentRegistry::load(file.path(), NameMatch::Substring).unwrap();

        std::fs::write(file.path(), "{ broken").unwrap();
        assert!(registry.reload().is_err());
        assert_eq!(registry.len(), 3);

        std::fs::write(file.path(), r#"[{"name": "Solo", "url": "http://solo/"}]"#).unwrap();
        assert_eq!(registry.reload().unwrap(), 1);
        assert_eq!(registry.list_all()[0].name, "Solo");
    }
}
