/// Ordered keyword rules. The first rule with a keyword contained in the
/// lower-cased utterance picks the agent.
#[derive(Debug, Clone)]
pub struct KeywordRules {
    rules: Vec<(Vec<String>, String)>,
    fallback: Option<String>,
}

impl KeywordRules {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: None,
        }
    }

    /// The healthcare triage table: symptoms, then appointments, then records.
    pub fn healthcare(fallback: Option<String>) -> Self {
        Self::new()
            .rule(&["fever", "headache", "cough", "pain"], "SymptomCheckerAgent")
            .rule(&["appointment", "book"], "AppointmentAgent")
            .rule(&["record", "history"], "HealthRecordsAgent")
            .with_fallback(fallback)
    }

    pub fn rule(mut self, keywords: &[&str], agent: &str) -> Self {
        self.rules.push((
            keywords.iter().map(|k| k.to_lowercase()).collect(),
            agent.to_string(),
        ));
        self
    }

    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn select(&self, utterance: &str) -> Option<&str> {
        let lower = utterance.to_lowercase();
        self.rules
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|(_, agent)| agent.as_str())
            .or(self.fallback.as_deref())
    }
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthcare_table() {
        let rules = KeywordRules::healthcare(Some("SymptomCheckerAgent".to_string()));
        assert_eq!(rules.select("I have a FEVER"), Some("SymptomCheckerAgent"));
        assert_eq!(rules.select("Can I book a slot?"), Some("AppointmentAgent"));
        assert_eq!(rules.select("Show my medical history"), Some("HealthRecordsAgent"));
        assert_eq!(rules.select("hello"), Some("SymptomCheckerAgent"));
    }

    #[test]
    fn test_first_rule_wins() {
        let rules = KeywordRules::healthcare(None);
        // Mentions both a symptom and a booking; symptoms are listed first.
        assert_eq!(
            rules.select("Book an appointment for my headache"),
            Some("SymptomCheckerAgent")
        );
    }

    #[test]
    fn test_no_fallback() {
        let rules = KeywordRules::healthcare(None);
        assert_eq!(rules.select("hello"), None);
        assert_eq!(KeywordRules::new().select("fever"), None);
    }
}
