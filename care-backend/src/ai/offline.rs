//! Deterministic replies used when no model API key is configured.

use super::tools::RecordTools;
use super::Reasoner;
use crate::error::CareResult;
use async_trait::async_trait;
use std::sync::Arc;

const SYMPTOM_RULES: &[(&[&str], &str)] = &[
    (&["chest pain"], "a cardiac or pulmonary problem; seek emergency care if it is severe or sudden"),
    (&["fever"], "a viral infection such as influenza"),
    (&["sore throat"], "pharyngitis"),
    (&["cough"], "an upper respiratory infection"),
    (&["headache", "migraine"], "a tension headache or migraine"),
    (&["rash", "itch"], "contact dermatitis or an allergic reaction"),
    (&["back", "joint", "pain"], "a musculoskeletal strain"),
];

const SPECIALISTS: &[(&[&str], &str)] = &[
    (&["dentist", "tooth", "teeth"], "Dentist"),
    (&["cardio", "chest", "heart"], "Cardiologist"),
    (&["eye", "vision"], "Ophthalmologist"),
    (&["skin", "rash", "dermat"], "Dermatologist"),
];

const TIMINGS: &[&str] = &[
    "tomorrow morning",
    "tomorrow afternoon",
    "tomorrow evening",
    "tomorrow",
    "today",
    "next week",
    "this week",
];

pub enum OfflineReasoner {
    SymptomChecker,
    Appointment,
    HealthRecords(Arc<RecordTools>),
}

#[async_trait]
impl Reasoner for OfflineReasoner {
    async fn invoke(&self, query: &str, _session_id: &str) -> CareResult<String> {
        Ok(match self {
            OfflineReasoner::SymptomChecker => check_symptoms(query),
            OfflineReasoner::Appointment => plan_appointment(query),
            OfflineReasoner::HealthRecords(records) => answer_records_query(records, query),
        })
    }
}

pub fn check_symptoms(query: &str) -> String {
    let lower = query.to_lowercase();
    let causes: Vec<&str> = SYMPTOM_RULES
        .iter()
        .filter(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, cause)| *cause)
        .collect();

    if causes.is_empty() {
        return "I could not identify specific symptoms in your message. \
                Please describe what you are feeling, for example 'I have a fever and sore throat'."
            .to_string();
    }
    format!(
        "Possible causes: {}. This is not a diagnosis; please consult a healthcare professional.",
        causes.join("; ")
    )
}

pub fn plan_appointment(query: &str) -> String {
    let lower = query.to_lowercase();
    let specialist = SPECIALISTS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, name)| *name)
        .unwrap_or("General Practitioner");
    let timing = TIMINGS
        .iter()
        .find(|t| lower.contains(*t))
        .copied()
        .unwrap_or("the next available slot");

    format!(
        "Appointment request received: {}, {}. You will get a confirmation once the clinic accepts the booking.",
        specialist, timing
    )
}

/// "Add note to 101: text" appends a note; anything else fetches the record
/// whose id is the digits in the query.
pub fn answer_records_query(records: &RecordTools, query: &str) -> String {
    let lower = query.to_lowercase();
    if lower.contains("add note") || lower.contains("update") {
        return match parse_note(query) {
            Some((patient_id, note)) => records.update_patient_note(patient_id, note),
            None => "Invalid input format: expected 'Add note to <patient id>: <note>'".to_string(),
        };
    }
    let patient_id: String = query.chars().filter(char::is_ascii_digit).collect();
    records.fetch_patient_record(&patient_id)
}

fn parse_note(query: &str) -> Option<(&str, &str)> {
    let (head, note) = query.split_once(':')?;
    let patient_id = head.split_whitespace().last()?;
    let note = note.trim();
    if note.is_empty() {
        return None;
    }
    Some((patient_id, note))
}
