//! Intake agent: identification, greeting, small talk, clinical routing.
//!
//! While the session awaits identity the agent mines each message for a
//! name, resolves it against the patient directory and greets the patient
//! from their record. Once identified it classifies every turn as small
//! talk (answered directly) or clinical (handed off to the domain agent).

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use aftercare_core::error::Result;
use aftercare_core::log::{EventKind, InteractionLog};
use aftercare_core::types::{AgentTag, PatientRecord};

use crate::generation::TextGeneration;
use crate::lookup::{LookupOutcome, PatientLookup};

/// What the intake agent decided about one turn.
#[derive(Debug)]
pub enum IntakeOutcome {
    /// Intake answered the turn directly.
    Reply(String),
    /// A patient record was resolved; the greeting is the reply.
    Identified {
        patient: Box<PatientRecord>,
        reply: String,
    },
    /// The turn is clinical; the router must invoke the domain agent.
    Handoff,
}

/// Patterns that introduce a name. The "my name is" form accepts any
/// casing; the conversational forms require capitalized words so that
/// "I'm feeling dizzy" is not read as an introduction.
static NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bmy name is\s+([A-Za-z]+(?:\s+[A-Za-z]+)?)").unwrap(),
        Regex::new(r"\bI'?m\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").unwrap(),
        Regex::new(r"\bI am\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").unwrap(),
        Regex::new(r"\b[Tt]his is\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").unwrap(),
        Regex::new(r"\b[Cc]all me\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)").unwrap(),
    ]
});

/// Words that flag a turn as clinical without consulting generation.
const CLINICAL_KEYWORDS: &[&str] = &[
    "symptom",
    "pain",
    "swelling",
    "medication",
    "side effect",
    "treatment",
    "diet",
    "dizzy",
    "nausea",
    "headache",
    "fever",
    "blood",
    "urine",
    "pressure",
    "worried",
    "concern",
    "creatinine",
    "kidney",
    "dialysis",
    "doctor",
    "hospital",
    "emergency",
    "breathe",
    "chest",
    "heart",
];

const INTENT_PROMPT: &str = "Answer with exactly one word, yes or no. \
    Is the following message from a recently discharged patient asking a \
    medical or health-related question?\n\nMessage: ";

/// Intake agent over a patient directory and a best-effort intent classifier.
pub struct IntakeAgent {
    lookup: Arc<dyn PatientLookup>,
    generation: Arc<dyn TextGeneration>,
    log: Arc<InteractionLog>,
}

impl IntakeAgent {
    pub fn new(
        lookup: Arc<dyn PatientLookup>,
        generation: Arc<dyn TextGeneration>,
        log: Arc<InteractionLog>,
    ) -> Self {
        Self {
            lookup,
            generation,
            log,
        }
    }

    /// Handle a turn while no patient is identified yet.
    pub async fn handle_awaiting_identity(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<IntakeOutcome> {
        let Some(name) = extract_name(message) else {
            return Ok(IntakeOutcome::Reply(
                "Hello! I'm your aftercare assistant. Before we start, could you \
                 tell me your full name so I can pull up your discharge records?"
                    .to_string(),
            ));
        };
        self.identify(session_id, &name).await
    }

    /// Handle a turn for an identified patient: re-identification, small
    /// talk, or clinical handoff.
    pub async fn handle_identified(
        &self,
        session_id: &str,
        message: &str,
        patient: &PatientRecord,
    ) -> Result<IntakeOutcome> {
        // Giving a new name mid-session restarts identification and replaces
        // the cached record wholesale.
        if let Some(name) = extract_name(message) {
            if !patient.patient_name.to_lowercase().contains(&name.to_lowercase()) {
                return self.identify(session_id, &name).await;
            }
        }

        if self.is_clinical(message).await {
            return Ok(IntakeOutcome::Handoff);
        }

        let first_name = patient
            .patient_name
            .split_whitespace()
            .next()
            .unwrap_or(&patient.patient_name);
        Ok(IntakeOutcome::Reply(format!(
            "I'm here to help with your recovery, {}. Feel free to ask about \
             your medications, diet, follow-up visits, or any symptoms you're \
             noticing.",
            first_name
        )))
    }

    /// Resolve a name against the directory, retrying once on a transient
    /// failure, and turn the outcome into a user-visible reply. Also used
    /// directly by the router when the caller supplies a name hint.
    pub async fn identify(&self, session_id: &str, name: &str) -> Result<IntakeOutcome> {
        let outcome = match self.lookup.find_by_name(name).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(session = session_id, %err, "Patient lookup failed, retrying");
                match self.lookup.find_by_name(name).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(session = session_id, %err, "Patient lookup retry failed");
                        return Ok(IntakeOutcome::Reply(
                            "I'm having trouble reaching the patient records \
                             system right now. Could you try again in a moment?"
                                .to_string(),
                        ));
                    }
                }
            }
        };

        match outcome {
            LookupOutcome::Found(patient) => {
                self.log.record(
                    Some(session_id),
                    AgentTag::Intake.as_str(),
                    EventKind::PatientResolved,
                    format!("resolved '{}' to {}", name, patient.patient_name),
                );
                let reply = format!(
                    "Hello {}! I found your records. You were discharged on {} \
                     after treatment for {}. How can I help with your recovery \
                     today?",
                    patient.patient_name, patient.discharge_date, patient.primary_diagnosis
                );
                Ok(IntakeOutcome::Identified { patient, reply })
            }
            LookupOutcome::NotFound => {
                self.log.record(
                    Some(session_id),
                    AgentTag::Intake.as_str(),
                    EventKind::PatientNotFound,
                    format!("no record for '{}'", name),
                );
                Ok(IntakeOutcome::Reply(format!(
                    "I couldn't find a patient record under the name \"{}\". \
                     Could you give me your full name exactly as it appears on \
                     your discharge paperwork?",
                    name
                )))
            }
            LookupOutcome::Ambiguous(names) => Ok(IntakeOutcome::Reply(format!(
                "I found several patients matching that name: {}. Could you be \
                 more specific?",
                names.join(", ")
            ))),
        }
    }

    /// Keyword rule first; on no match, one short generation call decides.
    /// Generation failure defaults to small talk.
    async fn is_clinical(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        if CLINICAL_KEYWORDS.iter().any(|k| lowered.contains(k)) {
            return true;
        }

        let prompt = format!("{}{}", INTENT_PROMPT, message);
        match self.generation.generate(&prompt).await {
            Ok(answer) => answer.trim().to_lowercase().starts_with("yes"),
            Err(err) => {
                warn!(%err, "Intent classification failed, treating as small talk");
                false
            }
        }
    }
}

/// Extract an introduced name from free text, if any pattern matches.
pub fn extract_name(message: &str) -> Option<String> {
    for pattern in NAME_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(message) {
            let name = captures
                .get(1)
                .map(|m| m.as_str().trim().trim_end_matches(['.', ',', '!', '?']))
                .filter(|n| !n.is_empty());
            if let Some(name) = name {
                return Some(name.to_string());
            }
        }
    }
    None
}
