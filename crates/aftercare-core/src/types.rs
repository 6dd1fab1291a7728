use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Which agent owns a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTag {
    /// Intake agent: identification, greeting, small talk, routing.
    Intake,
    /// Clinical agent: evidence-grounded medical answers.
    Clinical,
}

impl AgentTag {
    /// Stable string form used in log entries and API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentTag::Intake => "intake",
            AgentTag::Clinical => "clinical",
        }
    }
}

/// The speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Agent,
}

/// Router state driving which agent handles the next turn.
///
/// `RoutedClinical` is terminal per turn: the router enters it for the
/// duration of a clinical hand-off and reverts to `Identified` once the
/// clinical turn commits, so subsequent small talk is routed to intake again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    /// No patient resolved yet; intake is asking for a name.
    AwaitingIdentity,
    /// A patient record is loaded; intake classifies each turn.
    Identified,
    /// The current turn has been handed to the clinical agent.
    RoutedClinical,
}

/// Where a piece of evidence came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A passage from the indexed reference corpus.
    IndexedPassage,
    /// A live web search result.
    WebResult,
    /// A fact from the patient's discharge record.
    PatientRecord,
}

// =============================================================================
// Evidence
// =============================================================================

/// A single piece of retrieved evidence with provenance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Evidence {
    /// Source kind of this item.
    pub kind: SourceKind,
    /// Page/section reference for indexed passages, URL for web results.
    pub provenance: String,
    /// Short excerpt of the underlying content.
    pub excerpt: String,
    /// Relevance score in [0.0, 1.0]; higher is more relevant.
    pub score: f64,
}

/// Ordered evidence backing one clinical answer.
///
/// Constructed fresh per clinical-agent invocation; never persisted beyond
/// the turn that cites it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Evidence items in citation order.
    pub items: Vec<Evidence>,
    /// True when the web fallback contributed to this bundle.
    pub used_web_fallback: bool,
}

impl EvidenceBundle {
    /// Create an empty bundle.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

// =============================================================================
// Turn / Session
// =============================================================================

/// One immutable conversation turn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: TurnRole,
    /// The message text.
    pub text: String,
    /// The agent that owned this turn.
    pub agent: AgentTag,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
    /// Evidence citations attached to this turn (agent turns only).
    pub citations: Vec<Evidence>,
}

impl Turn {
    /// Create a user turn owned by the given agent.
    pub fn user(text: impl Into<String>, agent: AgentTag) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            agent,
            timestamp: Utc::now(),
            citations: Vec::new(),
        }
    }

    /// Create an agent reply turn with citations.
    pub fn agent(text: impl Into<String>, agent: AgentTag, citations: Vec<Evidence>) -> Self {
        Self {
            role: TurnRole::Agent,
            text: text.into(),
            agent,
            timestamp: Utc::now(),
            citations,
        }
    }
}

/// Conversation state for one patient interaction.
///
/// Owned exclusively by the session store and mutated only by the turn
/// router. The turn list is append-only; turns are never edited or removed
/// except on full session clear.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session identifier supplied by the caller.
    pub id: String,
    /// Append-only turn history.
    pub turns: Vec<Turn>,
    /// Resolved patient record; `None` until identification succeeds.
    pub patient: Option<PatientRecord>,
    /// Current router state.
    pub state: RouterState,
    /// When the session was created.
    pub started_at: DateTime<Utc>,
    /// Last turn activity, used for idle-timeout eviction.
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session in the initial router state.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            turns: Vec::new(),
            patient: None,
            state: RouterState::AwaitingIdentity,
            started_at: now,
            last_activity_at: now,
        }
    }

    /// Append a turn and bump the activity timestamp.
    pub fn record_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_activity_at = Utc::now();
    }
}

// =============================================================================
// Patient record
// =============================================================================

/// Key lab values from the discharge report.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LabResults {
    pub creatinine_mg_dl: f64,
    pub egfr_ml_min: f64,
    pub potassium_meq_l: f64,
    pub hemoglobin_g_dl: f64,
}

/// A patient's structured discharge summary.
///
/// Fetched once per session from the external record lookup and cached on
/// the session. Never mutated after resolution; a different name given
/// mid-session produces a whole new record, not a merge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: String,
    pub patient_name: String,
    pub date_of_birth: String,
    pub primary_diagnosis: String,
    pub secondary_diagnoses: Vec<String>,
    pub discharge_date: String,
    pub medications: Vec<String>,
    pub dietary_restrictions: String,
    pub follow_up: String,
    pub warning_signs: String,
    pub discharge_instructions: String,
    pub lab_results: LabResults,
}

impl PatientRecord {
    /// Format the record as a readable summary for prompts and greetings.
    pub fn summary(&self) -> String {
        let medications = self
            .medications
            .iter()
            .map(|m| format!("  - {}", m))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Patient: {}\n\
             DOB: {}\n\
             Discharge Date: {}\n\n\
             PRIMARY DIAGNOSIS: {}\n\
             Secondary Conditions: {}\n\n\
             MEDICATIONS:\n{}\n\n\
             DIETARY RESTRICTIONS: {}\n\n\
             FOLLOW-UP: {}\n\n\
             WARNING SIGNS TO WATCH FOR:\n{}\n\n\
             DISCHARGE INSTRUCTIONS:\n{}\n\n\
             LAB RESULTS:\n\
             \x20 - Creatinine: {} mg/dL\n\
             \x20 - eGFR: {} mL/min\n\
             \x20 - Potassium: {} mEq/L\n\
             \x20 - Hemoglobin: {} g/dL",
            self.patient_name,
            self.date_of_birth,
            self.discharge_date,
            self.primary_diagnosis,
            self.secondary_diagnoses.join(", "),
            medications,
            self.dietary_restrictions,
            self.follow_up,
            self.warning_signs,
            self.discharge_instructions,
            self.lab_results.creatinine_mg_dl,
            self.lab_results.egfr_ml_min,
            self.lab_results.potassium_meq_l,
            self.lab_results.hemoglobin_g_dl,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> PatientRecord {
        PatientRecord {
            id: "pt-001".to_string(),
            patient_name: "John Smith".to_string(),
            date_of_birth: "1958-03-12".to_string(),
            primary_diagnosis: "Chronic Kidney Disease Stage 3".to_string(),
            secondary_diagnoses: vec!["Hypertension".to_string(), "Type 2 Diabetes".to_string()],
            discharge_date: "2025-01-15".to_string(),
            medications: vec!["Lisinopril 10mg daily".to_string()],
            dietary_restrictions: "Low sodium, low potassium".to_string(),
            follow_up: "Nephrology clinic in 2 weeks".to_string(),
            warning_signs: "Swelling, shortness of breath".to_string(),
            discharge_instructions: "Monitor blood pressure daily".to_string(),
            lab_results: LabResults {
                creatinine_mg_dl: 1.8,
                egfr_ml_min: 45.0,
                potassium_meq_l: 4.2,
                hemoglobin_g_dl: 11.5,
            },
        }
    }

    #[test]
    fn test_session_new_starts_awaiting_identity() {
        let session = Session::new("s-1");
        assert_eq!(session.state, RouterState::AwaitingIdentity);
        assert!(session.turns.is_empty());
        assert!(session.patient.is_none());
    }

    #[test]
    fn test_record_turn_appends_and_touches() {
        let mut session = Session::new("s-1");
        let before = session.last_activity_at;
        session.record_turn(Turn::user("hello", AgentTag::Intake));
        assert_eq!(session.turns.len(), 1);
        assert!(session.last_activity_at >= before);
    }

    #[test]
    fn test_turn_user_has_no_citations() {
        let turn = Turn::user("hello", AgentTag::Intake);
        assert_eq!(turn.role, TurnRole::User);
        assert!(turn.citations.is_empty());
    }

    #[test]
    fn test_turn_agent_carries_citations() {
        let evidence = Evidence {
            kind: SourceKind::IndexedPassage,
            provenance: "Page 12".to_string(),
            excerpt: "CKD symptoms include...".to_string(),
            score: 0.9,
        };
        let turn = Turn::agent("answer", AgentTag::Clinical, vec![evidence]);
        assert_eq!(turn.role, TurnRole::Agent);
        assert_eq!(turn.citations.len(), 1);
    }

    #[test]
    fn test_patient_summary_contains_key_facts() {
        let summary = sample_record().summary();
        assert!(summary.contains("John Smith"));
        assert!(summary.contains("Chronic Kidney Disease Stage 3"));
        assert!(summary.contains("2025-01-15"));
        assert!(summary.contains("Lisinopril 10mg daily"));
        assert!(summary.contains("eGFR: 45 mL/min"));
    }

    #[test]
    fn test_evidence_bundle_default_empty() {
        let bundle = EvidenceBundle::new();
        assert!(bundle.is_empty());
        assert_eq!(bundle.len(), 0);
        assert!(!bundle.used_web_fallback);
    }

    #[test]
    fn test_router_state_serde_snake_case() {
        let json = serde_json::to_string(&RouterState::AwaitingIdentity).unwrap();
        assert_eq!(json, "\"awaiting_identity\"");
        let back: RouterState = serde_json::from_str("\"routed_clinical\"").unwrap();
        assert_eq!(back, RouterState::RoutedClinical);
    }

    #[test]
    fn test_agent_tag_as_str() {
        assert_eq!(AgentTag::Intake.as_str(), "intake");
        assert_eq!(AgentTag::Clinical.as_str(), "clinical");
    }
}
