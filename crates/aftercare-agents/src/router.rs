//! Turn router: the single entry point for conversation turns.
//!
//! The router checks out the session, serializes the turn under the
//! per-session lock, dispatches to intake or clinical based on router
//! state, validates every state transition, and commits the user and
//! agent turns atomically. Results landing after the turn deadline are
//! discarded rather than written.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use aftercare_core::error::{AftercareError, Result};
use aftercare_core::log::{EventKind, InteractionLog};
use aftercare_core::types::{AgentTag, Evidence, PatientRecord, RouterState, Session, Turn};

use crate::clinical::ClinicalAgent;
use crate::intake::{IntakeAgent, IntakeOutcome};
use crate::session::SessionStore;
use crate::state_machine::validate_transition;

/// One inbound conversation turn.
#[derive(Clone, Debug, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
    /// Explicit patient name, taking precedence over name mining while the
    /// session awaits identity.
    pub patient_name_hint: Option<String>,
}

/// The committed result of one turn.
#[derive(Clone, Debug, Serialize)]
pub struct TurnOutcome {
    pub reply: String,
    pub agent: AgentTag,
    pub state: RouterState,
    pub citations: Vec<Evidence>,
    pub patient: Option<PatientRecord>,
}

/// Routes turns between the intake and clinical agents.
pub struct TurnRouter {
    store: SessionStore,
    intake: IntakeAgent,
    clinical: ClinicalAgent,
    log: Arc<InteractionLog>,
    turn_deadline: Duration,
}

impl TurnRouter {
    pub fn new(
        store: SessionStore,
        intake: IntakeAgent,
        clinical: ClinicalAgent,
        log: Arc<InteractionLog>,
        turn_deadline: Duration,
    ) -> Self {
        Self {
            store,
            intake,
            clinical,
            log,
            turn_deadline,
        }
    }

    /// Process one turn end to end.
    ///
    /// Domain-level failures (lookup misses, degraded retrieval, generation
    /// outages) surface as replies, never as errors; errors here mean the
    /// request itself was unusable or the turn deadline passed.
    pub async fn handle_turn(&self, request: &TurnRequest) -> Result<TurnOutcome> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AftercareError::Api("message must not be empty".to_string()));
        }
        if request.session_id.trim().is_empty() {
            return Err(AftercareError::Api(
                "session_id must not be empty".to_string(),
            ));
        }

        let started = Instant::now();
        let session_id = request.session_id.as_str();

        let handle = self.store.checkout(session_id);
        let mut session = handle.lock().await;

        self.log.record(
            Some(session_id),
            "router",
            EventKind::TurnReceived,
            message,
        );

        // Dispatch runs against a working copy so an expired deadline
        // discards the whole result: no turns, no state, no patient.
        let mut working = session.clone();

        // A crash between handoff and revert could strand the persisted
        // state; normalize before dispatch so the table below stays closed.
        if working.state == RouterState::RoutedClinical {
            validate_transition(RouterState::RoutedClinical, RouterState::Identified)?;
            working.state = RouterState::Identified;
        }

        let (reply, agent, citations) = match working.state {
            RouterState::AwaitingIdentity => {
                self.dispatch_awaiting_identity(&mut working, message, request).await?
            }
            RouterState::Identified => {
                self.dispatch_identified(&mut working, message).await?
            }
            RouterState::RoutedClinical => unreachable!("normalized above"),
        };

        // Stale results are discarded, not committed.
        if started.elapsed() > self.turn_deadline {
            return Err(AftercareError::Session(format!(
                "turn exceeded deadline of {:?}; result discarded",
                self.turn_deadline
            )));
        }

        working.record_turn(Turn::user(message, agent));
        working.record_turn(Turn::agent(reply.clone(), agent, citations.clone()));
        *session = working;
        self.log.record(
            Some(session_id),
            agent.as_str(),
            EventKind::ReplySent,
            &reply,
        );

        Ok(TurnOutcome {
            reply,
            agent,
            state: session.state,
            citations,
            patient: session.patient.clone(),
        })
    }

    async fn dispatch_awaiting_identity(
        &self,
        session: &mut Session,
        message: &str,
        request: &TurnRequest,
    ) -> Result<(String, AgentTag, Vec<Evidence>)> {
        let hint = request
            .patient_name_hint
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty());

        let outcome = match hint {
            Some(name) => self.intake.identify(&session.id, name).await?,
            None => self.intake.handle_awaiting_identity(&session.id, message).await?,
        };

        match outcome {
            IntakeOutcome::Identified { patient, reply } => {
                validate_transition(session.state, RouterState::Identified)?;
                session.patient = Some(*patient);
                session.state = RouterState::Identified;
                Ok((reply, AgentTag::Intake, Vec::new()))
            }
            IntakeOutcome::Reply(reply) => {
                validate_transition(session.state, RouterState::AwaitingIdentity)?;
                Ok((reply, AgentTag::Intake, Vec::new()))
            }
            IntakeOutcome::Handoff => Err(AftercareError::Router(
                "clinical handoff before identification".to_string(),
            )),
        }
    }

    async fn dispatch_identified(
        &self,
        session: &mut Session,
        message: &str,
    ) -> Result<(String, AgentTag, Vec<Evidence>)> {
        let patient = session.patient.clone().ok_or_else(|| {
            AftercareError::Session("identified session has no patient record".to_string())
        })?;

        let outcome = self
            .intake
            .handle_identified(&session.id, message, &patient)
            .await?;

        match outcome {
            IntakeOutcome::Reply(reply) => {
                validate_transition(session.state, RouterState::Identified)?;
                Ok((reply, AgentTag::Intake, Vec::new()))
            }
            IntakeOutcome::Identified { patient, reply } => {
                // Mid-session re-identification replaces the record wholesale.
                validate_transition(session.state, RouterState::Identified)?;
                session.patient = Some(*patient);
                Ok((reply, AgentTag::Intake, Vec::new()))
            }
            IntakeOutcome::Handoff => {
                validate_transition(session.state, RouterState::RoutedClinical)?;
                session.state = RouterState::RoutedClinical;
                // The handoff is observable before the clinical agent runs.
                self.log.record(
                    Some(session.id.as_str()),
                    AgentTag::Intake.as_str(),
                    EventKind::AgentHandoff,
                    format!("clinical question: {}", message),
                );

                let reply = self.clinical.answer(&session.id, message, &patient).await;

                // The clinical state is scoped to this turn, success or not.
                validate_transition(session.state, RouterState::Identified)?;
                session.state = RouterState::Identified;
                Ok((reply.text, AgentTag::Clinical, reply.citations))
            }
        }
    }

    /// Clear a session. Idempotent; always logged.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let existed = self.store.clear(session_id);
        self.log.record(
            Some(session_id),
            "router",
            EventKind::SessionCleared,
            if existed { "session cleared" } else { "no such session" },
        );
        existed
    }

    /// Snapshot a session without creating it.
    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.store.get(session_id)
    }

    /// Number of live sessions, for the health probe.
    pub fn active_sessions(&self) -> usize {
        self.store.active_count()
    }
}
