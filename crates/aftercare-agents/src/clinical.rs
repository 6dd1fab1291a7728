//! Clinical agent: evidence-grounded answers to medical questions.
//!
//! One invocation runs the retrieval pipeline, builds a prompt from the
//! patient record and the evidence bundle, and calls generation with a
//! bounded timeout and a single retry. The agent never fails a turn:
//! generation failure yields a deterministic fallback reply that still
//! carries the citations and the disclaimer.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use aftercare_core::log::{EventKind, InteractionLog};
use aftercare_core::types::{AgentTag, Evidence, EvidenceBundle, PatientRecord};
use aftercare_retrieval::pipeline::RetrievalPipeline;

use crate::generation::TextGeneration;

/// Fixed disclaimer appended to every clinical reply.
pub const DISCLAIMER: &str = "⚠️ This information is for educational purposes \
    only. Always consult with your healthcare provider for medical advice.";

/// Framing line prefixed when web evidence contributed to the answer.
const WEB_FRAMING: &str = "Using web search for recent information:";

/// A clinical answer with the evidence that backs it.
#[derive(Clone, Debug)]
pub struct ClinicalReply {
    pub text: String,
    pub citations: Vec<Evidence>,
}

/// Evidence-grounded answering agent.
pub struct ClinicalAgent {
    pipeline: Arc<RetrievalPipeline>,
    generation: Arc<dyn TextGeneration>,
    log: Arc<InteractionLog>,
    generation_timeout_secs: u64,
    retry_backoff_ms: u64,
}

impl ClinicalAgent {
    pub fn new(
        pipeline: Arc<RetrievalPipeline>,
        generation: Arc<dyn TextGeneration>,
        log: Arc<InteractionLog>,
        generation_timeout_secs: u64,
        retry_backoff_ms: u64,
    ) -> Self {
        Self {
            pipeline,
            generation,
            log,
            generation_timeout_secs,
            retry_backoff_ms,
        }
    }

    /// Answer a clinical question for an identified patient.
    ///
    /// Never returns an error; degraded paths produce a fallback reply.
    pub async fn answer(
        &self,
        session_id: &str,
        question: &str,
        patient: &PatientRecord,
    ) -> ClinicalReply {
        let bundle = self
            .pipeline
            .retrieve(Some(session_id), question, Some(patient))
            .await;

        let prompt = build_prompt(patient, &bundle, question);
        let body = match self.generate_bounded(&prompt).await {
            Some(text) => text,
            None => {
                self.log.record(
                    Some(session_id),
                    AgentTag::Clinical.as_str(),
                    EventKind::GenerationFailed,
                    format!("fallback reply used for: {}", question),
                );
                fallback_body(patient)
            }
        };

        ClinicalReply {
            text: compose_reply(&body, &bundle),
            citations: bundle.items,
        }
    }

    /// Generation with a bounded timeout and one retry with backoff.
    async fn generate_bounded(&self, prompt: &str) -> Option<String> {
        let timeout = Duration::from_secs(self.generation_timeout_secs);
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(self.retry_backoff_ms)).await;
            }
            match tokio::time::timeout(timeout, self.generation.generate(prompt)).await {
                Ok(Ok(text)) if !text.trim().is_empty() => return Some(text),
                Ok(Ok(_)) => warn!(attempt, "Generation returned empty text"),
                Ok(Err(e)) => warn!(attempt, error = %e, "Generation failed"),
                Err(_) => warn!(attempt, "Generation timed out"),
            }
        }
        None
    }
}

fn build_prompt(patient: &PatientRecord, bundle: &EvidenceBundle, question: &str) -> String {
    let mut evidence = String::new();
    for (i, item) in bundle.items.iter().enumerate() {
        evidence.push_str(&format!("[{}] ({}) {}\n", i + 1, item.provenance, item.excerpt));
    }
    if evidence.is_empty() {
        evidence.push_str("(no reference passages retrieved)\n");
    }

    format!(
        "You are a post-discharge care assistant answering a question from a \
         recently discharged patient. Ground your answer in the patient \
         record and the numbered reference evidence, citing evidence by \
         number where relevant. Be concise and practical. If the evidence \
         does not cover the question, say so and point the patient to their \
         care team.\n\n\
         PATIENT RECORD:\n{}\n\n\
         REFERENCE EVIDENCE:\n{}\n\
         QUESTION: {}",
        patient.summary(),
        evidence,
        question
    )
}

/// Deterministic reply used when generation is unavailable.
fn fallback_body(patient: &PatientRecord) -> String {
    format!(
        "I'm unable to put together a detailed answer right now. In the \
         meantime, please follow your discharge instructions: {}. Your \
         scheduled follow-up is: {}. Contact your care team promptly if you \
         notice any of these warning signs: {}.",
        patient.discharge_instructions, patient.follow_up, patient.warning_signs
    )
}

/// Assemble the final reply: optional web framing, body, disclaimer, and a
/// deterministic citation list derived from the bundle.
fn compose_reply(body: &str, bundle: &EvidenceBundle) -> String {
    let mut text = String::new();
    if bundle.used_web_fallback {
        text.push_str(WEB_FRAMING);
        text.push_str("\n\n");
    }
    text.push_str(body.trim());
    text.push_str("\n\n");
    text.push_str(DISCLAIMER);

    if !bundle.is_empty() {
        text.push_str("\n\nSources:");
        for (i, item) in bundle.items.iter().enumerate() {
            text.push_str(&format!("\n  [{}] {}", i + 1, item.provenance));
        }
    }
    text
}
