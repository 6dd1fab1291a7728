//! Confidence-gated retrieval pipeline.
//!
//! Stages: passage index search -> confidence evaluation -> optional web
//! fallback (primary, then secondary) -> evidence bundle. The pipeline
//! never fails a turn: every provider call has a bounded timeout and at
//! most one retry, and total provider failure degrades to whatever indexed
//! evidence exists.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use aftercare_core::config::RetrievalConfig;
use aftercare_core::log::{EventKind, InteractionLog};
use aftercare_core::types::{Evidence, EvidenceBundle, PatientRecord, SourceKind};

use crate::confidence::ConfidencePolicy;
use crate::providers::{PassageSearch, ScoredPassage, WebHit, WebSearch};

/// Excerpt length cap for evidence items.
const MAX_EXCERPT_LEN: usize = 150;

/// Composes passage search, confidence gating, and web fallback into one
/// evidence-producing call.
pub struct RetrievalPipeline {
    index: Arc<dyn PassageSearch>,
    primary_web: Arc<dyn WebSearch>,
    secondary_web: Arc<dyn WebSearch>,
    policy: Arc<dyn ConfidencePolicy>,
    log: Arc<InteractionLog>,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn new(
        index: Arc<dyn PassageSearch>,
        primary_web: Arc<dyn WebSearch>,
        secondary_web: Arc<dyn WebSearch>,
        policy: Arc<dyn ConfidencePolicy>,
        log: Arc<InteractionLog>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            primary_web,
            secondary_web,
            policy,
            log,
            config,
        }
    }

    /// Retrieve evidence for a clinical query.
    ///
    /// Always returns a bundle; degraded retrieval is flagged in the log,
    /// never surfaced as an error.
    pub async fn retrieve(
        &self,
        session_id: Option<&str>,
        query: &str,
        patient: Option<&PatientRecord>,
    ) -> EvidenceBundle {
        // Step 1: ranked passages from the index, diagnosis-augmented when
        // a patient is resolved.
        let passage_query = match patient {
            Some(p) => format!("{} {}", query, p.primary_diagnosis),
            None => query.to_string(),
        };
        let passages = self.search_passages(&passage_query).await;

        // Step 2: confidence gate.
        let verdict = self.policy.evaluate(query, &passages);
        debug!(
            sufficient = verdict.sufficient,
            top_score = verdict.top_score,
            passages = passages.len(),
            "Confidence evaluated"
        );

        // Step 3: local evidence is enough.
        if verdict.sufficient {
            let bundle = EvidenceBundle {
                items: passages
                    .iter()
                    .take(self.config.top_k)
                    .map(passage_evidence)
                    .collect(),
                used_web_fallback: false,
            };
            self.log.record(
                session_id,
                "retrieval",
                EventKind::RetrievalCompleted,
                format!(
                    "{} indexed passages, top score {:.2}",
                    bundle.len(),
                    verdict.top_score
                ),
            );
            return bundle;
        }

        // Step 4: escalate to web search.
        self.log.record(
            session_id,
            "retrieval",
            EventKind::WebFallback,
            format!(
                "local top score {:.2} insufficient for: {}",
                verdict.top_score, query
            ),
        );

        let web_query = format!("medical research {}", query);
        let mut hits = self.search_web(&*self.primary_web, &web_query).await;
        if hits.is_empty() {
            warn!(provider = self.primary_web.name(), "Primary web search empty or failed, trying secondary");
            hits = self.search_web(&*self.secondary_web, &web_query).await;
        }

        // Merge rule: a non-empty borderline local match keeps its single
        // best passage ahead of appended web results; web results never
        // substitute for relevant local evidence.
        let mut items: Vec<Evidence> = Vec::new();
        if hits.is_empty() {
            // Both providers down: degrade to the indexed evidence we have.
            items.extend(passages.iter().take(self.config.top_k).map(passage_evidence));
            self.log.record(
                session_id,
                "retrieval",
                EventKind::RetrievalCompleted,
                format!("web providers unavailable, degraded to {} indexed passages", items.len()),
            );
            return EvidenceBundle {
                items,
                used_web_fallback: false,
            };
        }

        if let Some(best) = passages.first() {
            items.push(passage_evidence(best));
        }
        items.extend(hits.iter().map(web_evidence));

        self.log.record(
            session_id,
            "retrieval",
            EventKind::RetrievalCompleted,
            format!(
                "{} items ({} web), top local score {:.2}",
                items.len(),
                hits.len(),
                verdict.top_score
            ),
        );

        EvidenceBundle {
            items,
            used_web_fallback: true,
        }
    }

    /// Passage search with bounded timeout and one retry. Failure returns
    /// an empty list so the turn can proceed.
    async fn search_passages(&self, query: &str) -> Vec<ScoredPassage> {
        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
            }
            match tokio::time::timeout(timeout, self.index.search(query, self.config.top_k)).await
            {
                Ok(Ok(passages)) => return passages,
                Ok(Err(e)) => warn!(attempt, error = %e, "Passage search failed"),
                Err(_) => warn!(attempt, "Passage search timed out"),
            }
        }
        Vec::new()
    }

    /// Web search with bounded timeout and one retry. Failure or an empty
    /// result set both yield an empty list, which the caller treats as
    /// "try the next provider".
    async fn search_web(&self, provider: &dyn WebSearch, query: &str) -> Vec<WebHit> {
        let timeout = Duration::from_secs(self.config.provider_timeout_secs);
        for attempt in 0..2 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.retry_backoff_ms)).await;
            }
            match tokio::time::timeout(timeout, provider.search(query, self.config.max_web_results)).await
            {
                Ok(Ok(hits)) if !hits.is_empty() => return hits,
                Ok(Ok(_)) => {
                    debug!(provider = provider.name(), attempt, "Web search returned no results");
                    return Vec::new();
                }
                Ok(Err(e)) => warn!(provider = provider.name(), attempt, error = %e, "Web search failed"),
                Err(_) => warn!(provider = provider.name(), attempt, "Web search timed out"),
            }
        }
        Vec::new()
    }
}

fn passage_evidence(p: &ScoredPassage) -> Evidence {
    Evidence {
        kind: SourceKind::IndexedPassage,
        provenance: p.provenance.clone(),
        excerpt: truncate_excerpt(&p.text),
        score: p.score,
    }
}

fn web_evidence(hit: &WebHit) -> Evidence {
    Evidence {
        kind: SourceKind::WebResult,
        provenance: hit.url.clone(),
        excerpt: truncate_excerpt(&hit.snippet),
        score: hit.score,
    }
}

fn truncate_excerpt(text: &str) -> String {
    if text.len() <= MAX_EXCERPT_LEN {
        return text.to_string();
    }
    let cut = text
        .char_indices()
        .take_while(|(i, _)| *i < MAX_EXCERPT_LEN)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    format!("{}...", &text[..cut])
}
