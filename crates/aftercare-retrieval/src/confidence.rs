//! Confidence evaluation for retrieval results.
//!
//! Decides whether the locally indexed passages are good enough to answer
//! from, or whether the pipeline must escalate to web search. Two
//! independent triggers: the top-score threshold and recency markers in the
//! query (static indexed content can never be current).

use regex::Regex;
use std::sync::LazyLock;

use crate::providers::ScoredPassage;

/// Outcome of a confidence evaluation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Verdict {
    /// True when local evidence alone may answer the query.
    pub sufficient: bool,
    /// Score of the best passage, 0.0 when the list is empty.
    pub top_score: f64,
}

/// Policy deciding whether local retrieval is adequate.
///
/// Injectable so the threshold and marker heuristics can be swapped or
/// tuned without touching the pipeline's control flow.
pub trait ConfidencePolicy: Send + Sync {
    fn evaluate(&self, query: &str, passages: &[ScoredPassage]) -> Verdict;
}

/// Markers signaling the user wants current information. Research-topic
/// words (study, trial, guideline) count too: publication-driven topics go
/// stale in a static corpus just as quickly as explicitly dated ones.
static RECENCY_MARKERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\blatest\b",
        r"(?i)\brecent\b",
        r"(?i)\bnew(est)?\s+(research|study|studies|treatment|trial|drug|findings?)\b",
        r"(?i)\bcurrent\b",
        r"(?i)\bup[\s-]?to[\s-]?date\b",
        r"(?i)\b20(2[4-9]|3\d)\b",
        r"(?i)\bstud(y|ies)\b",
        r"(?i)\bresearch\b",
        r"(?i)\btrials?\b",
        r"(?i)\bbreakthrough\b",
        r"(?i)\bnews\b",
        r"(?i)\bupdates?\b",
        r"(?i)\bguidelines?\b",
        r"(?i)\bfda[\s-]approved\b",
        r"(?i)\bsglt2\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid recency marker regex"))
    .collect()
});

/// Threshold-based confidence policy with recency-marker escalation.
pub struct ThresholdPolicy {
    threshold: f64,
    markers: Vec<Regex>,
}

impl ThresholdPolicy {
    /// Create a policy with the given score threshold and default markers.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            markers: RECENCY_MARKERS.clone(),
        }
    }

    /// Create a policy with a custom recency marker set.
    pub fn with_markers(threshold: f64, markers: Vec<Regex>) -> Self {
        Self { threshold, markers }
    }

    /// True when the query asks for information newer than the corpus.
    pub fn has_recency_marker(&self, query: &str) -> bool {
        self.markers.iter().any(|re| re.is_match(query))
    }
}

impl ConfidencePolicy for ThresholdPolicy {
    fn evaluate(&self, query: &str, passages: &[ScoredPassage]) -> Verdict {
        let top_score = passages.first().map(|p| p.score).unwrap_or(0.0);

        // An empty list is never sufficient, whatever the threshold.
        if passages.is_empty() {
            return Verdict {
                sufficient: false,
                top_score: 0.0,
            };
        }

        // Recency markers force escalation even at a perfect score.
        if self.has_recency_marker(query) {
            return Verdict {
                sufficient: false,
                top_score,
            };
        }

        Verdict {
            sufficient: top_score >= self.threshold,
            top_score,
        }
    }
}
