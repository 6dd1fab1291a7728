//! In-memory lexical passage index.
//!
//! Default in-process adapter for the external passage-search contract:
//! scores passages by normalized query-token overlap, deterministic and
//! dependency-free. The corpus loads from a JSONL file of
//! `{"text": ..., "provenance": ...}` records produced by the offline
//! indexing job.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use aftercare_core::error::{AftercareError, Result};

use crate::providers::{PassageSearch, ScoredPassage};

/// One corpus passage as stored on disk.
#[derive(Clone, Debug, Deserialize)]
pub struct CorpusPassage {
    pub text: String,
    /// Page/section reference, e.g. "Comprehensive Clinical Nephrology, Page 87".
    pub provenance: String,
}

/// Token-overlap passage index over an in-memory corpus.
#[derive(Debug)]
pub struct LexicalPassageIndex {
    passages: Vec<(CorpusPassage, HashSet<String>)>,
}

impl LexicalPassageIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            passages: Vec::new(),
        }
    }

    /// Add a passage to the index.
    pub fn insert(&mut self, text: impl Into<String>, provenance: impl Into<String>) {
        let passage = CorpusPassage {
            text: text.into(),
            provenance: provenance.into(),
        };
        let tokens = tokenize(&passage.text);
        self.passages.push((passage, tokens));
    }

    /// Load a corpus from a JSONL file, one passage object per line.
    pub fn load_jsonl(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_jsonl(&content)
    }

    /// Parse a JSONL string into an index. Blank lines are skipped.
    pub fn from_jsonl(content: &str) -> Result<Self> {
        let mut index = Self::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let passage: CorpusPassage = serde_json::from_str(line).map_err(|e| {
                AftercareError::Retrieval(format!("corpus line {}: {}", lineno + 1, e))
            })?;
            index.insert(passage.text, passage.provenance);
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl Default for LexicalPassageIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PassageSearch for LexicalPassageIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<ScoredPassage> = self
            .passages
            .iter()
            .filter_map(|(passage, tokens)| {
                let overlap = query_tokens.intersection(tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(ScoredPassage {
                    text: passage.text.clone(),
                    provenance: passage.provenance.clone(),
                    score: overlap as f64 / query_tokens.len() as f64,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Lowercased alphanumeric tokens of length >= 3, minus high-frequency
/// function words that would otherwise dominate overlap scores.
fn tokenize(text: &str) -> HashSet<String> {
    const STOP_WORDS: &[&str] = &[
        "the", "and", "for", "are", "was", "with", "that", "this", "have", "has", "can",
        "what", "which", "how", "when", "where", "who", "why", "you", "your", "not",
        "about", "from", "been", "were", "they", "them", "their", "should", "would",
    ];

    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.len() >= 3 && !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> LexicalPassageIndex {
        let mut index = LexicalPassageIndex::new();
        index.insert(
            "Chronic kidney disease symptoms include fatigue, swelling of the legs, \
             and changes in urination.",
            "Page 42",
        );
        index.insert(
            "Dietary potassium restriction is recommended for patients with reduced \
             kidney function.",
            "Page 87",
        );
        index.insert(
            "Dialysis replaces kidney function when eGFR falls below 15.",
            "Page 120",
        );
        index
    }

    #[tokio::test]
    async fn test_search_ranks_by_overlap() {
        let index = sample_index();
        let results = index
            .search("what are the symptoms of kidney disease", 3)
            .await
            .unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0].provenance, "Page 42");
        // Scores descend.
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_scores_normalized() {
        let index = sample_index();
        let results = index.search("kidney symptoms swelling", 3).await.unwrap();
        for r in &results {
            assert!(r.score > 0.0 && r.score <= 1.0);
        }
    }

    #[tokio::test]
    async fn test_no_match_returns_empty() {
        let index = sample_index();
        let results = index.search("quantum chromodynamics", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_query_returns_empty() {
        let index = sample_index();
        let results = index.search("", 3).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_k_limits_results() {
        let index = sample_index();
        let results = index.search("kidney", 1).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_from_jsonl() {
        let jsonl = r#"{"text": "Potassium levels above 5.5 are dangerous.", "provenance": "Page 90"}

{"text": "Creatinine measures kidney filtration.", "provenance": "Page 12"}"#;
        let index = LexicalPassageIndex::from_jsonl(jsonl).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_from_jsonl_bad_line_errors() {
        let jsonl = "{\"text\": \"ok\", \"provenance\": \"p1\"}\nnot json\n";
        let result = LexicalPassageIndex::from_jsonl(jsonl);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("line 2"));
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("What are the symptoms of CKD?");
        assert!(tokens.contains("symptoms"));
        assert!(tokens.contains("ckd"));
        assert!(!tokens.contains("what"));
        assert!(!tokens.contains("of"));
    }
}
