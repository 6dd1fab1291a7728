//! Evidence provider traits and test doubles.
//!
//! The passage index, the web search providers, and their result types.
//! Production adapters live in the composition root; `MockPassageSearch`
//! and `MockWebSearch` provide deterministic, invocation-counting doubles
//! for pipeline and agent tests.

use async_trait::async_trait;

use aftercare_core::error::Result;

/// A passage returned by the index with its similarity score.
#[derive(Clone, Debug)]
pub struct ScoredPassage {
    /// The passage text.
    pub text: String,
    /// Page/section reference within the source document.
    pub provenance: String,
    /// Normalized similarity score in [0.0, 1.0]; higher is more similar.
    pub score: f64,
}

/// A single web search hit.
#[derive(Clone, Debug)]
pub struct WebHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Provider-reported relevance in [0.0, 1.0].
    pub score: f64,
}

/// Ranked passage retrieval over the indexed reference corpus.
///
/// The vector similarity primitive itself is external; implementations
/// adapt it to this contract.
#[async_trait]
pub trait PassageSearch: Send + Sync {
    /// Return up to `k` passages ranked by descending score.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredPassage>>;
}

/// Live web search for information the static corpus cannot cover.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Return up to `max_results` ranked hits.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>>;
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use aftercare_core::error::AftercareError;

/// Deterministic passage index double that counts invocations.
#[derive(Default)]
pub struct MockPassageSearch {
    results: Mutex<Vec<ScoredPassage>>,
    calls: AtomicUsize,
    fail: bool,
}

impl MockPassageSearch {
    /// A mock returning the given passages on every call.
    pub fn with_results(results: Vec<ScoredPassage>) -> Self {
        Self {
            results: Mutex::new(results),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A mock that fails every call.
    pub fn failing() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of times `search` was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PassageSearch for MockPassageSearch {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<ScoredPassage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AftercareError::Retrieval("mock index offline".to_string()));
        }
        let results = self
            .results
            .lock()
            .map_err(|e| AftercareError::Retrieval(format!("mock lock poisoned: {}", e)))?;
        Ok(results.iter().take(k).cloned().collect())
    }
}

/// Deterministic web search double that counts invocations.
#[derive(Default)]
pub struct MockWebSearch {
    results: Mutex<Vec<WebHit>>,
    calls: AtomicUsize,
    fail: bool,
}

impl MockWebSearch {
    /// A mock returning the given hits on every call.
    pub fn with_results(results: Vec<WebHit>) -> Self {
        Self {
            results: Mutex::new(results),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A mock that fails every call.
    pub fn failing() -> Self {
        Self {
            results: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of times `search` was invoked (retries count individually).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    fn name(&self) -> &'static str {
        "mock-web"
    }

    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AftercareError::Retrieval(
                "mock web provider down".to_string(),
            ));
        }
        let results = self
            .results
            .lock()
            .map_err(|e| AftercareError::Retrieval(format!("mock lock poisoned: {}", e)))?;
        Ok(results.iter().take(max_results).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_passage_search_returns_k() {
        let mock = MockPassageSearch::with_results(vec![
            ScoredPassage {
                text: "a".to_string(),
                provenance: "Page 1".to_string(),
                score: 0.9,
            },
            ScoredPassage {
                text: "b".to_string(),
                provenance: "Page 2".to_string(),
                score: 0.8,
            },
        ]);
        let hits = mock.search("q", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_web_search_failure() {
        let mock = MockWebSearch::failing();
        assert!(mock.search("q", 3).await.is_err());
        assert_eq!(mock.call_count(), 1);
    }
}
