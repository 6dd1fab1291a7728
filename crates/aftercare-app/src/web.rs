//! Outbound web search adapters.
//!
//! Two providers back the retrieval pipeline's fallback stage: a keyed
//! search API (Tavily) as primary and the keyless DuckDuckGo instant
//! answer API as secondary. Both are best-effort; the pipeline owns
//! timeouts and retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use aftercare_core::error::{AftercareError, Result};
use aftercare_retrieval::providers::{WebHit, WebSearch};

/// Keyed primary web search over the Tavily search API.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilySearch {
    pub fn new(api_key: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AftercareError::Retrieval(format!("http client init: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            endpoint: "https://api.tavily.com/search".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

#[async_trait]
impl WebSearch for TavilySearch {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AftercareError::Retrieval(format!("tavily request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AftercareError::Retrieval(format!("tavily status: {}", e)))?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AftercareError::Retrieval(format!("tavily response parse: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| WebHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
                score: r.score,
            })
            .collect())
    }
}

/// Keyless secondary provider over the DuckDuckGo instant answer API.
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AftercareError::Retrieval(format!("http client init: {}", e)))?;
        Ok(Self {
            client,
            endpoint: "https://api.duckduckgo.com/".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DdgResponse {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

#[derive(Debug, Deserialize)]
struct DdgTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| AftercareError::Retrieval(format!("duckduckgo request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AftercareError::Retrieval(format!("duckduckgo status: {}", e)))?;

        let parsed: DdgResponse = response
            .json()
            .await
            .map_err(|e| AftercareError::Retrieval(format!("duckduckgo response parse: {}", e)))?;

        let mut hits = Vec::new();
        if !parsed.abstract_text.is_empty() {
            hits.push(WebHit {
                title: query.to_string(),
                url: parsed.abstract_url,
                snippet: parsed.abstract_text,
                score: 1.0,
            });
        }
        for topic in parsed.related_topics {
            if hits.len() >= max_results {
                break;
            }
            if topic.text.is_empty() || topic.first_url.is_empty() {
                continue;
            }
            // Rank-derived score; the API itself is unscored.
            let score = 1.0 / (hits.len() as f64 + 2.0);
            hits.push(WebHit {
                title: topic.text.clone(),
                url: topic.first_url,
                snippet: topic.text,
                score,
            });
        }
        hits.truncate(max_results);
        Ok(hits)
    }
}
