//! Vector Store Client (spec §4.2). A pure HTTP client for one similarity
//! search call against one named collection — no fusion, no retry.
//!
//! The mock path is threaded through as an explicit alternative
//! implementation (an enum variant) rather than a global override read at
//! call time, per the REDESIGN FLAGS note on process-wide mock injection.

use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::model::{ContentType, Hit};

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub path_prefix: Option<String>,
    pub repos: Vec<String>,
    pub content_type: ContentType,
}

impl SearchFilter {
    fn matches(&self, payload: &serde_json::Value) -> bool {
        if let Some(prefix) = &self.path_prefix {
            let path = payload.get("path").and_then(|v| v.as_str()).unwrap_or("");
            if !path.contains(prefix.as_str()) {
                return false;
            }
        }
        if !self.repos.is_empty() {
            let repo = payload.get("repo").and_then(|v| v.as_str()).unwrap_or("");
            if !self.repos.iter().any(|r| r == repo) {
                return false;
            }
        }
        let payload_ct = payload.get("content_type").and_then(|v| v.as_str());
        let wanted = self.content_type.as_str();
        if payload_ct != Some(wanted) {
            // fall back to inferred content type when payload omits it
            let path = payload.get("path").and_then(|v| v.as_str()).unwrap_or("");
            if crate::model::infer_content_type(path).as_str() != wanted {
                return false;
            }
        }
        true
    }

    fn to_qdrant_filter(&self) -> serde_json::Value {
        let mut must = Vec::new();
        if let Some(prefix) = &self.path_prefix {
            must.push(serde_json::json!({ "key": "path", "match": { "text": prefix } }));
        }
        match self.repos.len() {
            0 => {}
            1 => must.push(
                serde_json::json!({ "key": "repo", "match": { "value": self.repos[0] } }),
            ),
            _ => {
                let should: Vec<_> = self
                    .repos
                    .iter()
                    .map(|r| serde_json::json!({ "key": "repo", "match": { "value": r } }))
                    .collect();
                must.push(serde_json::json!({ "should": should }));
            }
        }
        must.push(
            serde_json::json!({ "key": "content_type", "match": { "value": self.content_type.as_str() } }),
        );
        serde_json::json!({ "must": must })
    }
}

/// Outcome of one collection-level search call.
pub struct CollectionOutcome {
    pub hits: Vec<Hit>,
    pub latency_ms: u64,
    pub failed: bool,
}

#[derive(Deserialize)]
struct QdrantSearchResponse {
    result: Vec<QdrantPoint>,
}

#[derive(Deserialize)]
struct QdrantPoint {
    score: f64,
    payload: serde_json::Value,
}

pub struct VectorStoreClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    /// When set, honored instead of issuing a real HTTP call — offline test mode.
    mock_response: Option<serde_json::Value>,
}

impl VectorStoreClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout_secs: u64,
        mock_response: Option<serde_json::Value>,
    ) -> Self {
        VectorStoreClient {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
            mock_response,
        }
    }

    /// Perform one similarity search against `collection`, returning hits
    /// truncated to `top_k` plus observed latency. Never retries; on
    /// transport failure or non-2xx response, returns a `failed` outcome
    /// carrying zero hits and the latency observed before failure.
    pub async fn search(
        &self,
        collection: &str,
        vector: &[f64],
        top_k: usize,
        filter: &SearchFilter,
    ) -> CollectionOutcome {
        let start = Instant::now();

        if let Some(mock) = &self.mock_response {
            let hits = self.apply_mock(mock, collection, top_k, filter);
            return CollectionOutcome { hits, latency_ms: elapsed_ms(start), failed: false };
        }

        let result = self.do_search(collection, vector, top_k, filter).await;
        let latency_ms = elapsed_ms(start);
        match result {
            Ok(hits) => CollectionOutcome { hits, latency_ms, failed: false },
            Err(e) => {
                tracing::warn!(collection, error = %e, "vector store search failed");
                CollectionOutcome { hits: Vec::new(), latency_ms, failed: true }
            }
        }
    }

    async fn do_search(
        &self,
        collection: &str,
        vector: &[f64],
        top_k: usize,
        filter: &SearchFilter,
    ) -> anyhow::Result<Vec<Hit>> {
        let url = format!("{}/collections/{}/points/search", self.base_url, collection);
        let body = serde_json::json!({
            "vector": vector,
            "limit": top_k,
            "with_payload": true,
            "with_vector": false,
            "filter": filter.to_qdrant_filter(),
        });

        let mut req = self.http.post(&url).timeout(self.timeout).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("api-key", key);
        }
        let resp = req.send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("vector store returned status {}", resp.status());
        }
        let parsed: QdrantSearchResponse = resp.json().await?;
        let hits = parsed
            .result
            .into_iter()
            .filter_map(|p| Hit::from_payload(p.score, &p.payload))
            .collect();
        Ok(hits)
    }

    /// Apply the mock payload, client-side filtering by path-prefix, repo,
    /// and content-type, matching the semantics of `do_search` (spec §4.2).
    fn apply_mock(
        &self,
        mock: &serde_json::Value,
        collection: &str,
        top_k: usize,
        filter: &SearchFilter,
    ) -> Vec<Hit> {
        let entries = mock
            .get(collection)
            .or_else(|| mock.as_array().map(|_| mock))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let array = entries.as_array().cloned().unwrap_or_default();

        array
            .into_iter()
            .filter(|entry| {
                entry
                    .get("payload")
                    .map(|p| filter.matches(p))
                    .unwrap_or(false)
            })
            .filter_map(|entry| {
                let score = entry.get("score").and_then(|v| v.as_f64())?;
                let payload = entry.get("payload")?;
                Hit::from_payload(score, payload)
            })
            .take(top_k)
            .collect()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_applies_content_type_filter() {
        let mock = serde_json::json!({
            "codebase__code": [
                { "score": 0.9, "payload": { "repo": "r", "path": "a.rs", "text": "fn a() {}", "content_type": "code" } },
                { "score": 0.8, "payload": { "repo": "r", "path": "b.md", "text": "docs", "content_type": "docs" } }
            ]
        });
        let client = VectorStoreClient::new("http://x".into(), None, 5, Some(mock));
        let filter =
            SearchFilter { path_prefix: None, repos: vec![], content_type: ContentType::Code };
        let outcome = client.search("codebase__code", &[0.1], 10, &filter).await;
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].path, "a.rs");
    }

    #[tokio::test]
    async fn mock_applies_repo_filter() {
        let mock = serde_json::json!({
            "codebase__code": [
                { "score": 0.9, "payload": { "repo": "acme", "path": "a.rs", "text": "x", "content_type": "code" } },
                { "score": 0.8, "payload": { "repo": "other", "path": "b.rs", "text": "y", "content_type": "code" } }
            ]
        });
        let client = VectorStoreClient::new("http://x".into(), None, 5, Some(mock));
        let filter = SearchFilter {
            path_prefix: None,
            repos: vec!["acme".to_string()],
            content_type: ContentType::Code,
        };
        let outcome = client.search("codebase__code", &[0.1], 10, &filter).await;
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].repo, "acme");
    }
}
