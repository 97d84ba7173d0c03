//! Embedding Service Client (spec §4.6). Turns a query string into a vector
//! via the external embedding endpoint — one HTTP call, no retry.

use serde::Deserialize;

use crate::error::CompassError;

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f64>>,
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    timeout: std::time::Duration,
    /// When set, honored instead of issuing a real HTTP call — offline test mode,
    /// same shape as the Vector Store Client's mock path.
    mock_vector: Option<Vec<f64>>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        EmbeddingClient {
            http: reqwest::Client::new(),
            base_url,
            timeout: std::time::Duration::from_secs(timeout_secs),
            mock_vector: None,
        }
    }

    pub fn with_mock(base_url: String, timeout_secs: u64, mock_vector: Vec<f64>) -> Self {
        EmbeddingClient {
            http: reqwest::Client::new(),
            base_url,
            timeout: std::time::Duration::from_secs(timeout_secs),
            mock_vector: Some(mock_vector),
        }
    }

    /// Embed a single query string with `model`. Expects exactly one vector
    /// back; any other shape is classified `EMBEDDING_INVALID` rather than
    /// `EMBEDDING_FAILED`, since the call itself succeeded.
    pub async fn embed(&self, model: &str, query: &str) -> Result<Vec<f64>, CompassError> {
        if let Some(vector) = &self.mock_vector {
            return Ok(vector.clone());
        }

        let url = format!("{}/api/embed", self.base_url);
        let body = serde_json::json!({ "model": model, "input": [query] });

        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompassError::EmbeddingFailed(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(CompassError::EmbeddingFailed(format!(
                "embedding service returned status {}",
                resp.status()
            )));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| CompassError::EmbeddingInvalid(format!("malformed response body: {e}")))?;

        match parsed.embeddings.len() {
            1 => {
                let vector = parsed.embeddings.into_iter().next().unwrap();
                if vector.is_empty() || vector.iter().any(|v| !v.is_finite()) {
                    return Err(CompassError::EmbeddingInvalid(
                        "embedding vector is empty or contains non-finite values".to_string(),
                    ));
                }
                Ok(vector)
            }
            n => Err(CompassError::EmbeddingInvalid(format!(
                "expected exactly one embedding, got {n}"
            ))),
        }
    }

    /// Embed the same query with the code model and, independently, with the
    /// docs model — used for `contentType: all` (SPEC_FULL.md §3.1).
    pub async fn embed_both(
        &self,
        code_model: &str,
        docs_model: &str,
        query: &str,
    ) -> Result<(Vec<f64>, Vec<f64>), CompassError> {
        let (code, docs) = futures::join!(self.embed(code_model, query), self.embed(docs_model, query));
        Ok((code?, docs?))
    }
}
