//! Chat Service Client (spec §4.8). Sends the assembled RAG prompt to the
//! external chat model and returns its answer text — one HTTP call, no
//! streaming, no retry. The 120s timeout matches the Embedding Service and
//! Vector Store's "no partial-failure patience" posture: a hung collaborator
//! fails the whole `ask_code` call.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CompassError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    timeout: std::time::Duration,
    /// When set, honored instead of issuing a real HTTP call — offline test mode.
    mock_response: Option<String>,
    /// Tracks how many times `complete` actually ran, real or mocked — the
    /// evidence-first guardrail asserts this stays at zero for empty evidence sets.
    invocations: Arc<AtomicUsize>,
}

impl ChatClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        ChatClient {
            http: reqwest::Client::new(),
            base_url,
            timeout: std::time::Duration::from_secs(timeout_secs),
            mock_response: None,
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_mock(base_url: String, timeout_secs: u64, mock_response: String) -> Self {
        ChatClient {
            http: reqwest::Client::new(),
            base_url,
            timeout: std::time::Duration::from_secs(timeout_secs),
            mock_response: Some(mock_response),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompassError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if let Some(mock) = &self.mock_response {
            return Ok(mock.clone());
        }

        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        let resp = self
            .http
            .post(&url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompassError::ChatFailed(format!("request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(CompassError::ChatFailed(format!(
                "chat service returned status {}",
                resp.status()
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| CompassError::ChatFailed(format!("malformed response body: {e}")))?;

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes_with_lowercase_role() {
        let msg = ChatMessage { role: Role::System, content: "hi".to_string() };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "system");
    }

    #[tokio::test]
    async fn complete_returns_ok_for_empty_content() {
        let client = ChatClient::with_mock("http://mock".to_string(), 5, String::new());
        let answer = client.complete("m", &[]).await.unwrap();
        assert_eq!(answer, "", "an empty chat response is a valid success, not an error");
    }
}
