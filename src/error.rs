//! Error taxonomy shared by every tool, the JSON-RPC dispatcher, and the
//! legacy envelope. A single enum keeps the mapping from Rust error to
//! wire-level `{code, message}` in one place instead of scattering string
//! literals through the tool implementations.

use thiserror::Error;

/// Classified error returned by any tool or transport-layer validation step.
///
/// Each variant maps to exactly one of the codes in spec §7. `INTERNAL`
/// never leaks the underlying cause in its message — only in `tracing::error!`.
#[derive(Debug, Error)]
pub enum CompassError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    UnsupportedMedia(String),

    #[error("{0}")]
    EmbeddingFailed(String),

    #[error("{0}")]
    EmbeddingInvalid(String),

    #[error("{0}")]
    ChatFailed(String),

    #[error("{0}")]
    QdrantUnavailable(String),

    #[error("internal error")]
    Internal(String),
}

impl CompassError {
    /// The wire-level code string used by both JSON-RPC tool results and the
    /// legacy `{ok:false, error:{code,message}}` envelope.
    pub fn code(&self) -> &'static str {
        match self {
            CompassError::BadRequest(_) => "BAD_REQUEST",
            CompassError::Forbidden(_) => "FORBIDDEN",
            CompassError::NotFound(_) => "NOT_FOUND",
            CompassError::UnsupportedMedia(_) => "UNSUPPORTED_MEDIA",
            CompassError::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            CompassError::EmbeddingInvalid(_) => "EMBEDDING_INVALID",
            CompassError::ChatFailed(_) => "CHAT_FAILED",
            CompassError::QdrantUnavailable(_) => "QDRANT_UNAVAILABLE",
            CompassError::Internal(_) => "INTERNAL",
        }
    }

    /// The user-visible message. `Internal` always returns a fixed message —
    /// never the wrapped cause — per the "never leaks internal stack details" rule.
    pub fn user_message(&self) -> String {
        match self {
            CompassError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        CompassError::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        CompassError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CompassError::NotFound(msg.into())
    }

    /// Serialize as the JSON-RPC tool-result shape: a non-error result with
    /// `isError: true` and a single text content item.
    pub fn to_tool_result(&self) -> serde_json::Value {
        serde_json::json!({
            "content": [{ "type": "text", "text": self.user_message() }],
            "isError": true,
            "error": { "code": self.code(), "message": self.user_message() }
        })
    }

    /// Serialize as the legacy envelope's error object.
    pub fn to_legacy_error(&self) -> serde_json::Value {
        serde_json::json!({ "code": self.code(), "message": self.user_message() })
    }
}

pub type Result<T> = std::result::Result<T, CompassError>;
