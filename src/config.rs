//! Process-wide configuration (spec §3, §4.9, §6).
//!
//! Resolved once at startup from environment variables and never mutated
//! afterward — plain composition, no global/`lazy_static` state, so the
//! dispatcher and tools all receive the same `Arc<Config>` explicitly.

use std::env;
use std::path::PathBuf;

/// Search order for `.env`-style files, earliest-wins (never overwrites a
/// variable already present in the process environment). Mirrors the
/// "per-service local override, per-service default, repo-root local
/// override, repo-root default" order from spec §4.9.
const ENV_FILE_SEARCH_ORDER: &[&str] =
    &[".env.server.local", ".env.server", ".env.local", ".env"];

/// Load environment files in the fixed search order. Missing files are not
/// an error; a variable already set in the process environment is never
/// overwritten by a later file.
pub fn bootstrap_env() {
    for name in ENV_FILE_SEARCH_ORDER {
        let _ = dotenv::from_filename(name);
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub collection_code: String,
    pub collection_docs: String,
    pub qdrant_timeout_secs: u64,

    pub ollama_url: String,
    pub embedding_model_code: String,
    pub embedding_model_docs: String,
    pub llm_model: String,
    pub external_call_timeout_secs: u64,

    pub codebase_root: PathBuf,
    pub allow_global_scope: bool,

    pub http_mode: bool,
    pub http_host: String,
    pub http_port: u16,

    pub rrf_k: u32,
    pub diversity_floor: u32,

    /// Test-only mock payload for the Vector Store Client (spec §4.2, §6).
    pub qdrant_mock_response: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("CODEBASE_ROOT {0:?} does not exist or is not a directory")]
    BadCodebaseRoot(PathBuf),
    #[error("QDRANT_COLLECTION_CODE and QDRANT_COLLECTION_DOCS must differ")]
    CollectionNamesCollide,
}

impl Config {
    /// Build the configuration from the process environment. Call
    /// `bootstrap_env()` first if `.env`-style files should be honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let qdrant_url = env::var("QDRANT_URL")
            .unwrap_or_else(|_| "http://localhost:6333".to_string());
        let qdrant_api_key = env::var("QDRANT_API_KEY").ok();

        let (collection_code, collection_docs) = resolve_collection_names()?;
        if collection_code == collection_docs {
            return Err(ConfigError::CollectionNamesCollide);
        }

        let ollama_url =
            env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
        let embedding_model_code =
            env::var("EMBEDDING_MODEL_CODE").unwrap_or_else(|_| "nomic-embed-code".to_string());
        let embedding_model_docs =
            env::var("EMBEDDING_MODEL_DOCS").unwrap_or_else(|_| "nomic-embed-text".to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| "llama3.1".to_string());

        let codebase_root = env::var("CODEBASE_ROOT")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing("CODEBASE_ROOT"))?;
        if !codebase_root.is_dir() {
            return Err(ConfigError::BadCodebaseRoot(codebase_root));
        }

        let allow_global_scope = parse_bool_env("ALLOW_GLOBAL_SCOPE");

        let http_mode = env::var("MCP_SERVER_MODE").map(|v| v == "http").unwrap_or(false);
        let http_host =
            env::var("MCP_HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let http_port = resolve_port();

        let rrf_k = env::var("RRF_K")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(60);
        let diversity_floor = env::var("RRF_DIVERSITY_FLOOR")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1);

        let qdrant_mock_response = env::var("MCP_QDRANT_MOCK_RESPONSE")
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());

        Ok(Config {
            qdrant_url,
            qdrant_api_key,
            collection_code,
            collection_docs,
            qdrant_timeout_secs: 5,
            ollama_url,
            embedding_model_code,
            embedding_model_docs,
            llm_model,
            external_call_timeout_secs: 120,
            codebase_root: codebase_root
                .canonicalize()
                .map_err(|_| ConfigError::BadCodebaseRoot(codebase_root.clone()))?,
            allow_global_scope,
            http_mode,
            http_host,
            http_port,
            rrf_k,
            diversity_floor,
            qdrant_mock_response,
        })
    }
}

fn resolve_collection_names() -> Result<(String, String), ConfigError> {
    if let (Ok(code), Ok(docs)) =
        (env::var("QDRANT_COLLECTION_CODE"), env::var("QDRANT_COLLECTION_DOCS"))
    {
        return Ok((code, docs));
    }
    let base = env::var("QDRANT_COLLECTION_BASE").unwrap_or_else(|_| "codebase".to_string());
    Ok((format!("{base}__code"), format!("{base}__docs")))
}

fn parse_bool_env(name: &str) -> bool {
    env::var(name).map(|v| v == "true").unwrap_or(false)
}

/// Port precedence: explicit override, then `PORT`, then 3001. Non-finite or
/// non-positive values fall back to 3001.
fn resolve_port() -> u16 {
    let candidate = env::var("MCP_HTTP_PORT").or_else(|_| env::var("PORT")).ok();
    candidate
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0 && *v <= u16::MAX as u32)
        .map(|v| v as u16)
        .unwrap_or(3001)
}
