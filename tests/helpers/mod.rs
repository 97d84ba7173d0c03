//! Test harness for end-to-end MCP tool tests.
//!
//! Builds the full tool stack against a mocked Vector Store/Embedding/Chat
//! trio and a temp-dir codebase root, then dispatches JSON-RPC requests via
//! `Dispatcher::dispatch()` directly — no subprocess, no real network calls.

pub mod fixtures;

use std::sync::Arc;

use code_compass::chat::ChatClient;
use code_compass::config::Config;
use code_compass::embedding::EmbeddingClient;
use code_compass::protocol::Dispatcher;
use code_compass::retrieval::RetrievalEngine;
use code_compass::tools::ask::AskTool;
use code_compass::tools::file_reader::FileReaderTool;
use code_compass::tools::search::SearchTool;
use code_compass::vector_store::VectorStoreClient;
use serde_json::Value;
use tempfile::TempDir;

pub struct TestHarness {
    pub dispatcher: Dispatcher,
    pub chat: Arc<ChatClient>,
    _temp_dir: TempDir,
}

/// Builder-style configuration for a harness instance.
#[derive(Default)]
pub struct HarnessOptions {
    pub mock_response: Option<Value>,
    pub allow_global_scope: bool,
}

impl TestHarness {
    /// Build a harness whose codebase root is an empty temp dir and whose
    /// Vector Store always returns `mock_response` (see `VectorStoreClient`'s
    /// mock-payload shape: `{ "<collection>": [{score, payload}, ...] }`).
    pub fn new(opts: HarnessOptions) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");

        let config = Arc::new(Config {
            qdrant_url: "http://mock".into(),
            qdrant_api_key: None,
            collection_code: "codebase__code".into(),
            collection_docs: "codebase__docs".into(),
            qdrant_timeout_secs: 5,
            ollama_url: "http://mock".into(),
            embedding_model_code: "mock-code".into(),
            embedding_model_docs: "mock-docs".into(),
            llm_model: "mock-llm".into(),
            external_call_timeout_secs: 5,
            codebase_root: temp_dir.path().canonicalize().unwrap(),
            allow_global_scope: opts.allow_global_scope,
            http_mode: false,
            http_host: "0.0.0.0".into(),
            http_port: 3001,
            rrf_k: 60,
            diversity_floor: 1,
            qdrant_mock_response: opts.mock_response,
        });

        let vector_store = Arc::new(VectorStoreClient::new(
            config.qdrant_url.clone(),
            None,
            config.qdrant_timeout_secs,
            config.qdrant_mock_response.clone(),
        ));
        let embedding = Arc::new(EmbeddingClient::with_mock("http://mock".into(), 5, vec![0.1, 0.2]));
        let chat = Arc::new(ChatClient::with_mock("http://mock".into(), 5, "mocked answer".to_string()));

        let retrieval = Arc::new(RetrievalEngine::new(vector_store, config.clone()));
        let search = Arc::new(SearchTool::new(retrieval, config.clone()));
        let file_reader = Arc::new(FileReaderTool::new(config.clone()));
        let ask = Arc::new(AskTool::new(
            embedding,
            search.clone(),
            file_reader.clone(),
            chat.clone(),
            config,
        ));

        let dispatcher = Dispatcher::new(search, file_reader, ask);

        TestHarness { dispatcher, chat, _temp_dir: temp_dir }
    }

    pub fn codebase_root(&self) -> &std::path::Path {
        self._temp_dir.path()
    }

    /// Call a tool through the full JSON-RPC `tools/call` path and return
    /// the parsed tool output plus whether the call was flagged `isError`.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> (Value, bool) {
        let msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        });
        let resp = self.dispatcher.dispatch(&msg, false).await.expect("expected a response");
        let result = &resp["result"];
        let is_error = result["isError"].as_bool().unwrap_or(false);
        let text = result["content"][0]["text"].as_str().unwrap_or("");
        let parsed: Value = serde_json::from_str(text).unwrap_or(Value::Null);
        (parsed, is_error)
    }
}
