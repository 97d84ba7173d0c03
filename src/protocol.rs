//! Protocol Dispatcher (spec §4.8): decode one JSON message, route it to a
//! tool, and shape exactly one response value (or none, for notifications).
//!
//! Two wire shapes share this dispatcher: JSON-RPC 2.0 (`tools/list`,
//! `tools/call`, `initialize`, …) on every transport, and a legacy
//! `{id, tool, input}` envelope accepted only over STDIO/NDJSON.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::tools::ask::AskTool;
use crate::tools::file_reader::FileReaderTool;
use crate::tools::search::SearchTool;

const JSONRPC_VERSION: &str = "2.0";
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

pub struct Dispatcher {
    search: Arc<SearchTool>,
    file_reader: Arc<FileReaderTool>,
    ask: Arc<AskTool>,
}

impl Dispatcher {
    pub fn new(search: Arc<SearchTool>, file_reader: Arc<FileReaderTool>, ask: Arc<AskTool>) -> Self {
        Dispatcher { search, file_reader, ask }
    }

    /// Route one decoded message. Returns `None` only for JSON-RPC
    /// notifications (`initialized`, or no `id` at all).
    pub async fn dispatch(&self, msg: &Value, legacy_allowed: bool) -> Option<Value> {
        if legacy_allowed && is_legacy_envelope(msg) {
            return Some(self.handle_legacy(msg).await);
        }
        self.handle_jsonrpc(msg).await
    }

    async fn handle_jsonrpc(&self, msg: &Value) -> Option<Value> {
        let method = msg.get("method").and_then(|v| v.as_str()).unwrap_or("");
        let id = msg.get("id").cloned();

        if id.is_none() || method == "initialized" || method.starts_with("notifications/") {
            return None;
        }

        let response = match method {
            "initialize" => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": {
                    "protocolVersion": "2025-06-18",
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": "code-compass", "version": env!("CARGO_PKG_VERSION") },
                    "instructions": "Code Compass — retrieve verifiable evidence from indexed source repositories. \
                        Use search_code to find matching snippets, open_file to read a bounded line range, \
                        and ask_code for a grounded, evidence-backed answer."
                }
            }),
            "tools/list" => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": { "tools": tool_definitions() }
            }),
            "tools/call" => {
                let name = msg["params"]["name"].as_str();
                match name {
                    None => json!({
                        "jsonrpc": JSONRPC_VERSION,
                        "id": id,
                        "error": { "code": INVALID_PARAMS, "message": "params.name is required" }
                    }),
                    Some(name) => {
                        let arguments =
                            msg["params"].get("arguments").cloned().unwrap_or(json!({}));
                        let result = self.call_tool(name, &arguments).await;
                        match result {
                            Ok(value) => json!({
                                "jsonrpc": JSONRPC_VERSION,
                                "id": id,
                                "result": {
                                    "content": [{ "type": "text", "text": value.to_string() }],
                                    "isError": false
                                }
                            }),
                            Err(ToolCallError::Unknown) => json!({
                                "jsonrpc": JSONRPC_VERSION,
                                "id": id,
                                "error": { "code": INVALID_PARAMS, "message": format!("unknown tool '{name}'") }
                            }),
                            Err(ToolCallError::Compass(err)) => json!({
                                "jsonrpc": JSONRPC_VERSION,
                                "id": id,
                                "result": err.to_tool_result()
                            }),
                        }
                    }
                }
            }
            _ => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": { "code": METHOD_NOT_FOUND, "message": "Method not found" }
            }),
        };

        Some(response)
    }

    async fn handle_legacy(&self, msg: &Value) -> Value {
        let id = match msg.get("id") {
            Some(v) if v.is_string() => v.clone(),
            _ => Value::String("unknown".to_string()),
        };

        let tool = match msg.get("tool").and_then(|v| v.as_str()) {
            Some(t) => t,
            None => {
                return json!({
                    "id": id,
                    "ok": false,
                    "error": { "code": "BAD_REQUEST", "message": "tool is required" }
                })
            }
        };

        let input = msg.get("input").cloned().unwrap_or(json!({}));
        match self.call_tool(tool, &input).await {
            Ok(output) => json!({ "id": id, "ok": true, "output": output }),
            Err(ToolCallError::Unknown) => json!({
                "id": id,
                "ok": false,
                "error": { "code": "BAD_REQUEST", "message": format!("unknown tool '{tool}'") }
            }),
            Err(ToolCallError::Compass(err)) => json!({
                "id": id,
                "ok": false,
                "error": err.to_legacy_error()
            }),
        }
    }

    async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value, ToolCallError> {
        match name {
            "search_code" => self.search.search_code(arguments).await.map_err(ToolCallError::Compass),
            "open_file" => self
                .file_reader
                .open_file(arguments)
                .map(|resp| serde_json::to_value(resp).unwrap_or(json!({})))
                .map_err(ToolCallError::Compass),
            "ask_code" => self.ask.ask_code(arguments).await.map_err(ToolCallError::Compass),
            _ => Err(ToolCallError::Unknown),
        }
    }
}

enum ToolCallError {
    Unknown,
    Compass(crate::error::CompassError),
}

fn is_legacy_envelope(msg: &Value) -> bool {
    msg.get("jsonrpc").is_none() && msg.get("method").is_none() && msg.get("tool").is_some()
}

/// JSON Schemas for the three tools, including a `oneOf` over the scope
/// variants. `serde_json::Value`'s default map is key-sorted, so repeated
/// calls serialize to identical bytes — the byte-stability spec §4.8 asks
/// clients to be able to rely on.
fn tool_definitions() -> Value {
    let scope_schema = json!({
        "oneOf": [
            {
                "type": "object",
                "properties": {
                    "type": { "const": "repo" },
                    "repos": { "type": "array", "items": { "type": "string" }, "minItems": 1, "maxItems": 1 }
                },
                "required": ["type", "repos"]
            },
            {
                "type": "object",
                "properties": {
                    "type": { "const": "repos" },
                    "repos": { "type": "array", "items": { "type": "string" }, "minItems": 1, "maxItems": 10 }
                },
                "required": ["type", "repos"]
            },
            {
                "type": "object",
                "properties": { "type": { "const": "all" } },
                "required": ["type"]
            }
        ]
    });

    json!([
        {
            "name": "search_code",
            "description": "Semantic search over indexed source repositories, fusing code and documentation matches.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "scope": scope_schema,
                    "query": { "type": "string", "description": "Search text, 1..500 characters" },
                    "topK": { "type": "integer", "description": "Result count, clamped 1..20" },
                    "pathPrefix": { "type": "string", "description": "Restrict results to paths containing this substring" },
                    "vector": { "type": "array", "items": { "type": "number" }, "description": "Precomputed query embedding" },
                    "contentType": { "type": "string", "enum": ["code", "docs", "all"], "default": "all" },
                    "strict": { "type": "boolean", "default": false }
                },
                "required": ["scope", "query"]
            }
        },
        {
            "name": "open_file",
            "description": "Read a bounded line range of a file inside one indexed repository.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "repo": { "type": "string" },
                    "path": { "type": "string" },
                    "startLine": { "type": "integer", "minimum": 1 },
                    "endLine": { "type": "integer", "minimum": 1 },
                    "maxBytes": { "type": "integer", "minimum": 1 }
                },
                "required": ["repo", "path"]
            }
        },
        {
            "name": "ask_code",
            "description": "Retrieval-augmented question answering over indexed repositories, grounded in retrieved evidence.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "scope": scope_schema,
                    "query": { "type": "string", "description": "Question text, 1..500 characters" },
                    "topK": { "type": "integer", "description": "Evidence count, clamped 1..20" },
                    "pathPrefix": { "type": "string" },
                    "language": { "type": "string", "description": "Restrict evidence to a source language (e.g. ts, py, md)" },
                    "minScore": { "type": "number", "default": 0.6 },
                    "llmModel": { "type": "string" },
                    "grounded": { "type": "boolean", "default": false, "description": "Synthesize a deterministic, non-LLM answer" },
                    "contentType": { "type": "string", "enum": ["code", "docs", "all"], "default": "all" },
                    "strict": { "type": "boolean", "default": false }
                },
                "required": ["scope", "query"]
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definitions_are_byte_stable() {
        let a = serde_json::to_string(&tool_definitions()).unwrap();
        let b = serde_json::to_string(&tool_definitions()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn legacy_envelope_detection() {
        assert!(is_legacy_envelope(&json!({ "id": "1", "tool": "search_code", "input": {} })));
        assert!(!is_legacy_envelope(&json!({ "jsonrpc": "2.0", "method": "ping", "id": 1 })));
    }
}
