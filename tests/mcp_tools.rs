//! End-to-end tests for the three MCP tools, dispatched through
//! `Dispatcher::dispatch()` against a mocked Vector Store/Embedding/Chat
//! trio. Scenario numbers (S1, S2, ...) trace back to the tool-level
//! invariants each test demonstrates.

mod helpers;

use helpers::{fixtures, HarnessOptions, TestHarness};
use serde_json::json;

// ---------------------------------------------------------------------------
// S1 — search_code, single repo, code only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s1_search_single_repo_code_only() {
    let mock = json!({
        "codebase__code": [
            {
                "score": 0.88,
                "payload": {
                    "repo": "acme-repo",
                    "path": "apps/mcp-server/src/main.ts",
                    "start_line": 1,
                    "end_line": 30,
                    "text": "async function bootstrap() { /* ... */ }",
                    "content_type": "code"
                }
            }
        ]
    });
    let harness = TestHarness::new(HarnessOptions { mock_response: Some(mock), ..Default::default() });

    let (output, is_error) = harness
        .call_tool(
            "search_code",
            json!({
                "scope": { "type": "repo", "repos": ["acme-repo"] },
                "query": "bootstrap",
                "topK": 10,
                "pathPrefix": "apps/mcp-server/",
                "vector": [0.1, 0.2],
                "contentType": "code"
            }),
        )
        .await;

    assert!(!is_error, "search_code returned an error: {output}");
    assert_eq!(output["meta"]["repo"], "acme-repo");
    assert_eq!(output["meta"]["scope"], json!({ "type": "repo", "repos": ["acme-repo"] }));
    assert_eq!(output["meta"]["collections"].as_array().unwrap().len(), 1);
    assert_eq!(output["results"][0]["path"], "apps/mcp-server/src/main.ts");
    assert_eq!(output["results"][0]["snippet"], "async function bootstrap() { /* ... */ }");
    assert_eq!(output["results"][0]["contentType"], "code");
}

// ---------------------------------------------------------------------------
// S2 — open_file, valid range
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s2_open_file_valid_range() {
    let harness = TestHarness::new(HarnessOptions::default());
    fixtures::write_file(harness.codebase_root(), "single-repo", "safe.txt", "a\nb\nc\nd\n");

    let (output, is_error) = harness
        .call_tool("open_file", json!({ "repo": "single-repo", "path": "safe.txt", "startLine": 2, "endLine": 3 }))
        .await;

    assert!(!is_error, "open_file returned an error: {output}");
    assert_eq!(output["path"], "safe.txt");
    assert_eq!(output["startLine"], 2);
    assert_eq!(output["endLine"], 3);
    assert_eq!(output["text"], "b\nc\n");
    assert_eq!(output["truncated"], false);
    assert_eq!(output["totalLines"], 4);
}

// ---------------------------------------------------------------------------
// S3 — traversal blocked
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s3_traversal_blocked() {
    let harness = TestHarness::new(HarnessOptions::default());
    fixtures::write_file(harness.codebase_root(), "single-repo", "safe.txt", "a\nb\n");

    let (output, is_error) = harness
        .call_tool("open_file", json!({ "repo": "single-repo", "path": "../../etc/passwd" }))
        .await;

    assert!(is_error);
    assert_eq!(output, serde_json::Value::Null, "error text is a plain message, not JSON");
}

// ---------------------------------------------------------------------------
// S4 — global scope gated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s4_global_scope_forbidden_when_disabled() {
    let harness =
        TestHarness::new(HarnessOptions { allow_global_scope: false, ..Default::default() });

    let (_output, is_error) = harness
        .call_tool(
            "search_code",
            json!({ "scope": { "type": "all" }, "query": "x", "vector": [0.1], "contentType": "code" }),
        )
        .await;

    assert!(is_error, "expected FORBIDDEN when global scope is disabled");
}

#[tokio::test]
async fn s4_global_scope_guard_caps_per_repo_when_enabled() {
    let mut hits = Vec::new();
    for i in 0..10 {
        hits.push(json!({
            "score": 0.9 - (i as f64) * 0.01,
            "payload": {
                "repo": "hot-repo",
                "path": format!("f{i}.rs"),
                "text": "x",
                "content_type": "code"
            }
        }));
    }
    let mock = json!({ "codebase__code": hits });
    let harness = TestHarness::new(HarnessOptions {
        mock_response: Some(mock),
        allow_global_scope: true,
    });

    let (output, is_error) = harness
        .call_tool(
            "search_code",
            json!({ "scope": { "type": "all" }, "query": "x", "topK": 10, "vector": [0.1], "contentType": "code" }),
        )
        .await;

    assert!(!is_error, "search_code returned an error: {output}");
    let results = output["results"].as_array().unwrap();
    assert_eq!(results.len(), 3, "no single repo may exceed 3 hits in an all-scope result set");
}

#[tokio::test]
async fn s4_global_scope_guard_backfills_beyond_first_fetch_window() {
    // The top-ranked 10 hits all share one repo; 10 more diverse hits (one
    // per repo) rank just below them. A topK=10 fetch that stopped at the
    // first 10 store-ranked hits would see only the dominant repo and,
    // after the per-repo cap, return just 3 results — short of topK even
    // though 10 diverse hits exist a little further down the true ranking.
    let mut hits = Vec::new();
    for i in 0..10 {
        hits.push(json!({
            "score": 0.9 - (i as f64) * 0.01,
            "payload": { "repo": "hot-repo", "path": format!("f{i}.rs"), "text": "x", "content_type": "code" }
        }));
    }
    for i in 0..10 {
        hits.push(json!({
            "score": 0.5 - (i as f64) * 0.01,
            "payload": { "repo": format!("repo{i}"), "path": "f.rs", "text": "y", "content_type": "code" }
        }));
    }
    let mock = json!({ "codebase__code": hits });
    let harness = TestHarness::new(HarnessOptions { mock_response: Some(mock), allow_global_scope: true });

    let (output, is_error) = harness
        .call_tool(
            "search_code",
            json!({ "scope": { "type": "all" }, "query": "x", "topK": 10, "vector": [0.1], "contentType": "code" }),
        )
        .await;

    assert!(!is_error, "search_code returned an error: {output}");
    let results = output["results"].as_array().unwrap();
    assert_eq!(results.len(), 10, "diverse hits beyond the first window must backfill up to topK");
}

// ---------------------------------------------------------------------------
// S6 — RAG zero-evidence guardrail
// ---------------------------------------------------------------------------

#[tokio::test]
async fn s6_ask_code_zero_evidence_guardrail() {
    let mock = json!({
        "codebase__code": [
            { "score": 0.2, "payload": { "repo": "acme-repo", "path": "a.rs", "text": "fn a() {}", "content_type": "code" } }
        ],
        "codebase__docs": []
    });
    let harness = TestHarness::new(HarnessOptions { mock_response: Some(mock), ..Default::default() });

    let (output, is_error) = harness
        .call_tool(
            "ask_code",
            json!({
                "scope": { "type": "repo", "repos": ["acme-repo"] },
                "query": "how does bootstrap work?",
                "minScore": 0.9
            }),
        )
        .await;

    assert!(!is_error, "ask_code returned an error: {output}");
    assert_eq!(output["evidences"].as_array().unwrap().len(), 0);
    assert_eq!(output["meta"]["contextsUsed"], 0);
    assert_eq!(output["answer"], "Sem evidência suficiente para responder com confiança.");
    assert_eq!(harness.chat.invocation_count(), 0, "chat service must not be called with zero evidence");
}
