//! HTTP JSON-RPC transport (spec §4.9): a single `POST /mcp` endpoint.
//! No session negotiation, no server-push — just request in, response out.
//! The legacy `{id, tool, input}` envelope is STDIO-only and is rejected here.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::protocol::Dispatcher;

pub async fn run(dispatcher: Arc<Dispatcher>, host: &str, port: u16) -> std::io::Result<()> {
    let app = Router::new()
        .route("/mcp", post(handle_post))
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "HTTP transport listening");
    axum::serve(listener, app).await
}

async fn handle_post(State(dispatcher): State<Arc<Dispatcher>>, body: String) -> Response {
    let parsed: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => return json_response(StatusCode::BAD_REQUEST, &parse_error_body()),
    };

    if !is_jsonrpc_shape(&parsed) {
        return json_response(StatusCode::BAD_REQUEST, &invalid_request_body());
    }

    match dispatcher.dispatch(&parsed, false).await {
        Some(response) => json_response(StatusCode::OK, &response),
        None => Response::builder().status(StatusCode::NO_CONTENT).body(Body::empty()).unwrap(),
    }
}

fn is_jsonrpc_shape(value: &Value) -> bool {
    value.get("jsonrpc").and_then(|v| v.as_str()) == Some("2.0")
        && value.get("method").and_then(|v| v.as_str()).is_some()
}

fn parse_error_body() -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32700, "message": "Parse error" }
    })
}

fn invalid_request_body() -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32600, "message": "Invalid Request" }
    })
}

fn json_response(status: StatusCode, body: &Value) -> Response {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap_or_default()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jsonrpc_shape_requires_version_and_method() {
        assert!(is_jsonrpc_shape(&serde_json::json!({ "jsonrpc": "2.0", "method": "ping" })));
        assert!(!is_jsonrpc_shape(&serde_json::json!({ "method": "ping" })));
        assert!(!is_jsonrpc_shape(&serde_json::json!({ "jsonrpc": "2.0" })));
    }
}
