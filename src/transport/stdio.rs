//! STDIO transport: autodetects length-prefixed vs NDJSON framing from the
//! first non-empty input, then locks to that framing for the process
//! lifetime (spec §4.9). Legacy `{id, tool, input}` envelopes are accepted
//! on this transport only.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

use crate::protocol::Dispatcher;
use crate::transport::Framing;

pub async fn run(dispatcher: Arc<Dispatcher>) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    let mut first_line = String::new();
    loop {
        first_line.clear();
        let n = reader.read_line(&mut first_line).await?;
        if n == 0 {
            return Ok(());
        }
        if !first_line.trim().is_empty() {
            break;
        }
    }

    let framing = if is_content_length_header(&first_line) {
        Framing::LengthPrefixed
    } else {
        Framing::Ndjson
    };

    let mut pending = Some(first_line);
    loop {
        let body = match read_message(&mut reader, framing, pending.take()).await? {
            Some(bytes) => bytes,
            None => return Ok(()),
        };

        match serde_json::from_slice::<Value>(&body) {
            Ok(msg) => {
                let legacy_allowed = framing == Framing::Ndjson;
                if let Some(response) = dispatcher.dispatch(&msg, legacy_allowed).await {
                    write_message(&mut stdout, framing, &response).await?;
                }
            }
            Err(_) => {
                let err = serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": null,
                    "error": { "code": -32700, "message": "Parse error" }
                });
                write_message(&mut stdout, framing, &err).await?;
            }
        }
    }
}

fn is_content_length_header(line: &str) -> bool {
    line.trim_start().to_ascii_lowercase().starts_with("content-length:")
}

/// Read one message per the locked framing. `pending_first_line` carries the
/// line already consumed during framing detection, if any.
async fn read_message(
    reader: &mut BufReader<tokio::io::Stdin>,
    framing: Framing,
    pending_first_line: Option<String>,
) -> std::io::Result<Option<Vec<u8>>> {
    match framing {
        Framing::Ndjson => {
            let line = match pending_first_line {
                Some(l) => l,
                None => {
                    let mut line = String::new();
                    loop {
                        let n = reader.read_line(&mut line).await?;
                        if n == 0 {
                            return Ok(None);
                        }
                        if !line.trim().is_empty() {
                            break;
                        }
                        line.clear();
                    }
                    line
                }
            };
            Ok(Some(line.trim().as_bytes().to_vec()))
        }
        Framing::LengthPrefixed => {
            let mut content_length: Option<usize> = None;
            let mut line = String::new();
            let mut first = pending_first_line;

            loop {
                let current = if let Some(pending) = first.take() {
                    pending
                } else {
                    line.clear();
                    let n = reader.read_line(&mut line).await?;
                    if n == 0 {
                        return Ok(None);
                    }
                    line.clone()
                };

                let trimmed = current.trim();
                if trimmed.is_empty() {
                    break;
                }
                if let Some(value) = trimmed
                    .strip_prefix("Content-Length:")
                    .or_else(|| trimmed.strip_prefix("content-length:"))
                {
                    content_length = value.trim().parse::<usize>().ok();
                }
            }

            let len = content_length.unwrap_or(0);
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await?;
            Ok(Some(body))
        }
    }
}

async fn write_message(stdout: &mut tokio::io::Stdout, framing: Framing, value: &Value) -> std::io::Result<()> {
    let body = serde_json::to_string(value).unwrap_or_default();
    match framing {
        Framing::Ndjson => {
            stdout.write_all(body.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        Framing::LengthPrefixed => {
            let header = format!("Content-Length: {}\r\n\r\n", body.as_bytes().len());
            stdout.write_all(header.as_bytes()).await?;
            stdout.write_all(body.as_bytes()).await?;
        }
    }
    stdout.flush().await
}
