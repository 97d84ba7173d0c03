//! File Reader Tool (spec §4.6): a bounded, line-ranged text read inside the
//! sandbox. Streams byte-for-byte so a NUL byte or a byte-budget overflow is
//! caught without ever buffering more of the file than the caller asked for.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use crate::config::Config;
use crate::error::CompassError;
use crate::model::{FileResponse, DEFAULT_LINE_SPAN, DEFAULT_MAX_BYTES, MAX_FILE_BYTES, MAX_LINE_SPAN};
use crate::sandbox::resolve_and_classify;

pub struct FileReaderTool {
    config: Arc<Config>,
}

impl FileReaderTool {
    pub fn new(config: Arc<Config>) -> Self {
        FileReaderTool { config }
    }

    pub fn open_file(&self, input: &serde_json::Value) -> Result<FileResponse, CompassError> {
        let repo = input
            .get("repo")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompassError::bad_request("repo is required"))?;
        let path = input
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompassError::bad_request("path is required"))?;

        let start_line = parse_line_field(input.get("startLine"), 1)?;
        let mut end_line = parse_line_field(input.get("endLine"), start_line + DEFAULT_LINE_SPAN)?;
        if end_line < start_line {
            return Err(CompassError::bad_request("endLine must be >= startLine"));
        }
        let max_end = start_line.saturating_add(MAX_LINE_SPAN);
        if end_line > max_end {
            end_line = max_end;
        }
        let max_bytes = parse_max_bytes(input.get("maxBytes"))?;

        let file_path = resolve_and_classify(&self.config.codebase_root, repo, path)?;
        self.read_range(path, &file_path, start_line, end_line, max_bytes)
    }

    fn read_range(
        &self,
        display_path: &str,
        file_path: &std::path::Path,
        start_line: u32,
        end_line: u32,
        max_bytes: usize,
    ) -> Result<FileResponse, CompassError> {
        let file = File::open(file_path)
            .map_err(|e| CompassError::Internal(format!("failed to open file: {e}")))?;
        let mut reader = BufReader::new(file);

        let mut text = String::new();
        let mut bytes_used = 0usize;
        let mut truncated = false;
        let mut line_no: u64 = 0;
        let mut buf = Vec::new();
        let start_line = start_line as u64;
        let end_line = end_line as u64;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| CompassError::Internal(format!("failed to read file: {e}")))?;
            if n == 0 {
                break;
            }
            line_no += 1;

            if buf.contains(&0u8) {
                return Err(CompassError::UnsupportedMedia("file contains binary content".to_string()));
            }

            if line_no >= start_line && line_no <= end_line {
                if bytes_used + buf.len() > max_bytes {
                    let remaining = max_bytes.saturating_sub(bytes_used);
                    let slice = &buf[..remaining.min(buf.len())];
                    text.push_str(&lossy_prefix(slice));
                    truncated = true;
                    break;
                }
                let line_str = std::str::from_utf8(&buf).map_err(|_| {
                    CompassError::UnsupportedMedia("file is not valid UTF-8 text".to_string())
                })?;
                text.push_str(line_str);
                bytes_used += buf.len();
            } else if line_no > end_line {
                // Past the requested window: keep scanning (without buffering
                // text) purely to discover EOF and the total line count.
            }
        }

        let total_lines = if truncated {
            None
        } else {
            let mut total = line_no;
            loop {
                buf.clear();
                let n = reader
                    .read_until(b'\n', &mut buf)
                    .map_err(|e| CompassError::Internal(format!("failed to read file: {e}")))?;
                if n == 0 {
                    break;
                }
                if buf.contains(&0u8) {
                    return Err(CompassError::UnsupportedMedia(
                        "file contains binary content".to_string(),
                    ));
                }
                total += 1;
            }
            Some(total)
        };

        Ok(FileResponse {
            path: display_path.to_string(),
            start_line: start_line as u32,
            end_line: end_line as u32,
            total_lines,
            text,
            truncated,
        })
    }
}

/// Take the longest valid-UTF-8 prefix of a byte slice, dropping a
/// partially-cut multi-byte sequence at the end.
fn lossy_prefix(slice: &[u8]) -> String {
    let mut end = slice.len();
    while end > 0 {
        if let Ok(s) = std::str::from_utf8(&slice[..end]) {
            return s.to_string();
        }
        end -= 1;
    }
    String::new()
}

fn parse_line_field(raw: Option<&serde_json::Value>, default: u32) -> Result<u32, CompassError> {
    match raw {
        None => Ok(default),
        Some(v) => {
            let n = v
                .as_i64()
                .ok_or_else(|| CompassError::bad_request("line fields must be integers"))?;
            if n < 1 {
                return Err(CompassError::bad_request("line fields must be >= 1"));
            }
            Ok(n as u32)
        }
    }
}

fn parse_max_bytes(raw: Option<&serde_json::Value>) -> Result<usize, CompassError> {
    match raw {
        None => Ok(DEFAULT_MAX_BYTES),
        Some(v) => {
            let n = v
                .as_i64()
                .ok_or_else(|| CompassError::bad_request("maxBytes must be an integer"))?;
            if n < 1 {
                return Err(CompassError::bad_request("maxBytes must be >= 1"));
            }
            Ok((n as usize).min(MAX_FILE_BYTES))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup(content: &str) -> (tempfile::TempDir, Arc<Config>) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("single-repo")).unwrap();
        fs::write(dir.path().join("single-repo/safe.txt"), content).unwrap();
        let config = Arc::new(Config {
            qdrant_url: "http://x".into(),
            qdrant_api_key: None,
            collection_code: "c".into(),
            collection_docs: "d".into(),
            qdrant_timeout_secs: 5,
            ollama_url: "http://x".into(),
            embedding_model_code: "m".into(),
            embedding_model_docs: "m".into(),
            llm_model: "m".into(),
            external_call_timeout_secs: 120,
            codebase_root: dir.path().canonicalize().unwrap(),
            allow_global_scope: false,
            http_mode: false,
            http_host: "0.0.0.0".into(),
            http_port: 3001,
            rrf_k: 60,
            diversity_floor: 1,
            qdrant_mock_response: None,
        });
        (dir, config)
    }

    #[test]
    fn reads_valid_range() {
        let (_dir, config) = setup("a\nb\nc\nd\n");
        let tool = FileReaderTool::new(config);
        let input = serde_json::json!({ "repo": "single-repo", "path": "safe.txt", "startLine": 2, "endLine": 3 });
        let resp = tool.open_file(&input).unwrap();
        assert_eq!(resp.text, "b\nc\n");
        assert_eq!(resp.total_lines, Some(4));
        assert!(!resp.truncated);
    }

    #[test]
    fn rejects_inverted_range() {
        let (_dir, config) = setup("a\nb\n");
        let tool = FileReaderTool::new(config);
        let input = serde_json::json!({ "repo": "single-repo", "path": "safe.txt", "startLine": 3, "endLine": 1 });
        let err = tool.open_file(&input).unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn truncates_on_byte_budget() {
        let (_dir, config) = setup("aaaaaaaaaa\nbbbbbbbbbb\n");
        let tool = FileReaderTool::new(config);
        let input = serde_json::json!({ "repo": "single-repo", "path": "safe.txt", "startLine": 1, "endLine": 2, "maxBytes": 5 });
        let resp = tool.open_file(&input).unwrap();
        assert!(resp.truncated);
        assert!(resp.total_lines.is_none());
        assert_eq!(resp.text.len(), 5);
    }

    #[test]
    fn end_line_clamped_to_max_span() {
        let (_dir, config) = setup("a\n");
        let tool = FileReaderTool::new(config);
        let input = serde_json::json!({ "repo": "single-repo", "path": "safe.txt", "startLine": 1, "endLine": 5000 });
        let resp = tool.open_file(&input).unwrap();
        assert_eq!(resp.end_line, 1 + MAX_LINE_SPAN);
    }
}
