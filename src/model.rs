//! Core data model (spec §3). Value types only — no behavior that reaches
//! outside this module except the small, pure helpers that every caller
//! needs (content-type inference, snippet shaping).

use serde::Serialize;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The repository-scope selector of a request (spec §3 Scope, §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Repo(String),
    Repos(Vec<String>),
    All,
}

impl Scope {
    pub fn repos(&self) -> Vec<String> {
        match self {
            Scope::Repo(r) => vec![r.clone()],
            Scope::Repos(rs) => rs.clone(),
            Scope::All => vec![],
        }
    }

    /// Shape for `meta.scope` (spec §4.5): `{type, repos}`, omitting `repos`
    /// for the `all` case.
    pub fn to_meta_json(&self) -> serde_json::Value {
        match self {
            Scope::Repo(r) => serde_json::json!({ "type": "repo", "repos": [r] }),
            Scope::Repos(rs) => serde_json::json!({ "type": "repos", "repos": rs }),
            Scope::All => serde_json::json!({ "type": "all" }),
        }
    }
}

// ---------------------------------------------------------------------------
// Content type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Docs,
    All,
}

impl ContentType {
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw {
            None => Ok(ContentType::All),
            Some("code") => Ok(ContentType::Code),
            Some("docs") => Ok(ContentType::Docs),
            Some("all") => Ok(ContentType::All),
            Some(other) => Err(format!("invalid contentType '{other}'")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Docs => "docs",
            ContentType::All => "all",
        }
    }
}

/// Infer content type from a path when the payload omits `content_type`
/// (spec §3 Hit).
pub fn infer_content_type(path: &str) -> ContentType {
    let lower = path.to_lowercase();
    let doc_ext = [".md", ".mdx", ".rst", ".adoc", ".txt"];
    if doc_ext.iter().any(|ext| lower.ends_with(ext)) {
        return ContentType::Docs;
    }
    if lower.contains("/docs/") || lower.contains("/adr") {
        return ContentType::Docs;
    }
    if lower.ends_with("readme.md") {
        return ContentType::Docs;
    }
    ContentType::Code
}

// ---------------------------------------------------------------------------
// Hit / Result
// ---------------------------------------------------------------------------

/// A raw hit returned by the Vector Store Client (spec §3 Hit).
#[derive(Debug, Clone)]
pub struct Hit {
    pub score: f64,
    pub repo: String,
    pub path: String,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub text: String,
    pub content_type: ContentType,
}

impl Hit {
    pub fn from_payload(score: f64, payload: &serde_json::Value) -> Option<Self> {
        if !score.is_finite() {
            return None;
        }
        let repo = payload.get("repo")?.as_str()?.to_string();
        let path = payload.get("path")?.as_str()?.to_string();
        let start_line = payload
            .get("startLine")
            .or_else(|| payload.get("start_line"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let end_line = payload
            .get("endLine")
            .or_else(|| payload.get("end_line"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);
        let text = payload.get("text").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let content_type = payload
            .get("content_type")
            .and_then(|v| v.as_str())
            .and_then(|v| match v {
                "code" => Some(ContentType::Code),
                "docs" => Some(ContentType::Docs),
                _ => None,
            })
            .unwrap_or_else(|| infer_content_type(&path));

        Some(Hit { score, repo, path, start_line, end_line, text, content_type })
    }
}

/// A shaped search result (spec §3 Result).
#[derive(Debug, Clone, Serialize)]
pub struct ResultItem {
    pub repo: String,
    pub score: f64,
    pub path: String,
    #[serde(rename = "startLine")]
    pub start_line: Option<u32>,
    #[serde(rename = "endLine")]
    pub end_line: Option<u32>,
    pub snippet: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
}

impl From<Hit> for ResultItem {
    fn from(hit: Hit) -> Self {
        ResultItem {
            repo: hit.repo,
            score: hit.score,
            path: hit.path,
            start_line: hit.start_line,
            end_line: hit.end_line,
            snippet: shape_snippet(&hit.text),
            content_type: hit.content_type,
        }
    }
}

/// Collapse whitespace runs, trim, and cap at 300 chars (spec §3 Result,
/// invariant I2 in §8).
pub fn shape_snippet(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "(no snippet)".to_string();
    }
    let collapsed: String = {
        let mut out = String::with_capacity(raw.len());
        let mut last_was_space = false;
        for ch in raw.chars() {
            if ch.is_whitespace() {
                if !last_was_space {
                    out.push(' ');
                }
                last_was_space = true;
            } else {
                out.push(ch);
                last_was_space = false;
            }
        }
        out.trim().to_string()
    };
    if collapsed.is_empty() {
        return "(no snippet)".to_string();
    }
    if collapsed.chars().count() > 300 {
        let truncated: String = collapsed.chars().take(297).collect();
        format!("{truncated}…")
    } else {
        collapsed
    }
}

// ---------------------------------------------------------------------------
// Collection meta
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    Ok,
    Partial,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionMeta {
    pub name: String,
    #[serde(rename = "contentType")]
    pub content_type: ContentType,
    pub hits: usize,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
    pub status: CollectionStatus,
}

// ---------------------------------------------------------------------------
// File range / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileRange {
    pub repo: String,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub max_bytes: usize,
}

pub const MAX_LINE_SPAN: u32 = 199;
pub const DEFAULT_LINE_SPAN: u32 = 50;
pub const MAX_FILE_BYTES: usize = 1_000_000;
pub const DEFAULT_MAX_BYTES: usize = 200_000;

#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub path: String,
    #[serde(rename = "startLine")]
    pub start_line: u32,
    #[serde(rename = "endLine")]
    pub end_line: u32,
    #[serde(rename = "totalLines")]
    pub total_lines: Option<u64>,
    pub text: String,
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_collapses_whitespace() {
        assert_eq!(shape_snippet("a   b\n\tc"), "a b c");
    }

    #[test]
    fn snippet_empty_becomes_sentinel() {
        assert_eq!(shape_snippet(""), "(no snippet)");
        assert_eq!(shape_snippet("   \n  "), "(no snippet)");
    }

    #[test]
    fn snippet_truncates_long_text() {
        let long = "x".repeat(400);
        let shaped = shape_snippet(&long);
        assert_eq!(shaped.chars().count(), 298);
        assert!(shaped.ends_with('…'));
    }

    #[test]
    fn infer_docs_from_extension() {
        assert_eq!(infer_content_type("README.md"), ContentType::Docs);
        assert_eq!(infer_content_type("docs/guide.adoc"), ContentType::Docs);
        assert_eq!(infer_content_type("src/lib/docs/notes.txt"), ContentType::Docs);
    }

    #[test]
    fn infer_code_by_default() {
        assert_eq!(infer_content_type("src/main.rs"), ContentType::Code);
    }
}
