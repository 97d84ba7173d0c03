//! Search Tool (spec §4.5): validate inputs, invoke retrieval, shape
//! results, and enforce the per-repo guard for global-scope queries.

use std::sync::Arc;

use crate::config::Config;
use crate::error::CompassError;
use crate::model::{CollectionMeta, ContentType, Hit, ResultItem, Scope};
use crate::retrieval::{QueryVectors, RetrievalEngine};
use crate::scope::resolve_scope;
use crate::tools::{
    clamp_top_k, parse_content_type, parse_strict, validate_path_prefix, validate_query,
    validate_vector,
};

/// `all`-scope queries never let a single repository dominate the result
/// window (spec §4.5, invariant 3 in §8).
const MAX_PER_REPO_IN_GLOBAL_SCOPE: usize = 3;

const DEFAULT_TOP_K: u32 = 10;

/// How far beyond `topK` an `all`-scope fetch reaches into the store's true
/// ranking before the per-repo guard is applied. Without oversampling, the
/// guard can only shrink an already-topK-sized window, so a single repo
/// dominating the top ranks would silently starve the result set below
/// `topK` even when enough diverse hits exist further down.
const GLOBAL_SCOPE_FETCH_MULTIPLIER: usize = 4;

/// The shared core of a search: retrieval plus the global-scope guard, with
/// raw hits rather than shaped JSON. Used by both the public `search_code`
/// entry point and the RAG Tool, which needs the same guard but supplies
/// its own (possibly per-collection) embedding.
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub legacy_collection: String,
    pub collections: Vec<CollectionMeta>,
}

pub struct SearchTool {
    retrieval: Arc<RetrievalEngine>,
    config: Arc<Config>,
}

impl SearchTool {
    pub fn new(retrieval: Arc<RetrievalEngine>, config: Arc<Config>) -> Self {
        SearchTool { retrieval, config }
    }

    pub fn default_top_k() -> u32 {
        DEFAULT_TOP_K
    }

    pub async fn search_code(&self, input: &serde_json::Value) -> Result<serde_json::Value, CompassError> {
        let scope = resolve_scope(
            input.get("scope"),
            input.get("repo").and_then(|v| v.as_str()),
            &self.config,
        )?;
        let _query = validate_query(input.get("query").and_then(|v| v.as_str()))?;
        let top_k = clamp_top_k(input.get("topK"), DEFAULT_TOP_K)?;
        let path_prefix = validate_path_prefix(input.get("pathPrefix").and_then(|v| v.as_str()))?;
        let vector = validate_vector(input.get("vector"))?;
        let content_type = parse_content_type(input.get("contentType"))?;
        let strict = parse_strict(input.get("strict"));

        let vectors = QueryVectors::Single(vector);
        let outcome = self
            .run(&scope, top_k, path_prefix.as_deref(), &vectors, content_type, strict)
            .await?;

        let results: Vec<ResultItem> = outcome.hits.into_iter().map(ResultItem::from).collect();

        let mut meta = serde_json::json!({
            "scope": scope.to_meta_json(),
            "topK": top_k,
            "contentType": content_type,
            "strict": strict,
            "collection": outcome.legacy_collection,
            "collections": outcome.collections,
        });
        if let Scope::Repo(repo) = &scope {
            meta["repo"] = serde_json::Value::String(repo.clone());
        }
        if let Some(prefix) = &path_prefix {
            meta["pathPrefix"] = serde_json::Value::String(prefix.clone());
        }

        Ok(serde_json::json!({ "results": results, "meta": meta }))
    }

    /// Retrieval plus the global-scope per-repo guard, with no JSON shaping.
    /// The RAG Tool calls this directly so it can supply per-collection
    /// embeddings for `contentType: all` (SPEC_FULL.md §3.1) while still
    /// going through the same guard the public tool enforces.
    pub async fn run(
        &self,
        scope: &Scope,
        top_k: u32,
        path_prefix: Option<&str>,
        vectors: &QueryVectors,
        content_type: ContentType,
        strict: bool,
    ) -> Result<SearchOutcome, CompassError> {
        let repos = scope.repos();
        let is_global = *scope == Scope::All;
        let fetch_top_k = if is_global {
            (top_k as usize).saturating_mul(GLOBAL_SCOPE_FETCH_MULTIPLIER)
        } else {
            top_k as usize
        };
        let outcome = self
            .retrieval
            .retrieve(vectors, fetch_top_k, path_prefix, &repos, content_type, strict)
            .await?;

        let hits = if is_global {
            apply_global_scope_guard(outcome.hits, top_k as usize)
        } else {
            outcome.hits
        };

        Ok(SearchOutcome {
            hits,
            legacy_collection: outcome.legacy_collection,
            collections: outcome.collections,
        })
    }
}

/// Walk merged results in order, admitting a hit only if its repo has
/// appeared fewer than `MAX_PER_REPO_IN_GLOBAL_SCOPE` times so far.
fn apply_global_scope_guard(hits: Vec<Hit>, top_k: usize) -> Vec<Hit> {
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut admitted = Vec::with_capacity(top_k);
    for hit in hits {
        let count = counts.entry(hit.repo.clone()).or_insert(0);
        if *count < MAX_PER_REPO_IN_GLOBAL_SCOPE {
            *count += 1;
            admitted.push(hit);
        }
        if admitted.len() >= top_k {
            break;
        }
    }
    admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(repo: &str, path: &str) -> Hit {
        Hit {
            score: 0.9,
            repo: repo.to_string(),
            path: path.to_string(),
            start_line: None,
            end_line: None,
            text: "x".to_string(),
            content_type: ContentType::Code,
        }
    }

    #[test]
    fn global_scope_guard_caps_per_repo() {
        let hits: Vec<_> = (0..10).map(|i| hit("hot-repo", &format!("f{i}.rs"))).collect();
        let admitted = apply_global_scope_guard(hits, 10);
        assert_eq!(admitted.len(), MAX_PER_REPO_IN_GLOBAL_SCOPE);
    }
}
