//! RAG Tool (spec §4.7): embed the question, search, enrich evidences from
//! disk, and either synthesize a grounded answer locally or call the chat
//! service — always behind the evidence-first guardrail.

use std::sync::Arc;
use std::time::Instant;

use crate::chat::{ChatClient, ChatMessage, Role};
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::error::CompassError;
use crate::model::{ContentType, ResultItem, Scope};
use crate::retrieval::QueryVectors;
use crate::scope::resolve_scope;
use crate::tools::file_reader::FileReaderTool;
use crate::tools::search::SearchTool;
use crate::tools::{
    clamp_top_k, parse_content_type, parse_strict, validate_path_prefix, validate_query,
};

const DEFAULT_TOP_K: u32 = 5;
const DEFAULT_MIN_SCORE: f64 = 0.6;
const ENRICH_CAP_PER_REPO_MULTI_SCOPE: usize = 2;
const ZERO_EVIDENCE_SENTINEL: &str = "Sem evidência suficiente para responder com confiança.";
const EMPTY_CHAT_SENTINEL: &str = "(sem resposta)";

pub struct AskTool {
    embedding: Arc<EmbeddingClient>,
    search: Arc<SearchTool>,
    file_reader: Arc<FileReaderTool>,
    chat: Arc<ChatClient>,
    config: Arc<Config>,
}

impl AskTool {
    pub fn new(
        embedding: Arc<EmbeddingClient>,
        search: Arc<SearchTool>,
        file_reader: Arc<FileReaderTool>,
        chat: Arc<ChatClient>,
        config: Arc<Config>,
    ) -> Self {
        AskTool { embedding, search, file_reader, chat, config }
    }

    pub async fn ask_code(&self, input: &serde_json::Value) -> Result<serde_json::Value, CompassError> {
        let started = Instant::now();

        let scope = resolve_scope(
            input.get("scope"),
            input.get("repo").and_then(|v| v.as_str()),
            &self.config,
        )?;
        let query = validate_query(input.get("query").and_then(|v| v.as_str()))?;
        let top_k = clamp_top_k(input.get("topK"), DEFAULT_TOP_K)?;
        let path_prefix = validate_path_prefix(input.get("pathPrefix").and_then(|v| v.as_str()))?;
        let language = input.get("language").and_then(|v| v.as_str()).map(str::to_string);
        let min_score = parse_min_score(input.get("minScore"))?;
        let llm_model = input
            .get("llmModel")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.llm_model.clone());
        let grounded = input.get("grounded").and_then(|v| v.as_bool()).unwrap_or(false);
        let content_type = parse_content_type(input.get("contentType"))?;
        let strict = parse_strict(input.get("strict"));

        let vectors = self.embed_question(content_type, &query).await?;

        let outcome = self
            .search
            .run(&scope, top_k, path_prefix.as_deref(), &vectors, content_type, strict)
            .await?;

        let total_matches = outcome.hits.len();

        let mut results: Vec<ResultItem> = outcome
            .hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .filter(|hit| language.as_deref().map(|lang| path_matches_language(&hit.path, lang)).unwrap_or(true))
            .map(ResultItem::from)
            .collect();
        results.truncate(top_k as usize);

        let evidences = self.enrich(results, &scope).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        let mut meta = serde_json::json!({
            "scope": scope.to_meta_json(),
            "minScore": min_score,
            "llmModel": llm_model,
            "contentType": content_type,
            "strict": strict,
            "collection": outcome.legacy_collection,
            "collections": outcome.collections,
            "totalMatches": total_matches,
            "contextsUsed": evidences.len(),
            "elapsedMs": elapsed_ms,
        });
        if let Scope::Repo(repo) = &scope {
            meta["repo"] = serde_json::Value::String(repo.clone());
        }
        if let Some(prefix) = &path_prefix {
            meta["pathPrefix"] = serde_json::Value::String(prefix.clone());
        }
        if let Some(lang) = &language {
            meta["language"] = serde_json::Value::String(lang.clone());
        }

        if evidences.is_empty() {
            return Ok(serde_json::json!({
                "answer": ZERO_EVIDENCE_SENTINEL,
                "evidences": Vec::<ResultItem>::new(),
                "meta": meta,
            }));
        }

        let answer = if grounded {
            synthesize_grounded_answer(&evidences)
        } else {
            self.compose_and_ask(&query, &evidences, &llm_model).await?
        };

        Ok(serde_json::json!({ "answer": answer, "evidences": evidences, "meta": meta }))
    }

    /// Resolve the question's embedding vector(s). For `code`/`docs`, a
    /// single model is used; for `all`, the question is embedded once per
    /// collection's model (SPEC_FULL.md §3.1 — two models may not share a
    /// vector dimensionality, so a single shared vector cannot be assumed
    /// safe).
    async fn embed_question(&self, content_type: ContentType, query: &str) -> Result<QueryVectors, CompassError> {
        match content_type {
            ContentType::Code => {
                Ok(QueryVectors::Single(self.embedding.embed(&self.config.embedding_model_code, query).await?))
            }
            ContentType::Docs => {
                Ok(QueryVectors::Single(self.embedding.embed(&self.config.embedding_model_docs, query).await?))
            }
            ContentType::All => {
                let (code, docs) = self
                    .embedding
                    .embed_both(&self.config.embedding_model_code, &self.config.embedding_model_docs, query)
                    .await?;
                Ok(QueryVectors::PerCollection { code, docs })
            }
        }
    }

    /// Re-read each surviving result from disk through the File Reader Tool.
    /// A read failure is swallowed — the unenriched result is kept rather
    /// than promoted to a user-visible error (spec §4.7 step 5, §7).
    async fn enrich(&self, results: Vec<ResultItem>, scope: &Scope) -> Vec<ResultItem> {
        let cap_enabled = !matches!(scope, Scope::Repo(_));
        let mut per_repo_enriched: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
        let mut evidences = Vec::with_capacity(results.len());

        for mut result in results {
            let count = per_repo_enriched.entry(result.repo.clone()).or_insert(0);
            let may_enrich = !cap_enabled || *count < ENRICH_CAP_PER_REPO_MULTI_SCOPE;

            if may_enrich {
                let start_line = result.start_line.unwrap_or(1);
                let end_line = result.end_line.unwrap_or(start_line + 50);
                let input = serde_json::json!({
                    "repo": result.repo,
                    "path": result.path,
                    "startLine": start_line,
                    "endLine": end_line,
                });
                if let Ok(file_response) = self.file_reader.open_file(&input) {
                    result.start_line = Some(file_response.start_line);
                    result.end_line = Some(file_response.end_line);
                    result.snippet = file_response.text.trim().to_string();
                    *count += 1;
                }
            }

            evidences.push(result);
        }

        evidences
    }

    async fn compose_and_ask(
        &self,
        query: &str,
        evidences: &[ResultItem],
        llm_model: &str,
    ) -> Result<String, CompassError> {
        let system = ChatMessage {
            role: Role::System,
            content: "Responda estritamente com base nos trechos de código fornecidos. \
                Não invente conteúdo, APIs ou comportamento que não esteja presente nos trechos."
                .to_string(),
        };
        let user = ChatMessage { role: Role::User, content: build_user_prompt(query, evidences) };

        let answer = self.chat.complete(llm_model, &[system, user]).await?;
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            Ok(EMPTY_CHAT_SENTINEL.to_string())
        } else {
            Ok(trimmed.to_string())
        }
    }
}

fn parse_min_score(raw: Option<&serde_json::Value>) -> Result<f64, CompassError> {
    match raw {
        None => Ok(DEFAULT_MIN_SCORE),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .ok_or_else(|| CompassError::bad_request("minScore must be a finite number")),
    }
}

/// Extension mapping from spec §6. A value starting with `.` is used as a
/// literal extension suffix; any other unrecognized value maps to `.<value>`.
fn language_extensions(language: &str) -> Vec<String> {
    match language {
        "ts" => vec![".ts".to_string(), ".tsx".to_string()],
        "tsx" => vec![".tsx".to_string()],
        "js" => vec![".js".to_string(), ".jsx".to_string()],
        "jsx" => vec![".jsx".to_string()],
        "py" => vec![".py".to_string()],
        "md" => vec![".md".to_string()],
        "json" => vec![".json".to_string()],
        "yaml" => vec![".yaml".to_string(), ".yml".to_string()],
        "yml" => vec![".yml".to_string(), ".yaml".to_string()],
        "txt" => vec![".txt".to_string()],
        other if other.starts_with('.') => vec![other.to_string()],
        other => vec![format!(".{other}")],
    }
}

fn path_matches_language(path: &str, language: &str) -> bool {
    let lower = path.to_lowercase();
    language_extensions(language).iter().any(|ext| lower.ends_with(ext.as_str()))
}

fn synthesize_grounded_answer(evidences: &[ResultItem]) -> String {
    let mut out = String::new();
    for evidence in evidences {
        let start = evidence.start_line.unwrap_or(1);
        let end = evidence.end_line.unwrap_or(start);
        out.push_str(&format!("- {} (lines {start}-{end})\n", evidence.path));
        out.push_str("```\n");
        out.push_str(&evidence.snippet);
        out.push_str("\n```\n");
    }
    out.trim_end().to_string()
}

fn build_user_prompt(query: &str, evidences: &[ResultItem]) -> String {
    let mut out = String::new();
    for (i, evidence) in evidences.iter().enumerate() {
        let start = evidence.start_line.unwrap_or(1);
        let end = evidence.end_line.unwrap_or(start);
        out.push_str(&format!("### Arquivo {}: {} (linhas {start}-{end})\n", i + 1, evidence.path));
        out.push_str("```\n");
        out.push_str(&evidence.snippet);
        out.push_str("\n```\n\n");
    }
    out.push_str(&format!("Pergunta: {query}\n\nResposta:"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_extensions_literal_dot_passthrough() {
        assert_eq!(language_extensions(".rs"), vec![".rs".to_string()]);
    }

    #[test]
    fn language_extensions_unrecognized_falls_back() {
        assert_eq!(language_extensions("rs"), vec![".rs".to_string()]);
    }

    #[test]
    fn path_matches_language_checks_suffix() {
        assert!(path_matches_language("src/App.tsx", "ts"));
        assert!(!path_matches_language("src/App.py", "ts"));
    }

    #[test]
    fn grounded_answer_lists_each_evidence() {
        let evidences = vec![ResultItem {
            repo: "r".to_string(),
            score: 0.9,
            path: "a.rs".to_string(),
            start_line: Some(1),
            end_line: Some(2),
            snippet: "fn a() {}".to_string(),
            content_type: ContentType::Code,
        }];
        let answer = synthesize_grounded_answer(&evidences);
        assert!(answer.contains("- a.rs (lines 1-2)"));
        assert!(answer.contains("fn a() {}"));
    }
}
