//! Retrieval Engine (spec §4.3). Fans out to the code and docs collections,
//! fuses with Reciprocal Rank Fusion, applies the diversity floor, and
//! enforces the partial-failure policy.

use std::sync::Arc;

use crate::config::Config;
use crate::error::CompassError;
use crate::model::{CollectionMeta, CollectionStatus, ContentType, Hit};
use crate::vector_store::{SearchFilter, VectorStoreClient};

/// One embedding vector per target collection, resolved by the caller
/// (Search Tool / RAG Tool) according to the Open Question decision in
/// SPEC_FULL.md §3.1: a single vector when contentType is code-only or
/// docs-only, or two independently-embedded vectors when contentType is
/// `all`.
pub enum QueryVectors {
    Single(Vec<f64>),
    PerCollection { code: Vec<f64>, docs: Vec<f64> },
}

impl QueryVectors {
    fn for_code(&self) -> &[f64] {
        match self {
            QueryVectors::Single(v) => v,
            QueryVectors::PerCollection { code, .. } => code,
        }
    }
    fn for_docs(&self) -> &[f64] {
        match self {
            QueryVectors::Single(v) => v,
            QueryVectors::PerCollection { docs, .. } => docs,
        }
    }
}

pub struct RetrievalOutcome {
    pub hits: Vec<Hit>,
    pub legacy_collection: String,
    pub collections: Vec<CollectionMeta>,
}

pub struct RetrievalEngine {
    store: Arc<VectorStoreClient>,
    config: Arc<Config>,
}

impl RetrievalEngine {
    pub fn new(store: Arc<VectorStoreClient>, config: Arc<Config>) -> Self {
        RetrievalEngine { store, config }
    }

    pub async fn retrieve(
        &self,
        vectors: &QueryVectors,
        top_k: usize,
        path_prefix: Option<&str>,
        repos: &[String],
        content_type: ContentType,
        strict: bool,
    ) -> Result<RetrievalOutcome, CompassError> {
        let legacy_collection = self.config.collection_code.clone();

        match content_type {
            ContentType::Code => {
                let filter = SearchFilter {
                    path_prefix: path_prefix.map(str::to_string),
                    repos: repos.to_vec(),
                    content_type: ContentType::Code,
                };
                let outcome = self
                    .store
                    .search(&self.config.collection_code, vectors.for_code(), top_k, &filter)
                    .await;
                if outcome.failed {
                    return Err(CompassError::QdrantUnavailable(
                        "code collection unavailable".to_string(),
                    ));
                }
                let mut hits = outcome.hits;
                hits.truncate(top_k);
                Ok(RetrievalOutcome {
                    hits,
                    legacy_collection,
                    collections: vec![CollectionMeta {
                        name: self.config.collection_code.clone(),
                        content_type: ContentType::Code,
                        hits: 0, // filled below
                        latency_ms: outcome.latency_ms,
                        status: CollectionStatus::Ok,
                    }],
                })
                .map(|mut o| {
                    o.collections[0].hits = o.hits.len();
                    o
                })
            }
            ContentType::Docs => {
                let filter = SearchFilter {
                    path_prefix: path_prefix.map(str::to_string),
                    repos: repos.to_vec(),
                    content_type: ContentType::Docs,
                };
                let outcome = self
                    .store
                    .search(&self.config.collection_docs, vectors.for_docs(), top_k, &filter)
                    .await;
                if outcome.failed {
                    return Err(CompassError::QdrantUnavailable(
                        "docs collection unavailable".to_string(),
                    ));
                }
                let mut hits = outcome.hits;
                hits.truncate(top_k);
                let n = hits.len();
                Ok(RetrievalOutcome {
                    hits,
                    legacy_collection,
                    collections: vec![CollectionMeta {
                        name: self.config.collection_docs.clone(),
                        content_type: ContentType::Docs,
                        hits: n,
                        latency_ms: outcome.latency_ms,
                        status: CollectionStatus::Ok,
                    }],
                })
            }
            ContentType::All => {
                let code_filter = SearchFilter {
                    path_prefix: path_prefix.map(str::to_string),
                    repos: repos.to_vec(),
                    content_type: ContentType::Code,
                };
                let docs_filter = SearchFilter {
                    path_prefix: path_prefix.map(str::to_string),
                    repos: repos.to_vec(),
                    content_type: ContentType::Docs,
                };

                // Fan out concurrently; wait for both regardless of order or
                // first failure (spec §4.3, §5).
                let (code_outcome, docs_outcome) = futures::join!(
                    self.store.search(
                        &self.config.collection_code,
                        vectors.for_code(),
                        top_k,
                        &code_filter
                    ),
                    self.store.search(
                        &self.config.collection_docs,
                        vectors.for_docs(),
                        top_k,
                        &docs_filter
                    )
                );

                self.fuse_dual(code_outcome, docs_outcome, top_k, strict, legacy_collection)
            }
        }
    }

    fn fuse_dual(
        &self,
        code: crate::vector_store::CollectionOutcome,
        docs: crate::vector_store::CollectionOutcome,
        top_k: usize,
        strict: bool,
        legacy_collection: String,
    ) -> Result<RetrievalOutcome, CompassError> {
        let both_failed = code.failed && docs.failed;
        let any_failed = code.failed || docs.failed;

        if both_failed {
            return Err(CompassError::QdrantUnavailable(
                "both code and docs collections are unavailable".to_string(),
            ));
        }
        if any_failed && strict {
            return Err(CompassError::QdrantUnavailable(
                "a required collection is unavailable (strict mode)".to_string(),
            ));
        }

        let fused = reciprocal_rank_fusion(&code.hits, &docs.hits, self.config.rrf_k);
        let diversity_floor = self.config.diversity_floor.min((top_k / 2) as u32);
        let final_hits = apply_diversity_floor(fused, diversity_floor as usize, top_k);

        // Two-pass status derivation (REDESIGN FLAGS: never mutate a status
        // in place after observing a sibling's outcome — collect outcomes
        // first, then derive).
        let code_status = classify_status(code.failed, docs.failed);
        let docs_status = classify_status(docs.failed, code.failed);

        let collections = vec![
            CollectionMeta {
                name: self.config.collection_code.clone(),
                content_type: ContentType::Code,
                hits: code.hits.len(),
                latency_ms: code.latency_ms,
                status: code_status,
            },
            CollectionMeta {
                name: self.config.collection_docs.clone(),
                content_type: ContentType::Docs,
                hits: docs.hits.len(),
                latency_ms: docs.latency_ms,
                status: docs_status,
            },
        ];

        Ok(RetrievalOutcome { hits: final_hits, legacy_collection, collections })
    }
}

fn classify_status(this_failed: bool, sibling_failed: bool) -> CollectionStatus {
    match (this_failed, sibling_failed) {
        (true, _) => CollectionStatus::Unavailable,
        (false, true) => CollectionStatus::Partial,
        (false, false) => CollectionStatus::Ok,
    }
}

/// Reciprocal Rank Fusion: score 1/(k+r) per list, summed across lists. Hits
/// appearing in both lists (same repo+path+startLine) are merged, keeping
/// the higher original score. Ties broken by list-origin order (code
/// before docs).
fn reciprocal_rank_fusion(code_hits: &[Hit], docs_hits: &[Hit], k: u32) -> Vec<(Hit, f64)> {
    use std::collections::HashMap;

    fn key(h: &Hit) -> (String, String, Option<u32>) {
        (h.repo.clone(), h.path.clone(), h.start_line)
    }

    let mut scores: HashMap<(String, String, Option<u32>), (Hit, f64, usize)> = HashMap::new();

    for (rank, hit) in code_hits.iter().enumerate() {
        let rrf = 1.0 / (k as f64 + (rank + 1) as f64);
        let entry = scores.entry(key(hit)).or_insert_with(|| (hit.clone(), 0.0, 0));
        entry.1 += rrf;
    }
    for (rank, hit) in docs_hits.iter().enumerate() {
        let rrf = 1.0 / (k as f64 + (rank + 1) as f64);
        let entry = scores.entry(key(hit)).or_insert_with(|| (hit.clone(), 0.0, 1));
        entry.1 += rrf;
    }

    let mut merged: Vec<(Hit, f64, usize)> = scores.into_values().collect();
    merged.sort_by(|a, b| {
        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.2.cmp(&b.2))
    });
    merged.into_iter().map(|(hit, score, _origin)| (hit, score)).collect()
}

/// Walk the RRF-ranked union; admit a hit immediately if its contentType
/// hasn't yet hit `floor`, otherwise defer it. After the first pass, fill
/// remaining slots from the deferred list in RRF order (spec §4.3).
fn apply_diversity_floor(ranked: Vec<(Hit, f64)>, floor: usize, top_k: usize) -> Vec<Hit> {
    let mut counts: std::collections::HashMap<&'static str, usize> =
        std::collections::HashMap::new();
    let mut admitted = Vec::with_capacity(top_k);
    let mut deferred = Vec::new();

    for (hit, _score) in ranked {
        let ct = hit.content_type.as_str();
        let count = counts.entry(ct).or_insert(0);
        if *count < floor {
            *count += 1;
            admitted.push(hit);
        } else {
            deferred.push(hit);
        }
        if admitted.len() >= top_k {
            break;
        }
    }

    if admitted.len() < top_k {
        for hit in deferred {
            if admitted.len() >= top_k {
                break;
            }
            admitted.push(hit);
        }
    }

    admitted.truncate(top_k);
    admitted
}
