//! Per-snapshot vector index with budgeted ingestion.
//!
//! Each snapshot key maps to its own named collection in a
//! [`VectorStore`]. Ingestion re-splits fragments into embedding-safe
//! sub-fragments, stops at whichever of the sub-fragment ceiling or the
//! wall-clock deadline is reached first, skips ids that are already
//! stored, and embeds the rest in one batch. Items the embedding service
//! returns nothing for are dropped.
//!
//! Queries convert the store's cosine distance into a clamped similarity:
//! `similarity = max(0, 1 - distance)`.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk::split_for_embedding;
use crate::embedding::{embed_one, EmbeddingService};
use crate::models::{Fragment, FragmentMeta, RetrievedItem};
use crate::store::{IndexedRecord, VectorStore};

/// Ingestion budgets and query formatting.
#[derive(Debug, Clone)]
pub struct IndexParams {
    pub collection_prefix: String,
    /// Ceiling on sub-fragments considered per ingest call.
    pub max_subfragments: usize,
    /// Wall-clock budget for preparing sub-fragments.
    pub max_embed_time: Duration,
    /// Longest sub-fragment, in characters.
    pub max_embed_chars: usize,
    /// Longest preview returned from a query, in characters.
    pub preview_chars: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            collection_prefix: "firstfix".to_string(),
            max_subfragments: 120,
            max_embed_time: Duration::from_secs(12),
            max_embed_chars: 2000,
            preview_chars: 500,
        }
    }
}

/// Why an ingest call stopped taking new sub-fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStop {
    Exhausted,
    CountLimit,
    Deadline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Sub-fragments prepared within budget.
    pub prepared: usize,
    /// Prepared ids skipped because the collection already holds them.
    pub already_stored: usize,
    pub embedded: usize,
    /// Sub-fragments for which no embedding came back.
    pub dropped: usize,
    pub stop: IngestStop,
}

/// Identifier of the `sub_index`-th piece of `fragment`.
pub fn subfragment_id(fragment: &Fragment, sub_index: usize) -> String {
    format!(
        "{}#{}-{}::{}",
        fragment.path, fragment.start_line, fragment.end_line, sub_index
    )
}

/// Collection name for a snapshot key.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; an 8-hex digest of the
/// raw key keeps keys that sanitize identically apart.
pub fn collection_name(prefix: &str, snapshot_key: &str) -> String {
    let raw = format!("{}__{}", prefix, snapshot_key);
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = format!("{:x}", Sha256::digest(snapshot_key.as_bytes()));
    format!("{}_{}", sanitized, &digest[..8])
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingService>,
    params: IndexParams,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingService>,
        params: IndexParams,
    ) -> Self {
        Self {
            store,
            embedder,
            params,
        }
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn collection_for(&self, snapshot_key: &str) -> String {
        collection_name(&self.params.collection_prefix, snapshot_key)
    }

    fn embed_limit(&self) -> usize {
        self.params
            .max_embed_chars
            .min(self.embedder.max_input_chars())
            .max(1)
    }

    /// Embed and store `fragments` under `snapshot_key`.
    ///
    /// Stops early at the sub-fragment ceiling or the deadline; whatever was
    /// prepared before that point is still embedded and stored. Embedding
    /// failures are logged and counted as dropped, never returned.
    pub async fn ingest(&self, snapshot_key: &str, fragments: &[Fragment]) -> Result<IngestReport> {
        let collection = self.collection_for(snapshot_key);
        let started = Instant::now();
        let limit = self.embed_limit();
        let max = self.params.max_subfragments;
        let deadline = self.params.max_embed_time;

        let mut pending: Vec<(String, String, FragmentMeta)> = Vec::new();
        let mut stop = IngestStop::Exhausted;

        'fragments: for fragment in fragments {
            if pending.len() >= max {
                stop = IngestStop::CountLimit;
                break;
            }
            if started.elapsed() >= deadline {
                stop = IngestStop::Deadline;
                break;
            }
            let text = fragment.text.trim();
            if text.is_empty() {
                continue;
            }
            let meta = FragmentMeta::from(fragment);
            for (idx, sub) in split_for_embedding(text, limit).into_iter().enumerate() {
                if pending.len() >= max {
                    stop = IngestStop::CountLimit;
                    break 'fragments;
                }
                if started.elapsed() >= deadline {
                    stop = IngestStop::Deadline;
                    break 'fragments;
                }
                pending.push((subfragment_id(fragment, idx), sub, meta.clone()));
            }
        }

        let prepared = pending.len();
        let ids: Vec<String> = pending.iter().map(|(id, _, _)| id.clone()).collect();
        let existing = self.store.existing_ids(&collection, &ids).await?;
        pending.retain(|(id, _, _)| !existing.contains(id));

        let mut report = IngestReport {
            prepared,
            already_stored: existing.len(),
            embedded: 0,
            dropped: 0,
            stop,
        };

        if pending.is_empty() {
            tracing::debug!(key = snapshot_key, ?stop, prepared, "nothing new to embed");
            return Ok(report);
        }

        let texts: Vec<String> = pending.iter().map(|(_, text, _)| text.clone()).collect();
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = snapshot_key, error = %e, "embedding batch failed; nothing stored");
                report.dropped = pending.len();
                return Ok(report);
            }
        };

        let mut vectors = vectors.into_iter();
        let records: Vec<IndexedRecord> = pending
            .into_iter()
            .filter_map(|(id, text, meta)| match vectors.next().flatten() {
                Some(embedding) if !embedding.is_empty() => Some(IndexedRecord {
                    id,
                    text,
                    meta,
                    embedding,
                }),
                _ => None,
            })
            .collect();

        report.embedded = records.len();
        report.dropped = texts.len() - records.len();

        if !records.is_empty() {
            self.store.upsert(&collection, &records).await?;
        }

        tracing::info!(
            key = snapshot_key,
            prepared = report.prepared,
            embedded = report.embedded,
            dropped = report.dropped,
            ?stop,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "vector index ingest complete"
        );
        Ok(report)
    }

    /// Return up to `top_k` stored sub-fragments nearest to `query_text`,
    /// best first.
    ///
    /// Empty when the collection is empty or the query cannot be embedded.
    pub async fn query(
        &self,
        snapshot_key: &str,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedItem>> {
        let collection = self.collection_for(snapshot_key);
        if self.store.count(&collection).await? == 0 {
            return Ok(Vec::new());
        }

        let Some(query) = split_for_embedding(query_text, self.embed_limit())
            .into_iter()
            .next()
        else {
            return Ok(Vec::new());
        };

        let query_vec = match embed_one(self.embedder.as_ref(), &query).await {
            Ok(Some(v)) if !v.is_empty() => v,
            Ok(_) => return Ok(Vec::new()),
            Err(e) => {
                tracing::warn!(key = snapshot_key, error = %e, "query embedding failed");
                return Ok(Vec::new());
            }
        };

        let hits = self.store.nearest(&collection, &query_vec, top_k).await?;
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedItem {
                path: hit.meta.path,
                start_line: hit.meta.start_line,
                end_line: hit.meta.end_line,
                kind: hit.meta.kind,
                symbol: hit.meta.symbol,
                preview: truncate_chars(&hit.text, self.params.preview_chars),
                similarity: (1.0 - hit.distance).clamp(0.0, 1.0),
            })
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::VocabEmbedder;
    use super::*;
    use crate::chunk::chunk_path;
    use crate::store::memory::InMemoryVectorStore;
    use std::sync::atomic::Ordering;

    fn fragments() -> Vec<Fragment> {
        let mut out = chunk_path(
            "app/auth.py",
            "def login(user):\n    return token(user)\n\ndef logout(user):\n    session.clear()\n",
        );
        out.extend(chunk_path(
            "README.md",
            "# Setup\npip install app\n# Database\nmigrations live in db/\n",
        ));
        out
    }

    fn index_with(embedder: Arc<VocabEmbedder>, params: IndexParams) -> (VectorIndex, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        let index = VectorIndex::new(store.clone(), embedder, params);
        (index, store)
    }

    #[test]
    fn test_collection_name_sanitized_and_distinct() {
        let a = collection_name("firstfix", "octo/demo@abc");
        let b = collection_name("firstfix", "octo_demo@abc");
        assert!(a.starts_with("firstfix__octo_demo_abc_"));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
        assert_ne!(a, b);
    }

    #[test]
    fn test_subfragment_id_format() {
        let f = &fragments()[0];
        assert_eq!(subfragment_id(f, 2), "app/auth.py#1-3::2");
    }

    #[tokio::test]
    async fn test_ingest_twice_does_not_grow() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["login", "session", "install"]));
        let (index, store) = index_with(embedder.clone(), IndexParams::default());
        let frags = fragments();

        let first = index.ingest("octo/demo@1", &frags).await.unwrap();
        let collection = index.collection_for("octo/demo@1");
        let stored = store.count(&collection).await.unwrap();
        assert_eq!(first.embedded, stored);
        assert_eq!(first.stop, IngestStop::Exhausted);

        let second = index.ingest("octo/demo@1", &frags).await.unwrap();
        assert_eq!(store.count(&collection).await.unwrap(), stored);
        assert_eq!(second.already_stored, second.prepared);
        assert_eq!(second.embedded, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_ingest_respects_count_ceiling() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["login"]));
        let params = IndexParams {
            max_subfragments: 2,
            ..IndexParams::default()
        };
        let (index, store) = index_with(embedder, params);
        let report = index.ingest("k@1", &fragments()).await.unwrap();
        assert_eq!(report.prepared, 2);
        assert_eq!(report.stop, IngestStop::CountLimit);
        assert_eq!(store.count(&index.collection_for("k@1")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_respects_deadline() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["login"]));
        let params = IndexParams {
            max_embed_time: Duration::ZERO,
            ..IndexParams::default()
        };
        let (index, store) = index_with(embedder.clone(), params);
        let report = index.ingest("k@1", &fragments()).await.unwrap();
        assert_eq!(report.stop, IngestStop::Deadline);
        assert_eq!(report.prepared, 0);
        assert_eq!(store.count(&index.collection_for("k@1")).await.unwrap(), 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_drops_missing_embeddings() {
        let mut embedder = VocabEmbedder::new(vec!["login"]);
        embedder.reject_marker = Some("logout");
        let (index, store) = index_with(Arc::new(embedder), IndexParams::default());
        let report = index.ingest("k@1", &fragments()).await.unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(
            store.count(&index.collection_for("k@1")).await.unwrap(),
            report.prepared - 1
        );
    }

    #[tokio::test]
    async fn test_ingest_resplits_long_fragments() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["line"]));
        let params = IndexParams {
            max_embed_chars: 40,
            ..IndexParams::default()
        };
        let (index, _store) = index_with(embedder, params);
        let body: String = (0..10).map(|i| format!("line number {}\n", i)).collect();
        let frags = chunk_path("notes.txt", &body);
        let report = index.ingest("k@1", &frags).await.unwrap();
        assert!(report.prepared > 1);
        assert_eq!(report.embedded, report.prepared);
    }

    #[tokio::test]
    async fn test_query_empty_collection() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["login"]));
        let (index, _store) = index_with(embedder.clone(), IndexParams::default());
        let hits = index.query("nothing@here", "login", 5).await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_query_ranks_and_bounds_preview() {
        let embedder = Arc::new(VocabEmbedder::new(vec!["login", "session", "install"]));
        let params = IndexParams {
            preview_chars: 10,
            ..IndexParams::default()
        };
        let (index, _store) = index_with(embedder, params);
        index.ingest("k@1", &fragments()).await.unwrap();

        let hits = index.query("k@1", "session clear", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].symbol.as_deref(), Some("logout"));
        assert!(hits.iter().all(|h| h.preview.chars().count() <= 10));
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.similarity)));
        assert!(hits[0].similarity >= hits[1].similarity);
    }
}
