//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `HashMap` of collections behind `std::sync::RwLock`. Each
//! collection keeps records in insertion order with an id → slot map, so
//! upserts replace in place. Nearest-neighbor search is brute-force cosine
//! distance over the whole collection.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_distance;

use super::{IndexedRecord, Neighbor, VectorStore};

#[derive(Default)]
struct Collection {
    records: Vec<IndexedRecord>,
    slots: HashMap<String, usize>,
}

/// Volatile store; contents live as long as the process.
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()> {
        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let coll = collections.entry(collection.to_string()).or_default();
        for record in records {
            match coll.slots.get(&record.id) {
                Some(&slot) => coll.records[slot] = record.clone(),
                None => {
                    coll.slots.insert(record.id.clone(), coll.records.len());
                    coll.records.push(record.clone());
                }
            }
        }
        Ok(())
    }

    async fn existing_ids(&self, collection: &str, ids: &[String]) -> Result<HashSet<String>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(match collections.get(collection) {
            Some(coll) => ids
                .iter()
                .filter(|id| coll.slots.contains_key(*id))
                .cloned()
                .collect(),
            None => HashSet::new(),
        })
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(collections.get(collection).map_or(0, |c| c.records.len()))
    }

    async fn nearest(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
    ) -> Result<Vec<Neighbor>> {
        let collections = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut neighbors: Vec<Neighbor> = coll
            .records
            .iter()
            .map(|r| Neighbor {
                id: r.id.clone(),
                text: r.text.clone(),
                meta: r.meta.clone(),
                distance: cosine_distance(query, &r.embedding),
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        neighbors.truncate(limit);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FragmentKind, FragmentMeta};

    fn record(id: &str, path: &str, embedding: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            id: id.to_string(),
            text: format!("text of {}", id),
            meta: FragmentMeta {
                path: path.to_string(),
                start_line: 1,
                end_line: 2,
                kind: FragmentKind::Code,
                symbol: None,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_by_id() {
        let store = InMemoryVectorStore::new();
        let recs = vec![record("a", "a.py", vec![1.0, 0.0]), record("b", "b.py", vec![0.0, 1.0])];
        store.upsert("c1", &recs).await.unwrap();
        store.upsert("c1", &recs).await.unwrap();
        assert_eq!(store.count("c1").await.unwrap(), 2);
        assert_eq!(store.count("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_record() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("c1", &[record("a", "old.py", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("c1", &[record("a", "new.py", vec![0.0, 1.0])])
            .await
            .unwrap();
        let hits = store.nearest("c1", &[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].meta.path, "new.py");
        assert!(hits[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_nearest_orders_by_distance() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(
                "c1",
                &[
                    record("far", "far.py", vec![-1.0, 0.0]),
                    record("near", "near.py", vec![1.0, 0.1]),
                    record("mid", "mid.py", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        let hits = store.nearest("c1", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[tokio::test]
    async fn test_existing_ids() {
        let store = InMemoryVectorStore::new();
        store
            .upsert("c1", &[record("a", "a.py", vec![1.0])])
            .await
            .unwrap();
        let found = store
            .existing_ids("c1", &["a".to_string(), "z".to_string()])
            .await
            .unwrap();
        assert!(found.contains("a"));
        assert!(!found.contains("z"));
        assert!(store
            .existing_ids("missing", &["a".to_string()])
            .await
            .unwrap()
            .is_empty());
    }
}
