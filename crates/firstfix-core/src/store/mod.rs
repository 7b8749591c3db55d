//! Storage abstraction for the vector index.
//!
//! The [`VectorStore`] trait defines the collection-scoped operations the
//! [`VectorIndex`](crate::index::VectorIndex) needs, enabling pluggable
//! backends (in-memory, SQLite on disk).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;

use crate::models::FragmentMeta;

/// One embedded sub-fragment as persisted in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    /// `"{path}#{start}-{end}::{sub_index}"`.
    pub id: String,
    pub text: String,
    pub meta: FragmentMeta,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor hit with its raw cosine distance.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub id: String,
    pub text: String,
    pub meta: FragmentMeta,
    pub distance: f32,
}

/// Abstract vector storage, partitioned into named collections.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorStore::upsert) | Insert or replace records by id |
/// | [`existing_ids`](VectorStore::existing_ids) | Which of the given ids are stored |
/// | [`count`](VectorStore::count) | Number of records in a collection |
/// | [`nearest`](VectorStore::nearest) | Closest records by cosine distance, ascending |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records, keyed by `(collection, id)`.
    ///
    /// Re-upserting an id never grows the collection.
    async fn upsert(&self, collection: &str, records: &[IndexedRecord]) -> Result<()>;

    /// Return the subset of `ids` already stored in `collection`.
    async fn existing_ids(&self, collection: &str, ids: &[String]) -> Result<HashSet<String>>;

    /// Number of records in `collection` (0 when it does not exist).
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Up to `limit` records ordered by ascending cosine distance to `query`.
    async fn nearest(&self, collection: &str, query: &[f32], limit: usize)
        -> Result<Vec<Neighbor>>;
}
