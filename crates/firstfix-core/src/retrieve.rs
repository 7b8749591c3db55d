//! Issue-driven retrieval over the vector index.
//!
//! # Algorithm
//!
//! 1. Build the query from the issue title and body.
//! 2. Ask the index for a candidate pool wider than `k`.
//! 3. Walk candidates best-first, skipping any without a path or below
//!    `min_similarity`.
//! 4. Keep the first (best) candidate per distinct path.
//! 5. Stop once `k` paths are collected.
//!
//! An empty result is a normal outcome meaning "no code context".

use anyhow::Result;
use std::collections::HashSet;

use crate::index::VectorIndex;
use crate::models::{RetrievedItem, Snapshot};

/// Default width of the candidate pool requested from the index.
pub const DEFAULT_CANDIDATE_POOL: usize = 24;

#[derive(Debug, Clone)]
pub struct RetrievalParams {
    /// Maximum distinct paths returned.
    pub k: usize,
    /// Candidates below this similarity are discarded.
    pub min_similarity: f32,
    /// Candidates requested from the index before filtering.
    pub candidate_pool: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 6,
            min_similarity: 0.35,
            candidate_pool: DEFAULT_CANDIDATE_POOL,
        }
    }
}

/// Down-select best-first candidates to at most `k` distinct paths at or
/// above `min_similarity`, preserving order.
pub fn select_distinct_paths(
    candidates: Vec<RetrievedItem>,
    k: usize,
    min_similarity: f32,
) -> Vec<RetrievedItem> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for candidate in candidates {
        if out.len() >= k {
            break;
        }
        if candidate.path.is_empty() || candidate.similarity < min_similarity {
            continue;
        }
        if seen.insert(candidate.path.clone()) {
            out.push(candidate);
        }
    }
    out
}

/// Retrieve diverse, thresholded context for the snapshot's issue.
pub async fn retrieve_for_issue(
    index: &VectorIndex,
    snapshot: &Snapshot,
    params: &RetrievalParams,
) -> Result<Vec<RetrievedItem>> {
    if params.k == 0 {
        return Ok(Vec::new());
    }
    let pool = params.candidate_pool.max(params.k);
    let candidates = index
        .query(&snapshot.key, &snapshot.issue.query_text(), pool)
        .await?;
    let candidate_count = candidates.len();
    let selected = select_distinct_paths(candidates, params.k, params.min_similarity);
    tracing::debug!(
        key = %snapshot.key,
        candidates = candidate_count,
        selected = selected.len(),
        "retrieved issue context"
    );
    Ok(selected)
}

/// Unfiltered nearest sub-fragments for the snapshot's issue.
pub async fn retrieve_topk(
    index: &VectorIndex,
    snapshot: &Snapshot,
    top_k: usize,
) -> Result<Vec<RetrievedItem>> {
    index
        .query(&snapshot.key, &snapshot.issue.query_text(), top_k)
        .await
}
