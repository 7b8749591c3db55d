//! Source-host collaborator.
//!
//! The [`SourceProvider`] trait is everything snapshot building and
//! budgeted ingestion need from a code host: issue lookup, a recursive
//! tree listing at a commit, raw file contents, and branch resolution.
//! The GitHub implementation lives in the `firstfix` app crate; tests use
//! in-memory fakes.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Issue, RepoId};

/// Result of looking up an issue or pull request.
#[derive(Debug, Clone, Default)]
pub struct IssueLookup {
    /// `None` when the number resolves to nothing.
    pub issue: Option<Issue>,
    /// Head commit of the default branch, when the host reports it inline.
    pub head_commit: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Other,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
    /// Byte size for blobs, when known.
    pub size: Option<u64>,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            size: None,
        }
    }
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Look up issue/PR `number` in `repo`.
    async fn resolve_issue(&self, repo: &RepoId, number: u64) -> Result<IssueLookup>;

    /// Recursive listing of the tree at `commit`, in host order.
    async fn list_tree(&self, repo: &RepoId, commit: &str) -> Result<Vec<TreeEntry>>;

    /// Raw text of `path` at `commit`.
    async fn fetch_file(&self, repo: &RepoId, commit: &str, path: &str) -> Result<String>;

    /// Name of the default branch.
    async fn default_branch(&self, repo: &RepoId) -> Result<String>;

    /// Head commit of `branch`, or `None` when the branch does not exist.
    async fn branch_commit(&self, repo: &RepoId, branch: &str) -> Result<Option<String>>;
}
