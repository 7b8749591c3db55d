//! Core data models shared by the ingestion, retrieval and guidance stages.
//!
//! [`Fragment`]s are produced by the chunker and owned by a [`Snapshot`];
//! [`RetrievedItem`]s are derived per request from the vector index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Owner/name pair identifying a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (owner, name) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("expected OWNER/REPO, got '{}'", s))?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            anyhow::bail!("expected OWNER/REPO, got '{}'", s);
        }
        Ok(Self::new(owner, name))
    }
}

/// What a fragment's text is: source code, prose, build/run descriptor, or test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    Code,
    Doc,
    Config,
    Test,
}

impl FragmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Code => "code",
            FragmentKind::Doc => "doc",
            FragmentKind::Config => "config",
            FragmentKind::Test => "test",
        }
    }
}

impl FromStr for FragmentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "code" => Ok(FragmentKind::Code),
            "doc" => Ok(FragmentKind::Doc),
            "config" => Ok(FragmentKind::Config),
            "test" => Ok(FragmentKind::Test),
            other => anyhow::bail!("unknown fragment kind: {}", other),
        }
    }
}

/// A typed slice of one file's text with 1-based, inclusive line provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: FragmentKind,
    pub text: String,
    pub symbol: Option<String>,
    pub tags: BTreeSet<String>,
}

/// Whether the tracked item is an issue or a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    Issue,
    PullRequest,
}

/// Issue or pull request metadata, denormalized onto each snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub body: String,
    pub url: String,
    pub kind: IssueKind,
}

impl Issue {
    /// Title and body joined the way retrieval queries are built.
    pub fn query_text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

/// The frozen fragment set for one repository at one commit.
///
/// Cloning is cheap: the fragment list is shared, only the issue fields
/// are copied so a cache hit can overlay refreshed issue metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    /// `"{owner}/{name}@{commit}"`.
    pub key: String,
    pub repo: RepoId,
    pub commit: String,
    pub issue: Issue,
    pub fragments: Arc<Vec<Fragment>>,
}

impl Snapshot {
    pub fn key_for(repo: &RepoId, commit: &str) -> String {
        format!("{}@{}", repo, commit)
    }
}

/// Metadata stored alongside every indexed sub-fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: FragmentKind,
    pub symbol: Option<String>,
}

impl From<&Fragment> for FragmentMeta {
    fn from(f: &Fragment) -> Self {
        Self {
            path: f.path.clone(),
            start_line: f.start_line,
            end_line: f.end_line,
            kind: f.kind,
            symbol: f.symbol.clone(),
        }
    }
}

/// A retrieval hit handed to prompt construction and returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: FragmentKind,
    pub symbol: Option<String>,
    pub preview: String,
    /// Clamped `1 - distance`, in `[0, 1]`.
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_parse() {
        let repo: RepoId = "pallets/flask".parse().unwrap();
        assert_eq!(repo.owner, "pallets");
        assert_eq!(repo.name, "flask");
        assert_eq!(repo.to_string(), "pallets/flask");
    }

    #[test]
    fn test_repo_id_rejects_malformed() {
        assert!("flask".parse::<RepoId>().is_err());
        assert!("/flask".parse::<RepoId>().is_err());
        assert!("a/b/c".parse::<RepoId>().is_err());
    }

    #[test]
    fn test_snapshot_key() {
        let repo = RepoId::new("octo", "demo");
        assert_eq!(Snapshot::key_for(&repo, "abc123"), "octo/demo@abc123");
    }

    #[test]
    fn test_fragment_kind_roundtrip_names() {
        for kind in [
            FragmentKind::Code,
            FragmentKind::Doc,
            FragmentKind::Config,
            FragmentKind::Test,
        ] {
            assert_eq!(kind.as_str().parse::<FragmentKind>().unwrap(), kind);
        }
    }
}
