//! Ingestion budgeting: which files of a tree get fetched and chunked.
//!
//! Selection is a path predicate (a case-insensitive [`GlobSet`]) applied in
//! tree order and capped at `max_files`. Fetching then enforces a per-file
//! and a running total character ceiling. A failed fetch or an oversized
//! file is skipped; crossing the total ceiling stops fetching altogether.

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use once_cell::sync::Lazy;

use crate::chunk::chunk_path;
use crate::models::{Fragment, RepoId};
use crate::source::{EntryKind, SourceProvider, TreeEntry};

/// Ceilings applied while building a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    pub max_files: usize,
    pub max_file_chars: usize,
    pub max_total_chars: usize,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_files: 60,
            max_file_chars: 30_000,
            max_total_chars: 120_000,
        }
    }
}

const WANTED_PATTERNS: &[&str] = &[
    // entry points and conventional layout
    "**/app.py",
    "**/wsgi.py",
    "**/manage.py",
    "**/__init__.py",
    "**/routes.py",
    "**/views.py",
    "**/errors.py",
    "**/models.py",
    "**/forms.py",
    // route / controller / API directories
    "**/api",
    "**/api/**",
    "**/blueprints/**",
    "**/routes/**",
    "**/controllers/**",
    // documentation and run files
    "**/README",
    "**/README.md",
    "**/CONTRIBUTING",
    "**/CONTRIBUTING.md",
    "**/Makefile",
    "**/Dockerfile",
    // build/run descriptors
    "**/requirements.txt",
    "**/pyproject.toml",
    "**/setup.cfg",
    "**/package.json",
    "**/Cargo.toml",
    "**/go.mod",
    // tests
    "**/test/**",
    "**/tests/**",
    // source files
    "**/*.py",
    "**/*.rs",
    "**/*.go",
    "**/*.js",
    "**/*.jsx",
    "**/*.ts",
    "**/*.tsx",
];

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern)
                .case_insensitive(true)
                .literal_separator(true)
                .build()?,
        );
    }
    Ok(builder.build()?)
}

static WANTED: Lazy<GlobSet> = Lazy::new(|| {
    build_globset(WANTED_PATTERNS).unwrap_or_else(|e| {
        tracing::error!(error = %e, "invalid file selection pattern; selecting nothing");
        GlobSet::empty()
    })
});

/// Whether a tree path is worth fetching.
pub fn wants_file(path: &str) -> bool {
    WANTED.is_match(path)
}

/// Blob entries that pass [`wants_file`], in tree order, at most `max_files`.
pub fn select_candidates(tree: &[TreeEntry], max_files: usize) -> Vec<&TreeEntry> {
    tree.iter()
        .filter(|e| e.kind == EntryKind::Blob && wants_file(&e.path))
        .take(max_files)
        .collect()
}

/// What a budgeted fetch produced.
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Fragments of all accepted files, in acceptance order.
    pub fragments: Vec<Fragment>,
    pub candidates: usize,
    pub files_accepted: usize,
    pub fetch_failures: usize,
    pub oversized: usize,
    /// Characters across accepted files.
    pub total_chars: usize,
    /// True when the total ceiling stopped fetching early.
    pub budget_exhausted: bool,
}

/// Fetch and chunk the selected files of `tree`.
///
/// Never fails: per-file errors are counted and skipped.
pub async fn ingest_tree(
    provider: &dyn SourceProvider,
    repo: &RepoId,
    commit: &str,
    tree: &[TreeEntry],
    budget: &Budget,
) -> IngestOutcome {
    let candidates = select_candidates(tree, budget.max_files);
    let mut outcome = IngestOutcome {
        candidates: candidates.len(),
        ..IngestOutcome::default()
    };
    tracing::info!(
        repo = %repo,
        files = candidates.len(),
        max_files = budget.max_files,
        "selected candidate files"
    );

    for entry in candidates {
        let content = match provider.fetch_file(repo, commit, &entry.path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(path = %entry.path, error = %e, "fetch failed; skipping");
                outcome.fetch_failures += 1;
                continue;
            }
        };

        let chars = content.chars().count();
        if chars > budget.max_file_chars {
            tracing::debug!(path = %entry.path, chars, "file over size ceiling; skipping");
            outcome.oversized += 1;
            continue;
        }
        if outcome.total_chars + chars > budget.max_total_chars {
            tracing::info!(
                repo = %repo,
                total_chars = outcome.total_chars,
                "character budget reached; stopping fetch"
            );
            outcome.budget_exhausted = true;
            break;
        }
        outcome.total_chars += chars;
        outcome.files_accepted += 1;
        outcome.fragments.extend(chunk_path(&entry.path, &content));
    }

    tracing::info!(
        repo = %repo,
        files = outcome.files_accepted,
        chunks = outcome.fragments.len(),
        chars = outcome.total_chars,
        "fetched and chunked"
    );
    outcome
}
