//! Request-level failures.
//!
//! Only these three conditions abort a request. Fetch failures, missing
//! embeddings, retrieval and generation timeouts, and unparseable model
//! output all degrade to a smaller or fallback result instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GuideError>;

#[derive(Error, Debug)]
pub enum GuideError {
    #[error("issue or pull request #{number} not found in {repo}")]
    NotFound { repo: String, number: u64 },

    #[error("could not resolve a commit for {repo}: {reason}")]
    Unresolvable { repo: String, reason: String },

    #[error("no file tree returned for {key}; the repository may be empty or rate-limited")]
    EmptyTree { key: String },
}
