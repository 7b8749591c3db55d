//! Guidance normalization.
//!
//! Turns free-form generated text into a [`GuidanceDocument`] with five
//! fixed fields. Stages are tried in order and the first that produces a
//! document wins:
//!
//! 1. [`structured::parse`]: the first brace-delimited JSON object.
//! 2. [`headings::parse`]: text sliced at the five section headings.
//! 3. [`heuristic::parse`]: items classified by keyword cues.
//!
//! Whatever stage wins, [`finalize`] then strips markup residue, caps and
//! dedupes every list. [`fallback`] builds the static document used when
//! generation itself fails.

pub mod cleanup;
pub mod headings;
pub mod heuristic;
pub mod structured;

use serde::{Deserialize, Serialize};

pub use cleanup::finalize;

/// Longest goal, in characters.
pub const GOAL_MAX_CHARS: usize = 200;
/// Longest list item, in characters.
pub const ITEM_MAX_CHARS: usize = 180;

/// The five-field guidance handed back to callers.
///
/// Every field is always present when serialized, even when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceDocument {
    #[serde(default)]
    pub high_level_goal: String,
    #[serde(default)]
    pub where_to_work: Vec<String>,
    #[serde(default)]
    pub what_to_change: Vec<String>,
    #[serde(default)]
    pub how_to_verify: Vec<String>,
    #[serde(default)]
    pub gotchas: Vec<String>,
}

/// One of the four list fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListField {
    WhereToWork,
    WhatToChange,
    HowToVerify,
    Gotchas,
}

impl ListField {
    pub const ALL: [ListField; 4] = [
        ListField::WhereToWork,
        ListField::WhatToChange,
        ListField::HowToVerify,
        ListField::Gotchas,
    ];

    /// Maximum items kept after normalization.
    pub fn cap(&self) -> usize {
        match self {
            ListField::WhereToWork | ListField::WhatToChange => 3,
            ListField::HowToVerify | ListField::Gotchas => 2,
        }
    }
}

impl GuidanceDocument {
    pub fn list(&self, field: ListField) -> &Vec<String> {
        match field {
            ListField::WhereToWork => &self.where_to_work,
            ListField::WhatToChange => &self.what_to_change,
            ListField::HowToVerify => &self.how_to_verify,
            ListField::Gotchas => &self.gotchas,
        }
    }

    pub fn list_mut(&mut self, field: ListField) -> &mut Vec<String> {
        match field {
            ListField::WhereToWork => &mut self.where_to_work,
            ListField::WhatToChange => &mut self.what_to_change,
            ListField::HowToVerify => &mut self.how_to_verify,
            ListField::Gotchas => &mut self.gotchas,
        }
    }

    /// True when the goal and every list are empty.
    pub fn is_empty(&self) -> bool {
        self.high_level_goal.is_empty() && ListField::ALL.iter().all(|f| self.list(*f).is_empty())
    }
}

/// Where a guidance document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Structured,
    Headings,
    Heuristic,
    Fallback,
}

/// Normalize raw generated text, reporting which stage produced it.
///
/// Never fails; text no stage can read yields an empty document.
pub fn normalize(raw: &str) -> (GuidanceDocument, Origin) {
    let (doc, origin) = if let Some(doc) = structured::parse(raw) {
        (doc, Origin::Structured)
    } else if let Some(doc) = headings::parse(raw) {
        (doc, Origin::Headings)
    } else {
        (heuristic::parse(raw).unwrap_or_default(), Origin::Heuristic)
    };
    tracing::debug!(?origin, "normalized generated guidance");
    (finalize(doc), origin)
}

/// Deterministic guidance built only from the issue title.
pub fn fallback(issue_title: &str) -> GuidanceDocument {
    let title = issue_title.split_whitespace().collect::<Vec<_>>().join(" ");
    let goal = if title.is_empty() {
        "Resolve the reported issue".to_string()
    } else {
        format!("Resolve: {}", title)
    };
    finalize(GuidanceDocument {
        high_level_goal: goal,
        where_to_work: vec![
            "Search the codebase for names and messages mentioned in the issue".to_string(),
        ],
        what_to_change: vec![
            "Reproduce the problem first, then make the smallest change that fixes it".to_string(),
        ],
        how_to_verify: vec![
            "Run the project's test suite and add a test that covers the issue".to_string(),
        ],
        gotchas: vec!["Read the contributing guide before opening a pull request".to_string()],
    })
}
