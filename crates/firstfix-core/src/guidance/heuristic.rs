//! Stage 3: classify loose prose into guidance fields.
//!
//! Used when the text has neither JSON nor section headings. The text is
//! split into short items (by line when there are at least two meaningful
//! lines, otherwise by sentence), then:
//!
//! - the first short item with an action verb becomes the goal;
//! - a command-like token sends an item to `how_to_verify`;
//! - a leading caution word sends it to `gotchas`;
//! - a `(path: start-end)` citation sends it to `where_to_work`;
//! - anything else lands in `what_to_change`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::cleanup::clean_item;
use super::{GuidanceDocument, ListField, ITEM_MAX_CHARS};

/// Items considered after splitting.
pub const MAX_ITEMS: usize = 8;
/// Longest goal candidate, in words.
pub const GOAL_MAX_WORDS: usize = 22;

static COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:pytest|tox|nox|unittest|npm|yarn|pnpm|jest|cargo|make (?:test|check|lint)|go test|flask run|pip|python -m|curl|docker|run the tests?)\b",
    )
    .unwrap()
});

static CAUTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:beware|note|gotchas?|caution|edge[\s-]cases?|watch out)\b").unwrap()
});

static CITATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^():]+:\s*\d+\s*[-–]\s*\d+\s*\)").unwrap());

static ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:fix|implement|add|handle|return|update|support)(?:s|es|ed|d|ing)?\b")
        .unwrap()
});

fn meaningful(line: &str) -> bool {
    line.chars().filter(|c| c.is_alphanumeric()).count() >= 3
}

/// Split on sentence-ending punctuation followed by whitespace.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = matches!(c, '.' | '!' | '?')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if boundary {
            out.push(std::mem::take(&mut current));
        }
    }
    out.push(current);
    out
}

/// Short, cleaned, deduplicated items in text order.
pub fn split_items(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().filter(|l| meaningful(l)).collect();
    let raw: Vec<String> = if lines.len() >= 2 {
        lines.into_iter().map(str::to_string).collect()
    } else {
        let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
        sentences(&flat)
    };

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for candidate in raw {
        let item = clean_item(&candidate, ITEM_MAX_CHARS);
        if !meaningful(&item) {
            continue;
        }
        if seen.insert(item.to_lowercase()) {
            items.push(item);
        }
        if items.len() >= MAX_ITEMS {
            break;
        }
    }
    items
}

/// Which list an item belongs in.
pub fn classify(item: &str) -> ListField {
    if COMMAND.is_match(item) {
        ListField::HowToVerify
    } else if CAUTION.is_match(item) {
        ListField::Gotchas
    } else if CITATION.is_match(item) {
        ListField::WhereToWork
    } else {
        ListField::WhatToChange
    }
}

fn is_goal_candidate(item: &str) -> bool {
    item.split_whitespace().count() <= GOAL_MAX_WORDS && ACTION.is_match(item)
}

/// Classify prose into a guidance document; `None` when it yields no items.
pub fn parse(text: &str) -> Option<GuidanceDocument> {
    let mut items = split_items(text);
    if items.is_empty() {
        return None;
    }

    let mut doc = GuidanceDocument::default();
    if let Some(pos) = items.iter().position(|i| is_goal_candidate(i)) {
        doc.high_level_goal = items.remove(pos);
    }
    for item in items {
        let field = classify(&item);
        let list = doc.list_mut(field);
        if list.len() < field.cap() {
            list.push(item);
        }
    }
    Some(doc)
}
