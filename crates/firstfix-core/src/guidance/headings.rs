//! Stage 2: text organized under the five section headings.
//!
//! A heading line may carry markdown hashes, numbering, bold markers and a
//! trailing colon; text after the colon on the same line belongs to that
//! section. Text before the first heading is ignored.

use once_cell::sync::Lazy;
use regex::Regex;

use super::cleanup::strip_markers;
use super::{GuidanceDocument, ListField};

/// Items kept per list section before final capping.
pub const SECTION_ITEM_LIMIT: usize = 6;

static HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#{1,6}\s*)?(?:\d{1,2}[.)]\s*)?(?:\*\*|__)?\s*(?P<label>high[\s_-]*level[\s_-]*goal|where[\s_-]+to[\s_-]+work|what[\s_-]+to[\s_-]+change|how[\s_-]+to[\s_-]+verify|gotchas)\s*(?:\*\*|__)?\s*(?::\s*(?:\*\*|__)?\s*(?P<rest>.*))?$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Goal,
    List(ListField),
}

fn section_for(label: &str) -> Section {
    let lower = label.to_ascii_lowercase();
    if lower.starts_with("high") {
        Section::Goal
    } else if lower.starts_with("where") {
        Section::List(ListField::WhereToWork)
    } else if lower.starts_with("what") {
        Section::List(ListField::WhatToChange)
    } else if lower.starts_with("how") {
        Section::List(ListField::HowToVerify)
    } else {
        Section::List(ListField::Gotchas)
    }
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Non-blank, marker-stripped lines of a section body.
fn body_lines<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .filter(|l| !is_fence(l))
        .map(|l| strip_markers(*l))
        .filter(|l| !l.is_empty())
        .collect()
}

/// Slice `text` at recognized headings; `None` when there are none.
pub fn parse(text: &str) -> Option<GuidanceDocument> {
    let lines: Vec<&str> = text.lines().collect();

    let mut marks: Vec<(usize, Section, Option<&str>)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = HEADING.captures(line) {
            let section = section_for(&caps["label"]);
            let rest = caps
                .name("rest")
                .map(|m| m.as_str().trim())
                .filter(|r| !r.is_empty());
            marks.push((i, section, rest));
        }
    }
    if marks.is_empty() {
        return None;
    }

    let mut doc = GuidanceDocument::default();
    for (n, (line_idx, section, rest)) in marks.iter().enumerate() {
        let end = marks.get(n + 1).map_or(lines.len(), |m| m.0);
        let mut span: Vec<&str> = Vec::new();
        if let Some(r) = *rest {
            span.push(r);
        }
        span.extend_from_slice(&lines[line_idx + 1..end]);
        let body = body_lines(&span);

        match section {
            Section::Goal => {
                if doc.high_level_goal.is_empty() {
                    doc.high_level_goal = body.join(" ");
                }
            }
            Section::List(field) => {
                let list = doc.list_mut(*field);
                for line in body {
                    if list.len() >= SECTION_ITEM_LIMIT {
                        break;
                    }
                    list.push(line.to_string());
                }
            }
        }
    }
    Some(doc)
}
