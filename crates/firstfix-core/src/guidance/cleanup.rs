//! Final normalization pass shared by every stage.
//!
//! [`finalize`] is idempotent: running it on its own output changes
//! nothing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use super::{GuidanceDocument, ListField, GOAL_MAX_CHARS, ITEM_MAX_CHARS};

static LEADING_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-*+•▪◦]\s+|\(?\d{1,3}[.)]\s+|#{1,6}\s+|>\s*)").unwrap()
});

/// Remove one or more leading bullet, numbering, heading or quote markers.
pub fn strip_markers(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let next = match LEADING_MARKER.find(current) {
            Some(m) => current[m.end()..].trim_start(),
            None => return current,
        };
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Clean one goal or item: drop bold markers, collapse whitespace, strip
/// leading markers, cap the length.
pub fn clean_item(text: &str, max_chars: usize) -> String {
    let unbolded = text.replace("**", "");
    let collapsed = unbolded.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = strip_markers(&collapsed);
    truncate_chars(stripped, max_chars).trim_end().to_string()
}

/// Clean, drop empties, dedupe case-insensitively keeping the first, cap.
pub fn clean_list(items: &[String], cap: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if out.len() >= cap {
            break;
        }
        let cleaned = clean_item(item, ITEM_MAX_CHARS);
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_lowercase()) {
            out.push(cleaned);
        }
    }
    out
}

/// Enforce every structural rule of a guidance document.
///
/// If all lists end up empty the goal seeds `what_to_change`; if the goal
/// is empty the first `what_to_change` item is copied into it.
pub fn finalize(mut doc: GuidanceDocument) -> GuidanceDocument {
    doc.high_level_goal = clean_item(&doc.high_level_goal, GOAL_MAX_CHARS);
    for field in ListField::ALL {
        let cleaned = clean_list(doc.list(field), field.cap());
        *doc.list_mut(field) = cleaned;
    }

    let lists_empty = ListField::ALL.iter().all(|f| doc.list(*f).is_empty());
    if lists_empty && !doc.high_level_goal.is_empty() {
        let seed = clean_item(&doc.high_level_goal, ITEM_MAX_CHARS);
        doc.what_to_change = vec![seed];
    }
    if doc.high_level_goal.is_empty() {
        if let Some(first) = doc.what_to_change.first() {
            doc.high_level_goal = first.clone();
        }
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn s(v: &[&str]) -> Vec<String> {
        v.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_strip_markers_nested() {
        assert_eq!(strip_markers("- 1. ## Update the handler"), "Update the handler");
        assert_eq!(strip_markers("> * quoted"), "quoted");
        assert_eq!(strip_markers("(2) second"), "second");
        assert_eq!(strip_markers("-dash-word"), "-dash-word");
    }

    #[test]
    fn test_clean_item_removes_bold_and_caps() {
        assert_eq!(clean_item("**Fix**   the\n bug", 100), "Fix the bug");
        assert_eq!(clean_item("abcdef ghi", 7), "abcdef");
    }

    #[test]
    fn test_clean_list_dedupes_case_insensitively() {
        let out = clean_list(&s(&["Run tests", "- run TESTS", "", "Lint"]), 5);
        assert_eq!(out, s(&["Run tests", "Lint"]));
    }

    #[test]
    fn test_finalize_caps_lists() {
        let doc = finalize(GuidanceDocument {
            high_level_goal: "Goal".into(),
            where_to_work: s(&["a", "b", "c", "d"]),
            what_to_change: s(&["a", "b", "c", "d"]),
            how_to_verify: s(&["a", "b", "c"]),
            gotchas: s(&["a", "b", "c"]),
        });
        assert_eq!(doc.where_to_work.len(), 3);
        assert_eq!(doc.what_to_change.len(), 3);
        assert_eq!(doc.how_to_verify.len(), 2);
        assert_eq!(doc.gotchas.len(), 2);
    }

    #[test]
    fn test_finalize_seeds_and_promotes() {
        let seeded = finalize(GuidanceDocument {
            high_level_goal: "## Fix the parser".into(),
            ..GuidanceDocument::default()
        });
        assert_eq!(seeded.high_level_goal, "Fix the parser");
        assert_eq!(seeded.what_to_change, s(&["Fix the parser"]));

        let promoted = finalize(GuidanceDocument {
            what_to_change: s(&["1. Add a guard", "Return early"]),
            ..GuidanceDocument::default()
        });
        assert_eq!(promoted.high_level_goal, "Add a guard");
        assert_eq!(promoted.what_to_change, s(&["Add a guard", "Return early"]));
    }

    fn arb_item() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z ]{0,30}",
            "(- |\\* |1\\. |## |> |\\*\\*)[a-zA-Z ]{0,20}",
            "[A-Z]{1,3}",
            "[a-z]{1,3}",
            ".{0,250}",
        ]
    }

    fn arb_doc() -> impl Strategy<Value = GuidanceDocument> {
        (
            arb_item(),
            proptest::collection::vec(arb_item(), 0..6),
            proptest::collection::vec(arb_item(), 0..6),
            proptest::collection::vec(arb_item(), 0..6),
            proptest::collection::vec(arb_item(), 0..6),
        )
            .prop_map(|(goal, w, c, v, g)| GuidanceDocument {
                high_level_goal: goal,
                where_to_work: w,
                what_to_change: c,
                how_to_verify: v,
                gotchas: g,
            })
    }

    proptest! {
        #[test]
        fn prop_finalize_obeys_caps_and_dedup(doc in arb_doc()) {
            let out = finalize(doc);
            prop_assert!(out.high_level_goal.chars().count() <= GOAL_MAX_CHARS);
            for field in ListField::ALL {
                let items = out.list(field);
                prop_assert!(items.len() <= field.cap());
                let mut seen = HashSet::new();
                for item in items {
                    prop_assert!(!item.is_empty());
                    prop_assert!(item.chars().count() <= ITEM_MAX_CHARS);
                    prop_assert!(seen.insert(item.to_lowercase()));
                }
            }
        }

        #[test]
        fn prop_finalize_is_idempotent(doc in arb_doc()) {
            let once = finalize(doc);
            let twice = finalize(once.clone());
            prop_assert_eq!(once, twice);
        }
    }
}
