//! Stage 1: the first JSON object embedded in the text.

use serde_json::{Map, Value};

use super::{GuidanceDocument, ListField};

enum Target {
    /// `canonical` is set for the `high_level_goal` spellings, which win
    /// over aliases regardless of key order.
    Goal { canonical: bool },
    List(ListField),
}

fn target_for(key: &str) -> Option<Target> {
    let key: String = key
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();
    let target = match key.as_str() {
        "high_level_goal" | "highlevelgoal" => Target::Goal { canonical: true },
        "goal" | "summary" | "objective" => Target::Goal { canonical: false },
        "where_to_work" | "wheretowork" | "where" | "files" | "locations" => {
            Target::List(ListField::WhereToWork)
        }
        "what_to_change" | "whattochange" | "what" | "changes" | "steps" => {
            Target::List(ListField::WhatToChange)
        }
        "how_to_verify" | "howtoverify" | "verify" | "verification" | "tests" | "testing" => {
            Target::List(ListField::HowToVerify)
        }
        "gotchas" | "pitfalls" | "caveats" | "warnings" | "risks" => Target::List(ListField::Gotchas),
        _ => return None,
    };
    Some(target)
}

/// Byte range of the first balanced `{...}` block, honoring JSON strings.
pub fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => ["text", "description", "item", "detail"]
            .iter()
            .find_map(|k| map.get(*k).and_then(scalar_text)),
        _ => None,
    }
}

fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::String(s) => s.lines().map(str::to_string).collect(),
        other => scalar_text(other).into_iter().collect(),
    }
}

fn goal_text(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(scalar_text),
        other => scalar_text(other),
    }
}

fn unwrap_single(map: Map<String, Value>) -> Map<String, Value> {
    if map.len() == 1 {
        if let Some((key, Value::Object(inner))) = map.iter().next() {
            if target_for(key).is_none() {
                return inner.clone();
            }
        }
    }
    map
}

/// Parse the first JSON object in `text` into a guidance document.
///
/// `None` when there is no object, it does not parse, or none of its keys
/// name a guidance field.
pub fn parse(text: &str) -> Option<GuidanceDocument> {
    let block = first_object(text)?;
    let map = match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => unwrap_single(map),
        _ => return None,
    };

    let mut doc = GuidanceDocument::default();
    let mut recognized = false;
    let mut goal_from_canonical = false;
    for (key, value) in &map {
        match target_for(key) {
            Some(Target::Goal { canonical }) => {
                recognized = true;
                if goal_from_canonical {
                    continue;
                }
                let text = goal_text(value).unwrap_or_default();
                if canonical && !text.trim().is_empty() {
                    doc.high_level_goal = text;
                    goal_from_canonical = true;
                } else if doc.high_level_goal.is_empty() {
                    doc.high_level_goal = text;
                }
            }
            Some(Target::List(field)) => {
                recognized = true;
                doc.list_mut(field).extend(list_items(value));
            }
            None => {}
        }
    }
    recognized.then_some(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_object_skips_braces_in_strings() {
        let text = r#"prefix {"a": "x } y", "b": {"c": 1}} trailing }"#;
        assert_eq!(
            first_object(text),
            Some(r#"{"a": "x } y", "b": {"c": 1}}"#)
        );
        assert_eq!(first_object("no json here"), None);
        assert_eq!(first_object("{ unbalanced"), None);
    }

    #[test]
    fn test_parse_canonical_keys() {
        let doc = parse(
            r#"{"high_level_goal":"Fix it","where_to_work":["a.py"],"what_to_change":["x"],"how_to_verify":["pytest"],"gotchas":[]}"#,
        )
        .unwrap();
        assert_eq!(doc.high_level_goal, "Fix it");
        assert_eq!(doc.where_to_work, vec!["a.py".to_string()]);
        assert_eq!(doc.how_to_verify, vec!["pytest".to_string()]);
        assert!(doc.gotchas.is_empty());
    }

    #[test]
    fn test_parse_unwraps_and_maps_aliases() {
        let doc = parse(
            r#"Here you go: {"guidance": {"Goal": "Add caching", "Files": ["cache.py"], "steps": "one\ntwo", "Pitfalls": [{"text": "stale reads"}]}}"#,
        )
        .unwrap();
        assert_eq!(doc.high_level_goal, "Add caching");
        assert_eq!(doc.where_to_work, vec!["cache.py".to_string()]);
        assert_eq!(doc.what_to_change, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(doc.gotchas, vec!["stale reads".to_string()]);
    }

    #[test]
    fn test_canonical_goal_beats_alias() {
        let doc = parse(r#"{"goal": "A", "high_level_goal": "B"}"#).unwrap();
        assert_eq!(doc.high_level_goal, "B");
        let doc = parse(r#"{"summary": "A", "high_level_goal": ""}"#).unwrap();
        assert_eq!(doc.high_level_goal, "A");
    }

    #[test]
    fn test_parse_falls_through() {
        assert!(parse("{not json}").is_none());
        assert!(parse(r#"{"unrelated": 1}"#).is_none());
        assert!(parse("plain text").is_none());
    }
}
