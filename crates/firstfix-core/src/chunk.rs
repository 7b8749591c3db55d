//! Role-aware file chunker.
//!
//! Splits a file's text into [`Fragment`]s using the file's role, inferred
//! from its path, and lightweight structural cues:
//!
//! | Role | Boundaries | Kind |
//! |------|------------|------|
//! | Markdown (`*.md`, `README`, `CONTRIBUTING`) | `#`..`######` headings | `doc` |
//! | Source (Python, Rust, JS/TS, Go) | top-level function/type declarations | `code` |
//! | Build/run descriptor (`Makefile`, `Dockerfile`, `pyproject.toml`, ...) | none | `config` |
//! | Anything under `test/` or `tests/` | none | `test` |
//! | Everything else | none | `doc` |
//!
//! # Algorithm
//!
//! 1. Scan lines and record the index of every boundary marker, capturing
//!    the declared name (or heading title) when present.
//! 2. Prepend a boundary at line 0 when the first marker is later, so a
//!    preamble (imports, intro prose) is not lost.
//! 3. Append a sentinel boundary at end-of-file.
//! 4. Emit one fragment per consecutive boundary pair whose trimmed text
//!    is non-empty.
//! 5. With no markers at all, emit exactly one fragment spanning the file.
//!
//! Malformed input never errors; the worst case is one large fragment.
//!
//! # Example
//!
//! ```rust
//! use firstfix_core::chunk::chunk_path;
//!
//! let frags = chunk_path("app/views.py", "import os\n\ndef index():\n    return 'ok'\n");
//! assert_eq!(frags.len(), 2);
//! assert_eq!(frags[1].symbol.as_deref(), Some("index"));
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

use crate::models::{Fragment, FragmentKind};

/// Source languages with declaration-boundary splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    Rust,
    JavaScript,
    Go,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase())?;
        match ext.as_str() {
            "py" => Some(Language::Python),
            "rs" => Some(Language::Rust),
            "js" | "jsx" | "mjs" | "ts" | "tsx" => Some(Language::JavaScript),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::Rust => "rust",
            Language::JavaScript => "javascript",
            Language::Go => "go",
        }
    }

    fn declarations(&self) -> &'static [Regex] {
        match self {
            Language::Python => &PYTHON_DECLS,
            Language::Rust => &RUST_DECLS,
            Language::JavaScript => &JS_DECLS,
            Language::Go => &GO_DECLS,
        }
    }
}

/// How a file is chunked, decided from its path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Markdown,
    Source(Language),
    Descriptor,
    Test,
    Other,
}

static PYTHON_DECLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(?:async\s+)?def\s+(\w+)\s*\(").unwrap(),
        Regex::new(r"^class\s+(\w+)\s*[:(]").unwrap(),
    ]
});

static RUST_DECLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![Regex::new(
        r"^(?:pub(?:\([^)]*\))?\s+)?(?:(?:async|unsafe|const)\s+)*(?:fn|struct|enum|trait|mod|impl)\b(?:<[^>]*>)?\s+(\w+)",
    )
    .unwrap()]
});

static JS_DECLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\*?\s+(\w+)").unwrap(),
        Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)").unwrap(),
    ]
});

static GO_DECLS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"^func\s+(?:\([^)]*\)\s*)?(\w+)").unwrap(),
        Regex::new(r"^type\s+(\w+)\s+(?:struct|interface)\b").unwrap(),
    ]
});

static MD_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+(.*)$").unwrap());

static TEST_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(^|/)tests?/").unwrap());

const MARKDOWN_NAMES: &[&str] = &["readme", "contributing"];

const DESCRIPTOR_NAMES: &[&str] = &[
    "makefile",
    "dockerfile",
    "requirements.txt",
    "pyproject.toml",
    "setup.cfg",
    "package.json",
    "cargo.toml",
    "go.mod",
];

const ENTRYPOINT_NAMES: &[&str] = &[
    "app.py", "wsgi.py", "manage.py", "main.py", "main.rs", "lib.rs", "main.go", "index.js",
    "index.ts", "server.js",
];

fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_ascii_lowercase()
}

/// True for paths under a `test/` or `tests/` directory.
pub fn is_test_path(path: &str) -> bool {
    TEST_PATH.is_match(path)
}

/// Infer a file's chunking role from its path.
///
/// Checked in order: markdown, known source language, build/run
/// descriptor, test directory, then everything else.
pub fn infer_role(path: &str) -> FileRole {
    let name = file_name(path);
    if name.ends_with(".md") || name.ends_with(".markdown") || MARKDOWN_NAMES.contains(&name.as_str())
    {
        return FileRole::Markdown;
    }
    if let Some(lang) = Language::from_path(&name) {
        return FileRole::Source(lang);
    }
    if DESCRIPTOR_NAMES.contains(&name.as_str()) {
        return FileRole::Descriptor;
    }
    if is_test_path(path) {
        return FileRole::Test;
    }
    FileRole::Other
}

/// Chunk a file, inferring its role from `path`.
pub fn chunk_path(path: &str, text: &str) -> Vec<Fragment> {
    chunk_file(path, text, infer_role(path))
}

/// Split `text` into fragments according to `role`.
///
/// Every returned fragment carries `path`. Files without boundary
/// markers, and whole-file roles, yield exactly one fragment.
pub fn chunk_file(path: &str, text: &str, role: FileRole) -> Vec<Fragment> {
    let mut tags = BTreeSet::new();
    if is_test_path(path) {
        tags.insert("test".to_string());
    }
    if ENTRYPOINT_NAMES.contains(&file_name(path).as_str()) {
        tags.insert("entrypoint".to_string());
    }

    match role {
        FileRole::Markdown => {
            let markers = markdown_markers(text);
            structural_split(path, text, FragmentKind::Doc, &tags, markers)
        }
        FileRole::Source(lang) => {
            tags.insert(format!("language:{}", lang.name()));
            let markers = declaration_markers(text, lang);
            structural_split(path, text, FragmentKind::Code, &tags, markers)
        }
        FileRole::Descriptor => vec![whole_file(path, text, FragmentKind::Config, &tags)],
        FileRole::Test => vec![whole_file(path, text, FragmentKind::Test, &tags)],
        FileRole::Other => vec![whole_file(path, text, FragmentKind::Doc, &tags)],
    }
}

/// Heading lines outside fenced code blocks, with their titles.
fn markdown_markers(text: &str) -> Vec<(usize, Option<String>)> {
    let mut markers = Vec::new();
    let mut in_fence = false;
    for (i, line) in text.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = MD_HEADING.captures(line) {
            let title = caps[1].trim().trim_end_matches('#').trim();
            let symbol = (!title.is_empty()).then(|| title.to_string());
            markers.push((i, symbol));
        }
    }
    markers
}

fn declaration_markers(text: &str, lang: Language) -> Vec<(usize, Option<String>)> {
    let decls = lang.declarations();
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            decls
                .iter()
                .find_map(|re| re.captures(line))
                .map(|caps| (i, caps.get(1).map(|m| m.as_str().to_string())))
        })
        .collect()
}

fn structural_split(
    path: &str,
    text: &str,
    kind: FragmentKind,
    tags: &BTreeSet<String>,
    markers: Vec<(usize, Option<String>)>,
) -> Vec<Fragment> {
    if markers.is_empty() {
        return vec![whole_file(path, text, kind, tags)];
    }

    let lines: Vec<&str> = text.lines().collect();
    let mut bounds = Vec::with_capacity(markers.len() + 2);
    if markers[0].0 != 0 {
        bounds.push((0, None));
    }
    bounds.extend(markers);
    bounds.push((lines.len(), None));

    let mut fragments = Vec::new();
    for pair in bounds.windows(2) {
        let (start, symbol) = (pair[0].0, &pair[0].1);
        let end = pair[1].0;
        if start >= end {
            continue;
        }
        let body = lines[start..end].join("\n");
        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }
        fragments.push(Fragment {
            path: path.to_string(),
            start_line: start + 1,
            end_line: end,
            kind,
            text: trimmed.to_string(),
            symbol: symbol.clone(),
            tags: tags.clone(),
        });
    }

    if fragments.is_empty() {
        fragments.push(whole_file(path, text, kind, tags));
    }
    fragments
}

fn whole_file(path: &str, text: &str, kind: FragmentKind, tags: &BTreeSet<String>) -> Fragment {
    Fragment {
        path: path.to_string(),
        start_line: 1,
        end_line: text.lines().count().max(1),
        kind,
        text: text.to_string(),
        symbol: None,
        tags: tags.clone(),
    }
}

/// Split text into embedding-safe pieces of at most `max_chars` characters.
///
/// Each cut lands on the last newline at or before the limit, or hard-cuts
/// at the limit when the window has no usable newline. Pieces are trimmed
/// and empty pieces dropped.
pub fn split_for_embedding(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut remaining = text;

    while let Some((limit, _)) = remaining.char_indices().nth(max_chars) {
        let split_at = match remaining[..limit].rfind('\n') {
            Some(pos) if pos > 0 => pos,
            _ => snap_to_char_boundary(remaining, limit),
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }

    let tail = remaining.trim();
    if !tail.is_empty() {
        pieces.push(tail.to_string());
    }
    pieces
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}
