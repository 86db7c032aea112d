//! Indentation-based hierarchy parsing.
//!
//! A hierarchy source is an indented text document describing a taxonomy
//! down to leaf image/tag pairs:
//!
//! ```text
//! poses:
//!   standing:
//!     wave.png:
//!       - waving, hand up
//!     SKIP:
//!       - placeholder, never listed
//! ```
//!
//! A line is a *key line* when the next line's trimmed text starts with the
//! leaf marker `-`; the marker line holds the key's tag string. Every other
//! line only contributes to the ancestor stack.
//!
//! ## Algorithm
//!
//! A stack of `(key, indent)` frames tracks ancestry. For each non-blank,
//! non-comment line, frames whose indent is greater than or equal to the
//! line's indent are popped, then the line's key (text before the first `:`)
//! is pushed. Nesting therefore only increases strictly, and a dedent lands
//! on the right sibling or ancestor. The stack depth after a line equals its
//! nesting level.
//!
//! When a key line is found, its category path is the frames between the
//! skip depth and the key itself, adjusted by the source's [`PathRules`].
//! Sections are matched against the `/`-joined adjusted path.
//!
//! Parsing is pure: no I/O, no shared state, deterministic for a given input.

use serde::{Deserialize, Serialize};

use crate::types::CatalogEntry;

const LEAF_MARKER: char = '-';

/// Maps a path substring to a section label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionRule {
    pub key: String,
    pub label: String,
}

/// Path adjustments, applied in fixed order: ignore, remove, prepend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathRules {
    /// Token removed wherever it appears in the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    /// Segments removed by exact name.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    /// Segment inserted at the front of the path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prepend: Option<String>,
}

impl PathRules {
    pub fn is_empty(&self) -> bool {
        self.ignore.is_none() && self.remove.is_empty() && self.prepend.is_none()
    }

    /// Apply the rules to a raw ancestor path.
    pub fn apply(&self, mut path: Vec<String>) -> Vec<String> {
        if let Some(ignore) = &self.ignore {
            path.retain(|segment| segment != ignore);
        }
        if !self.remove.is_empty() {
            path.retain(|segment| !self.remove.contains(segment));
        }
        if let Some(prepend) = &self.prepend {
            path.insert(0, prepend.clone());
        }
        path
    }

    /// Describe the first pair of rules that contradict each other.
    ///
    /// A rule-set conflicts when the same token is both removed and
    /// inserted, or listed under two removal rules.
    pub fn conflict(&self) -> Option<String> {
        if let Some(ignore) = &self.ignore
            && self.remove.contains(ignore)
        {
            return Some(format!("'{ignore}' is both ignored and removed"));
        }
        if let Some(prepend) = &self.prepend {
            if self.remove.contains(prepend) {
                return Some(format!("'{prepend}' is both prepended and removed"));
            }
            if self.ignore.as_ref() == Some(prepend) {
                return Some(format!("'{prepend}' is both prepended and ignored"));
            }
        }
        None
    }
}

/// Per-source parsing parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions<'a> {
    /// Primary type stamped on every entry.
    pub primary_type: &'a str,
    /// Leading ancestor keys dropped from each path.
    pub skip_levels: usize,
    pub sections: &'a [SectionRule],
    pub path_rules: &'a PathRules,
    /// Keys equal to this (any case) are placeholders and never emitted.
    pub skip_sentinel: &'a str,
}

#[derive(Debug)]
struct Frame<'t> {
    key: &'t str,
    indent: usize,
}

/// Ancestor stack keyed by indentation column.
#[derive(Debug, Default)]
struct KeyStack<'t> {
    frames: Vec<Frame<'t>>,
}

impl<'t> KeyStack<'t> {
    /// Pop every frame at or beyond `indent`, then push `key`.
    fn enter(&mut self, key: &'t str, indent: usize) {
        while self.frames.last().is_some_and(|f| f.indent >= indent) {
            self.frames.pop();
        }
        self.frames.push(Frame { key, indent });
    }

    fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Keys above the current one, skipping the first `skip` levels.
    fn ancestors(&self, skip: usize) -> Vec<String> {
        let parents = self.frames.len().saturating_sub(1);
        self.frames[..parents]
            .iter()
            .skip(skip)
            .map(|f| f.key.to_string())
            .collect()
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

fn is_leaf_marker(trimmed: &str) -> bool {
    trimmed.starts_with(LEAF_MARKER)
}

fn key_of(trimmed: &str) -> &str {
    trimmed.split(':').next().unwrap_or(trimmed).trim()
}

/// Parse a hierarchy source into flat catalog entries, in source order.
///
/// Duplicate keys under the same path are emitted as separate entries.
pub fn parse_hierarchy(text: &str, options: &ParseOptions<'_>) -> Vec<CatalogEntry> {
    let lines: Vec<&str> = text.lines().collect();
    let sentinel = options.skip_sentinel.to_lowercase();
    let mut stack = KeyStack::default();
    let mut entries = Vec::new();

    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let key = key_of(trimmed);
        stack.enter(key, indent_of(line));

        // A marker line is a value, never a key of its own
        if is_leaf_marker(trimmed) {
            continue;
        }
        let Some(leaf) = lines
            .get(index + 1)
            .map(|next| next.trim())
            .filter(|next| is_leaf_marker(next))
        else {
            continue;
        };

        let tag_text = leaf[LEAF_MARKER.len_utf8()..].trim();
        if tag_text.is_empty() || key.to_lowercase() == sentinel {
            continue;
        }

        let path = options
            .path_rules
            .apply(stack.ancestors(options.skip_levels));
        let section = match_section(&path, options.sections);

        entries.push(CatalogEntry {
            name: key.to_string(),
            category_path: path,
            tag_text: tag_text.to_string(),
            primary_type: options.primary_type.to_string(),
            section,
        });
    }

    entries
}

/// First section whose key occurs in the `/`-joined path.
fn match_section(path: &[String], sections: &[SectionRule]) -> Option<String> {
    if sections.is_empty() {
        return None;
    }
    let joined = path.join("/");
    sections
        .iter()
        .find(|rule| joined.contains(rule.key.as_str()))
        .map(|rule| rule.label.clone())
}
