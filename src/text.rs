//! Tag text normalization and combination.
//!
//! Tag strings come from hand-written hierarchy sources and from prompts
//! embedded in uploaded images, so their punctuation is inconsistent:
//! doubled commas, stray spaces before periods, trailing separators. Every
//! tag string is run through [`Normalizer::clean`] before it is copied or
//! combined.
//!
//! ## Rules
//!
//! 1. The separator keyword (`BREAK` by default, any case, whole word) becomes
//!    a period: `"a BREAK b"` → `"a. b"`.
//! 2. Whitespace before `,` or `.` is removed and adjacent punctuation
//!    collapses to one mark: a run containing a period becomes `.`, otherwise
//!    `,`. So `"a,, b"` → `"a, b"` and `"a, . b"` → `"a. b"`.
//! 3. Exactly one space follows every `,` or `.` that is not at the end. A
//!    period between two digits is a decimal point and is left alone, so
//!    prompt weights like `(smile:1.2)` survive.
//! 4. Leading and trailing commas and whitespace are trimmed.
//!
//! `clean` is idempotent: `clean(clean(x)) == clean(x)`.
//!
//! ## Combination
//!
//! [`Normalizer::combine`] joins two cleaned strings sentence-style (single
//! space) when the first ends with a period, list-style (`", "`) otherwise.

use regex::Regex;
use std::sync::OnceLock;

/// Default sentence-break keyword.
pub const DEFAULT_SEPARATOR_KEYWORD: &str = "BREAK";

/// Text cleaner bound to one separator keyword.
#[derive(Debug, Clone)]
pub struct Normalizer {
    keyword: Regex,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR_KEYWORD)
    }
}

impl Normalizer {
    /// Build a normalizer for `keyword`, matched case-insensitively as a word.
    pub fn new(keyword: &str) -> Self {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
        Self {
            keyword: Regex::new(&pattern).expect("escaped keyword is a valid pattern"),
        }
    }

    /// Normalize punctuation and spacing of a tag string.
    pub fn clean(&self, text: &str) -> String {
        let replaced = self.keyword.replace_all(text, ".");
        let collapsed = collapse_punctuation(&replaced);
        space_after_punctuation(&collapsed)
            .trim_matches(|c: char| c == ',' || c.is_whitespace())
            .to_string()
    }

    /// Append `addition` to `existing`, both cleaned first.
    pub fn combine(&self, existing: &str, addition: &str) -> String {
        let existing = self.clean(existing);
        let addition = self.clean(addition);
        if existing.is_empty() {
            return addition;
        }
        if addition.is_empty() {
            return existing;
        }
        if existing.ends_with('.') {
            format!("{existing} {addition}")
        } else {
            format!("{existing}, {addition}")
        }
    }
}

fn default_normalizer() -> &'static Normalizer {
    static DEFAULT: OnceLock<Normalizer> = OnceLock::new();
    DEFAULT.get_or_init(Normalizer::default)
}

/// [`Normalizer::clean`] with the default keyword.
pub fn clean(text: &str) -> String {
    default_normalizer().clean(text)
}

/// [`Normalizer::combine`] with the default keyword.
pub fn combine(existing: &str, addition: &str) -> String {
    default_normalizer().combine(existing, addition)
}

fn is_mark(c: char) -> bool {
    c == ',' || c == '.'
}

/// Drop whitespace before punctuation and merge punctuation runs.
fn collapse_punctuation(text: &str) -> Vec<char> {
    let mut out: Vec<char> = Vec::with_capacity(text.len());
    for c in text.chars() {
        if !is_mark(c) {
            out.push(c);
            continue;
        }
        while out.last().is_some_and(|p| p.is_whitespace()) {
            out.pop();
        }
        match out.last().copied() {
            // A period wins over a comma in the same run
            Some(',') => {
                if let Some(last) = out.last_mut() {
                    *last = c;
                }
            }
            Some('.') => {}
            _ => out.push(c),
        }
    }
    out
}

/// Put exactly one space after each mark that isn't last or a decimal point.
fn space_after_punctuation(chars: &[char]) -> String {
    let mut result = String::with_capacity(chars.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        result.push(c);
        i += 1;
        if !is_mark(c) || is_decimal_point(chars, i - 1) {
            continue;
        }
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if i < chars.len() {
            result.push(' ');
        }
    }
    result
}

fn is_decimal_point(chars: &[char], at: usize) -> bool {
    chars[at] == '.'
        && at > 0
        && chars[at - 1].is_ascii_digit()
        && chars.get(at + 1).is_some_and(|c| c.is_ascii_digit())
}
