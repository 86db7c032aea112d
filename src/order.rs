//! Category display order.
//!
//! Categories are ordered by user-configurable integer weights. Lower weights
//! sort first; a weight of `0` means "unset" and never takes part in the
//! comparison. Keys without a positive weight follow every weighted key, in
//! lexicographic order. The custom category always comes last.
//!
//! Sub-categories are tracked under composite keys (`"Female Body - Race"`,
//! see [`naming::composite_key`]). A composite key is an opaque string: it
//! does not inherit its parent's weight, so it has to be registered with a
//! weight of its own before the first display or it drifts to the tail.
//! [`CategoryOrder::register_source_defaults`] does that for every section
//! declared in the configuration.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::config::SourceConfig;
use crate::naming;

/// Weight spacing between consecutive sources, leaving room for sections.
const SOURCE_WEIGHT_STRIDE: u32 = 100;

/// Resolved ordering over category keys.
#[derive(Debug, Clone)]
pub struct CategoryOrder {
    weights: BTreeMap<String, u32>,
    custom_key: String,
}

impl CategoryOrder {
    pub fn new(custom_key: impl Into<String>) -> Self {
        Self {
            weights: BTreeMap::new(),
            custom_key: custom_key.into(),
        }
    }

    /// Start from explicit user weights.
    pub fn with_weights(weights: BTreeMap<String, u32>, custom_key: impl Into<String>) -> Self {
        Self {
            weights,
            custom_key: custom_key.into(),
        }
    }

    pub fn custom_key(&self) -> &str {
        &self.custom_key
    }

    /// Weight of `key`, `0` when absent.
    pub fn weight(&self, key: &str) -> u32 {
        self.weights.get(key).copied().unwrap_or(0)
    }

    /// Register `weight` for `key` unless the key is already known.
    ///
    /// An explicit `0` counts as known: it pins the key to the unsorted tail.
    pub fn register_default(&mut self, key: impl Into<String>, weight: u32) -> bool {
        let key = key.into();
        if self.weights.contains_key(&key) {
            return false;
        }
        self.weights.insert(key, weight);
        true
    }

    /// Register default weights for every source and its sections.
    ///
    /// A source of order `n` gets `n * 100`; its `i`-th section (0-based)
    /// gets `n * 100 + i + 1` under the composite key `"<Type> - <Label>"`.
    pub fn register_source_defaults(&mut self, sources: &[SourceConfig]) {
        for source in sources {
            let base = source.order.saturating_mul(SOURCE_WEIGHT_STRIDE);
            self.register_default(source.category.clone(), base);
            for (i, section) in source.sections.iter().enumerate() {
                let key = naming::composite_key(&source.category, &section.label);
                self.register_default(key, base.saturating_add(i as u32 + 1));
            }
        }
    }

    /// Keys with a positive weight, sorted by (weight, key).
    pub fn resolved(&self) -> Vec<&str> {
        let mut weighted: Vec<(&str, u32)> = self
            .weights
            .iter()
            .filter(|(_, w)| **w > 0)
            .map(|(k, w)| (k.as_str(), *w))
            .collect();
        weighted.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        weighted.into_iter().map(|(k, _)| k).collect()
    }

    /// Sort display keys: resolved keys by index, then the rest
    /// lexicographically, then the custom key.
    pub fn sort_keys<S: AsRef<str>>(&self, keys: &mut [S]) {
        let index: HashMap<&str, usize> = self
            .resolved()
            .into_iter()
            .enumerate()
            .map(|(i, k)| (k, i))
            .collect();
        keys.sort_by(|a, b| self.compare_with(&index, a.as_ref(), b.as_ref()));
    }

    fn compare_with(&self, index: &HashMap<&str, usize>, a: &str, b: &str) -> Ordering {
        let a_custom = a == self.custom_key;
        let b_custom = b == self.custom_key;
        if a_custom || b_custom {
            return a_custom.cmp(&b_custom).then_with(|| a.cmp(b));
        }
        match (index.get(a), index.get(b)) {
            (Some(ia), Some(ib)) => ia.cmp(ib),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}
