//! Gallery configuration module.
//!
//! Handles loading, validating, and merging `gallery.toml`. Stock defaults
//! are overridden by a user config file placed in the data directory.
//!
//! ## Config File Location
//!
//! ```text
//! promptImages/
//! ├── gallery.toml             # Optional, overrides stock defaults
//! ├── gallery-state.json       # Persisted session state (written by the tool)
//! ├── PonyXl-poses.yaml        # Hierarchy sources
//! ├── thumbnails/              # Catalog images, addressed by entry path
//! └── custom/                  # Uploaded custom assets
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # Hierarchy sources, loaded and merged in this order.
//! [[sources]]
//! name = "PonyXl-f-body.yaml"   # File name requested from the source fetcher
//! category = "Female Body"      # Primary type of every entry in this source
//! skip_levels = 0               # Leading path segments to drop
//! order = 4                     # Default display priority
//! sections = [{ key = "body_race", label = "Race" }]
//!
//! [sources.path_rules]
//! ignore = "chara_expression"   # Segment removed anywhere in the path
//! remove = ["misc"]             # Segments removed by exact name
//! prepend = "female"            # Segment inserted at the front
//!
//! [category_order]
//! "Poses" = 150                 # Per-category weight (0 = unset)
//! "Female Body - Race" = 401    # Composite sub-category key
//!
//! [categories]
//! custom = "Custom"             # Always displayed last
//! exclusive = ["Game Characters", "Show Characters"]
//!
//! [text]
//! separator_keyword = "BREAK"
//! skip_sentinel = "SKIP"
//!
//! [upload]
//! destination = "custom"
//! max_attempts = 10
//! interval_ms = 500
//!
//! [persistence]
//! state_file = "gallery-state.json"
//! debounce_ms = 1000
//! ```
//!
//! Config files are sparse: override just the tables you want. Arrays (such
//! as `sources`) replace the stock value entirely. Unknown keys are rejected
//! to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::hierarchy::{ParseOptions, PathRules, SectionRule};
use crate::retry::RetryPolicy;

/// Name of the user config file inside the data directory.
pub const CONFIG_FILENAME: &str = "gallery.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `gallery.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Category-inclusion and display rules.
    pub categories: CategoriesConfig,
    /// Text normalization keywords.
    pub text: TextConfig,
    /// Custom asset intake settings.
    pub upload: UploadConfig,
    /// State persistence settings.
    pub persistence: PersistenceConfig,
    /// User weights per category key (plain or composite). `0` means unset.
    pub category_order: BTreeMap<String, u32>,
    /// Hierarchy sources in load order.
    pub sources: Vec<SourceConfig>,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            categories: CategoriesConfig::default(),
            text: TextConfig::default(),
            upload: UploadConfig::default(),
            persistence: PersistenceConfig::default(),
            category_order: BTreeMap::new(),
            sources: default_sources(),
        }
    }
}

impl GalleryConfig {
    /// Validate config values and reject conflicting per-source rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "sources.name must not be empty".into(),
                ));
            }
            if source.category.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "source {} has an empty category",
                    source.name
                )));
            }
            if source.category == self.categories.custom {
                return Err(ConfigError::Validation(format!(
                    "source {} uses the custom category '{}', which is reserved for uploads",
                    source.name, source.category
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "source {} is listed twice",
                    source.name
                )));
            }
            if let Some(conflict) = source.path_rules.conflict() {
                return Err(ConfigError::Validation(format!(
                    "source {}: conflicting path rules: {conflict}",
                    source.name
                )));
            }
        }
        if self.categories.custom.trim().is_empty() {
            return Err(ConfigError::Validation(
                "categories.custom must not be empty".into(),
            ));
        }
        match self.categories.exclusive.as_slice() {
            [] => {}
            [a, b] if a != b => {}
            _ => {
                return Err(ConfigError::Validation(
                    "categories.exclusive must name exactly two different categories".into(),
                ));
            }
        }
        let keyword = &self.text.separator_keyword;
        if keyword.is_empty() || !keyword.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Err(ConfigError::Validation(
                "text.separator_keyword must be a single word".into(),
            ));
        }
        if self.upload.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "upload.max_attempts must be at least 1".into(),
            ));
        }
        if self.upload.destination.starts_with('/') || self.upload.destination.contains("..") {
            return Err(ConfigError::Validation(
                "upload.destination must be a relative path without '..'".into(),
            ));
        }
        Ok(())
    }

    /// Retry policy for the post-upload existence check.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.upload.max_attempts,
            interval: Duration::from_millis(self.upload.interval_ms),
        }
    }
}

/// One hierarchy source and the rules used to parse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Identifier passed to the source fetcher (usually a file name).
    pub name: String,
    /// Primary type assigned to every entry of this source.
    pub category: String,
    /// Number of leading ancestor keys dropped from each category path.
    #[serde(default)]
    pub skip_levels: usize,
    /// Default display priority. Section weights are derived from it.
    #[serde(default)]
    pub order: u32,
    /// Ordered `(path substring, label)` pairs; first match wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionRule>,
    /// Declarative path adjustments.
    #[serde(default, skip_serializing_if = "PathRules::is_empty")]
    pub path_rules: PathRules,
}

impl SourceConfig {
    /// Parser parameters for this source.
    pub fn parse_options<'a>(&'a self, skip_sentinel: &'a str) -> ParseOptions<'a> {
        ParseOptions {
            primary_type: &self.category,
            skip_levels: self.skip_levels,
            sections: &self.sections,
            path_rules: &self.path_rules,
            skip_sentinel,
        }
    }
}

/// Category-level display and selection rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoriesConfig {
    /// Label of the custom-asset category. Always sorts last.
    pub custom: String,
    /// Two persona categories that can't be included together.
    pub exclusive: Vec<String>,
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            custom: "Custom".to_string(),
            exclusive: vec!["Game Characters".to_string(), "Show Characters".to_string()],
        }
    }
}

/// Keywords used by the parser and the text normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextConfig {
    /// Word replaced by a sentence break when cleaning tags.
    pub separator_keyword: String,
    /// Entry key that marks a placeholder; such entries are never emitted.
    pub skip_sentinel: String,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            separator_keyword: "BREAK".to_string(),
            skip_sentinel: "SKIP".to_string(),
        }
    }
}

/// Custom asset intake settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Destination hint passed to the storage collaborator.
    pub destination: String,
    /// Existence checks before an upload is declared failed.
    pub max_attempts: u32,
    /// Delay between checks, in milliseconds.
    pub interval_ms: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            destination: "custom".to_string(),
            max_attempts: 10,
            interval_ms: 500,
        }
    }
}

/// State persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceConfig {
    /// State file name inside the data directory.
    pub state_file: String,
    /// Coalescing window for cosmetic state changes, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_file: "gallery-state.json".to_string(),
            debounce_ms: 1000,
        }
    }
}

impl PersistenceConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn source(name: &str, category: &str, order: u32) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        category: category.to_string(),
        skip_levels: 0,
        order,
        sections: Vec::new(),
        path_rules: PathRules::default(),
    }
}

/// The officially supported source packages.
fn default_sources() -> Vec<SourceConfig> {
    let mut body = source("PonyXl-f-body.yaml", "Female Body", 4);
    body.sections = vec![
        SectionRule {
            key: "body_race".to_string(),
            label: "Race".to_string(),
        },
        SectionRule {
            key: "body_form".to_string(),
            label: "Build".to_string(),
        },
    ];
    let mut expressions = source("PonyXl-expressions.yaml", "Expressions", 6);
    expressions.path_rules.ignore = Some("chara_expression".to_string());

    vec![
        source("PonyXl-artstyles.yaml", "Art Styles", 1),
        source("PonyXl-game_persona.yaml", "Game Characters", 2),
        source("PonyXl-show_persona.yaml", "Show Characters", 3),
        body,
        source("PonyXl-poses.yaml", "Poses", 5),
        expressions,
        source("PonyXl-scenes.yaml", "Scenes", 7),
    ]
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (including arrays) replace base values.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `gallery.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file doesn't exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `gallery.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<GalleryConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `gallery.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Prompt Gallery Configuration
# ===========================
# All settings are optional. Values shown below are the defaults.
# Place this file as gallery.toml in the data directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Categories
# ---------------------------------------------------------------------------
[categories]
# Label of the category holding uploaded images. Always displayed last.
custom = "Custom"

# Two persona categories that can't both be included in a random prompt.
# Including one excludes the other. Use [] to disable.
exclusive = ["Game Characters", "Show Characters"]

# ---------------------------------------------------------------------------
# Text
# ---------------------------------------------------------------------------
[text]
# Word turned into a sentence break ("a BREAK b" -> "a. b").
separator_keyword = "BREAK"

# Entries with this key (any case) are placeholders and never listed.
skip_sentinel = "SKIP"

# ---------------------------------------------------------------------------
# Custom image uploads
# ---------------------------------------------------------------------------
[upload]
# Subfolder of the data directory receiving uploads.
destination = "custom"

# An upload is only accepted once the stored file can be found.
# Check up to max_attempts times, interval_ms apart.
max_attempts = 10
interval_ms = 500

# ---------------------------------------------------------------------------
# Persistence
# ---------------------------------------------------------------------------
[persistence]
# State file inside the data directory.
state_file = "gallery-state.json"

# Cosmetic changes (sort direction, open sections) are coalesced for
# this long before being written. Uploads and resets are written at once.
debounce_ms = 1000

# ---------------------------------------------------------------------------
# Category order
# ---------------------------------------------------------------------------
# Weight per category key; lower sorts first, 0 means "use default".
# Sub-categories use composite keys: "<Parent> - <Section>".
# Defaults are order * 100 for a source, order * 100 + n for its n-th section.
[category_order]
# "Poses" = 150
# "Female Body - Race" = 401

# ---------------------------------------------------------------------------
# Hierarchy sources, loaded in this order
# ---------------------------------------------------------------------------
# Each source may declare:
#   skip_levels = 0          leading path segments to drop
#   sections = [{ key = "body_race", label = "Race" }]
#   path_rules = { ignore = "x", remove = ["y"], prepend = "z" }
[[sources]]
name = "PonyXl-artstyles.yaml"
category = "Art Styles"
skip_levels = 0
order = 1

[[sources]]
name = "PonyXl-game_persona.yaml"
category = "Game Characters"
skip_levels = 0
order = 2

[[sources]]
name = "PonyXl-show_persona.yaml"
category = "Show Characters"
skip_levels = 0
order = 3

[[sources]]
name = "PonyXl-f-body.yaml"
category = "Female Body"
skip_levels = 0
order = 4
sections = [
    { key = "body_race", label = "Race" },
    { key = "body_form", label = "Build" },
]

[[sources]]
name = "PonyXl-poses.yaml"
category = "Poses"
skip_levels = 0
order = 5

[[sources]]
name = "PonyXl-expressions.yaml"
category = "Expressions"
skip_levels = 0
order = 6
path_rules = { ignore = "chara_expression" }

[[sources]]
name = "PonyXl-scenes.yaml"
category = "Scenes"
skip_levels = 0
order = 7
"##
}
