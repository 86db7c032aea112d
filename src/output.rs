//! CLI output formatting.
//!
//! # Display Contract
//!
//! Every group and item follows the same two-level pattern:
//!
//! 1. **Header line**: positional index + name (+ count for groups)
//! 2. **Context lines**: indented `Tags:`, `Path:`, `Thumbnail:`
//!
//! ## List
//!
//! ```text
//! 001 Poses (2 images) [included]
//!     001 salute.png
//!         Tags: saluting
//!         Path: poses/standing
//!     002 wave.png
//!         Tags: waving, hand up
//!         Path: poses/standing
//! 002 Race (1 image) [Female Body - Race]
//!     001 elf.png
//!         Tags: elf ears
//!         Path: body/body_race
//! 003 Custom (0 images)
//! ```
//!
//! Sub-category groups show their composite key in brackets, which is also
//! the name that opens or closes them. Closed groups show their header with
//! `[closed]` and no items.
//!
//! ## Load report
//!
//! ```text
//! Loaded 3 sources, 120 images
//!     Missing: PonyXl-scenes.yaml
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::backend::Delivery;
use crate::catalog::{Group, LoadReport};
use crate::composer::ComposeOutcome;
use crate::gallery::AddedAsset;
use crate::order::CategoryOrder;
use crate::registry::{EnrichOutcome, UpsertOutcome};
use crate::state::GalleryState;
use crate::types::GalleryItem;

const MAX_TAGS_LEN: usize = 100;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Truncate to `max` characters, appending `...` if truncated.
fn truncate_tags(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}

// ============================================================================
// Groups
// ============================================================================

/// Format display groups.
///
/// `thumbnail` looks up a thumbnail path for an item's resolved reference;
/// pass `|_| None` to omit thumbnail lines.
pub fn format_groups<F>(groups: &[Group], state: &GalleryState, thumbnail: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut lines = Vec::new();
    for (gi, group) in groups.iter().enumerate() {
        let mut header = format!(
            "{} {} ({})",
            format_index(gi + 1),
            group.label,
            plural(group.items.len(), "image", "images")
        );
        let include_key = if group.is_custom {
            group.label.as_str()
        } else {
            group
                .items
                .first()
                .and_then(|item| match item {
                    GalleryItem::Catalog(e) => Some(e.primary_type.as_str()),
                    GalleryItem::Custom(_) => None,
                })
                .unwrap_or(group.label.as_str())
        };
        if group.order_key != group.label {
            header.push_str(&format!(" [{}]", group.order_key));
        }
        if state.is_included(include_key) {
            header.push_str(" [included]");
        }
        let open = state.is_section_open(&group.order_key);
        if !open {
            header.push_str(" [closed]");
        }
        lines.push(header);
        if !open {
            continue;
        }

        for (ii, item) in group.items.iter().enumerate() {
            lines.push(format!("{}{} {}", indent(1), format_index(ii + 1), item.name()));
            let tags = item.tags();
            if !tags.is_empty() {
                lines.push(format!(
                    "{}Tags: {}",
                    indent(2),
                    truncate_tags(tags, MAX_TAGS_LEN)
                ));
            }
            match item {
                GalleryItem::Catalog(e) if !e.category_path.is_empty() => {
                    lines.push(format!("{}Path: {}", indent(2), e.category_path.join("/")));
                }
                GalleryItem::Custom(a) => {
                    lines.push(format!("{}Stored: {}", indent(2), a.storage_ref));
                }
                _ => {}
            }
            if let Some(thumb) = thumbnail(&item.resolved_ref()) {
                lines.push(format!("{}Thumbnail: {}", indent(2), thumb));
            }
        }
    }
    lines
}

pub fn print_groups<F>(groups: &[Group], state: &GalleryState, thumbnail: F)
where
    F: Fn(&str) -> Option<String>,
{
    for line in format_groups(groups, state, thumbnail) {
        println!("{}", line);
    }
}

// ============================================================================
// Load report
// ============================================================================

pub fn format_load_report(report: &LoadReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Loaded {}, {}",
        plural(report.loaded.len(), "source", "sources"),
        plural(report.entries, "image", "images")
    )];
    for name in &report.missing {
        lines.push(format!("{}Missing: {}", indent(1), name));
    }
    for name in &report.skipped {
        lines.push(format!("{}Skipped (missing earlier): {}", indent(1), name));
    }
    lines
}

pub fn print_load_report(report: &LoadReport) {
    for line in format_load_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Category order
// ============================================================================

/// Weighted category keys in display order, with their weights.
pub fn format_category_order(order: &CategoryOrder) -> Vec<String> {
    let mut lines = vec!["Category order:".to_string()];
    for (i, key) in order.resolved().into_iter().enumerate() {
        lines.push(format!(
            "{}{} {} ({})",
            indent(1),
            format_index(i + 1),
            key,
            order.weight(key)
        ));
    }
    lines
}

pub fn print_category_order(order: &CategoryOrder) {
    for line in format_category_order(order) {
        println!("{}", line);
    }
}

// ============================================================================
// Uploads
// ============================================================================

pub fn format_added_asset(added: &AddedAsset) -> Vec<String> {
    let verb = match added.upsert {
        UpsertOutcome::Added => "Added",
        UpsertOutcome::Updated => "Updated",
    };
    let mut lines = vec![format!("{} {}", verb, added.asset.name)];
    lines.push(format!("{}Stored: {}", indent(1), added.asset.storage_ref));
    let tags = match &added.enrichment {
        EnrichOutcome::Tagged(tags) => truncate_tags(tags, MAX_TAGS_LEN),
        EnrichOutcome::NoMetadata => "(none found)".to_string(),
        EnrichOutcome::Failed(reason) => format!("(unreadable: {reason})"),
    };
    lines.push(format!("{}Tags: {}", indent(1), tags));
    lines
}

pub fn print_added_asset(added: &AddedAsset) {
    for line in format_added_asset(added) {
        println!("{}", line);
    }
}

// ============================================================================
// Random prompt
// ============================================================================

pub fn format_compose_outcome(outcome: &ComposeOutcome, delivery: Option<Delivery>) -> Vec<String> {
    match outcome {
        ComposeOutcome::NoCategoriesSelected => {
            vec!["No categories selected (use `include <CATEGORY>`)".to_string()]
        }
        ComposeOutcome::NoImagesFound => {
            vec!["No images found in the included categories".to_string()]
        }
        ComposeOutcome::Composed { picks, .. } => {
            let mut lines = vec![format!(
                "Random prompt from {}",
                plural(picks.len(), "category", "categories")
            )];
            for (i, pick) in picks.iter().enumerate() {
                lines.push(format!(
                    "{}{} {}: {}",
                    indent(1),
                    format_index(i + 1),
                    pick.category,
                    pick.name
                ));
            }
            if let Some(Delivery::DeliveredToTarget) = delivery {
                lines.push(format!("{}Written to target", indent(1)));
            }
            lines
        }
    }
}

/// Written to stderr: with no target the prompt itself goes to stdout.
pub fn print_compose_outcome(outcome: &ComposeOutcome, delivery: Option<Delivery>) {
    for line in format_compose_outcome(outcome, delivery) {
        eprintln!("{}", line);
    }
}
