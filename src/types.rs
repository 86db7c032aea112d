//! Shared record types used across the catalog pipeline.
//!
//! These types are produced by the parser and the registry, grouped by the
//! catalog store, and serialized into the persisted gallery state. They must
//! stay identical across all modules.

use serde::{Deserialize, Serialize};

/// One leaf of a hierarchy source: an image name with its tag string.
///
/// Created by [`parse_hierarchy`](crate::hierarchy::parse_hierarchy) and
/// immutable afterwards. `name` is only unique within its category path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Image key as written in the source (e.g. `wave.png`)
    pub name: String,
    /// Ancestor keys between the skip depth and the entry's own key
    pub category_path: Vec<String>,
    /// Tag string from the leaf marker line
    pub tag_text: String,
    /// Category of the source this entry came from (e.g. "Poses")
    pub primary_type: String,
    /// Human-readable section label, when a section rule matched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl CatalogEntry {
    /// Storage-relative reference of the entry's image: path segments
    /// followed by the name, joined with `/`.
    pub fn image_ref(&self) -> String {
        if self.category_path.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.category_path.join("/"), self.name)
    }

    /// The label this entry is displayed under: its section, else its type.
    pub fn group_label(&self) -> &str {
        self.section.as_deref().unwrap_or(&self.primary_type)
    }
}

/// A user-uploaded image. Unique by `name` within the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomAsset {
    pub name: String,
    /// Reference assigned by the storage collaborator (e.g. `custom/wave.png`)
    pub storage_ref: String,
    /// Tags extracted from embedded metadata; `None` until enrichment finds some
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_text: Option<String>,
}

/// Anything that can be shown in the gallery.
///
/// The `kind` tag makes the variant explicit in serialized form instead of
/// inferring it from which optional fields happen to be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GalleryItem {
    Catalog(CatalogEntry),
    Custom(CustomAsset),
}

impl GalleryItem {
    pub fn name(&self) -> &str {
        match self {
            GalleryItem::Catalog(e) => &e.name,
            GalleryItem::Custom(a) => &a.name,
        }
    }

    /// Tag string, empty when a custom asset has none yet.
    pub fn tags(&self) -> &str {
        match self {
            GalleryItem::Catalog(e) => &e.tag_text,
            GalleryItem::Custom(a) => a.tag_text.as_deref().unwrap_or(""),
        }
    }

    /// Path used to tell two same-named items apart when de-duplicating.
    pub fn resolved_ref(&self) -> String {
        match self {
            GalleryItem::Catalog(e) => e.image_ref(),
            GalleryItem::Custom(a) => a.storage_ref.clone(),
        }
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warn,
    Error,
}
