//! # Prompt Gallery
//!
//! A catalog of tagged prompt images. Hierarchy sources (indented text files
//! describing a taxonomy down to `image: - tags` leaves) are parsed into flat
//! entries, grouped by category and shown in a user-configurable order. Users
//! can add their own images, whose tags are pulled from the prompt graph
//! embedded in the PNG, and compose a random prompt from one image per
//! selected category.
//!
//! # Architecture
//!
//! ```text
//! sources ──► hierarchy ──► catalog ──┐
//!                                     ├──► groups (order)  ──► output
//! uploads ──► registry  ──► state ────┤
//!              (retry, metadata)      └──► composer (text) ──► prompt sink
//! ```
//!
//! The core never touches the filesystem or the terminal directly. Every
//! side effect goes through a collaborator trait in [`backend`], bundled in an
//! [`AppContext`](backend::AppContext) that is passed to constructors. The
//! binary wires those traits to [`fs_backend`]; tests wire them to in-memory
//! fakes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`hierarchy`] | Indentation parser: source text → `CatalogEntry` list, path rules, sections |
//! | [`text`] | Tag cleanup and combination (`BREAK` keyword, punctuation, spacing) |
//! | [`order`] | Category weights → display order, composite sub-category keys |
//! | [`catalog`] | Source loading with negative cache, search, grouping |
//! | [`registry`] | Custom assets: upsert by name, upload intake, metadata enrichment |
//! | [`retry`] | Bounded retry combinator for the post-upload existence check |
//! | [`metadata`] | Prompt tag extraction from an embedded node graph |
//! | [`png_text`] | PNG `tEXt` / `iTXt` chunk reader |
//! | [`composer`] | Random prompt: one pick per included category |
//! | [`state`] | Persisted gallery state and its debounced save lifecycle |
//! | [`gallery`] | Session facade: one method per user action, user notices |
//! | [`backend`] | Collaborator traits and the application context |
//! | [`fs_backend`] | Data-directory implementation of the collaborators |
//! | [`config`] | `gallery.toml` loading, merging and validation |
//! | [`types`] | Shared records (`CatalogEntry`, `CustomAsset`, `GalleryItem`) |
//! | [`naming`] | Asset names and composite category keys |
//! | [`logging`] | Log subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Sum Type For Displayed Items
//!
//! Catalog entries and custom assets share a display path but not a shape.
//! [`GalleryItem`](types::GalleryItem) makes the difference an explicit
//! variant instead of a bag of optional fields.
//!
//! ## Cosmetic vs. Structural Saves
//!
//! Toggling the sort order or opening a section is cheap to lose and happens
//! in bursts, so those saves are debounced. Adding or clearing custom assets
//! is not, so those flush immediately. See [`state`].
//!
//! ## Declarative Path Rules
//!
//! Per-source path adjustments (`ignore`, `remove`, `prepend`) are applied in
//! a fixed order, and rule sets that contradict each other are rejected when
//! the config is validated rather than resolved by guesswork.

pub mod backend;
pub mod catalog;
pub mod composer;
pub mod config;
pub mod fs_backend;
pub mod gallery;
pub mod hierarchy;
pub mod logging;
pub mod metadata;
pub mod naming;
pub mod order;
pub mod output;
pub mod png_text;
pub mod registry;
pub mod retry;
pub mod state;
pub mod text;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
