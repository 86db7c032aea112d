//! Centralized name derivation for assets and category keys.
//!
//! Two conventions are shared by several modules:
//!
//! - **Asset names** are the final `/`-separated segment of a storage
//!   reference. `custom/poses/wave.png` becomes `wave.png`. The registry keys
//!   custom assets by this name, so re-uploading the same file updates the
//!   existing asset instead of adding a second one.
//!
//! - **Composite category keys** name a sub-category under its parent:
//!   `"Female Body - Race"`. They are opaque strings as far as ordering is
//!   concerned; a composite key never inherits its parent's weight.

/// Separator between parent and child in a composite category key.
pub const COMPOSITE_SEPARATOR: &str = " - ";

/// Derive an asset name from a storage reference.
///
/// - `"custom/wave.png"` → `"wave.png"`
/// - `"wave.png"` → `"wave.png"`
/// - `"custom/"` → `""` (caller rejects empty names)
pub fn asset_name(storage_ref: &str) -> &str {
    storage_ref.rsplit('/').next().unwrap_or(storage_ref)
}

/// Build the composite key for a sub-category under `parent`.
pub fn composite_key(parent: &str, sub: &str) -> String {
    format!("{parent}{COMPOSITE_SEPARATOR}{sub}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_name_takes_last_segment() {
        assert_eq!(asset_name("custom/wave.png"), "wave.png");
        assert_eq!(asset_name("custom/nested/dir/wave.png"), "wave.png");
    }

    #[test]
    fn asset_name_without_separator_is_identity() {
        assert_eq!(asset_name("wave.png"), "wave.png");
    }

    #[test]
    fn asset_name_of_trailing_slash_is_empty() {
        assert_eq!(asset_name("custom/"), "");
    }

    #[test]
    fn composite_key_joins_with_separator() {
        assert_eq!(composite_key("Female Body", "Race"), "Female Body - Race");
    }
}
