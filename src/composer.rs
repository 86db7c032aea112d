//! Random prompt composition.
//!
//! For every included category, in display order, one entry is picked
//! uniformly at random and its tags are folded into the prompt with
//! [`Normalizer::combine`]. Categories with nothing to pick from are
//! skipped. The custom category draws from custom assets that have tags.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::catalog::CatalogStore;
use crate::order::CategoryOrder;
use crate::registry::CustomAssetRegistry;
use crate::text::Normalizer;

/// One random pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub category: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    Composed { text: String, picks: Vec<Pick> },
    /// No category is included.
    NoCategoriesSelected,
    /// Categories are included but none of them has anything to pick.
    NoImagesFound,
}

/// Compose a prompt from one random item per included category.
pub fn compose_random<R: Rng + ?Sized>(
    catalog: &CatalogStore,
    custom: &CustomAssetRegistry,
    included: &[&str],
    order: &CategoryOrder,
    normalizer: &Normalizer,
    rng: &mut R,
) -> ComposeOutcome {
    if included.is_empty() {
        return ComposeOutcome::NoCategoriesSelected;
    }

    let mut categories: Vec<&str> = included.to_vec();
    order.sort_keys(&mut categories);

    let mut text = String::new();
    let mut picks = Vec::new();
    for category in categories {
        let candidates: Vec<(&str, &str)> = if category == order.custom_key() {
            custom
                .assets()
                .iter()
                .filter_map(|a| {
                    let tags = a.tag_text.as_deref().filter(|t| !t.trim().is_empty())?;
                    Some((a.name.as_str(), tags))
                })
                .collect()
        } else {
            catalog
                .entries_of_type(category)
                .map(|e| (e.name.as_str(), e.tag_text.as_str()))
                .collect()
        };

        let Some((name, tags)) = candidates.choose(rng) else {
            debug!(category, "nothing to pick");
            continue;
        };
        debug!(category, name, "picked");
        text = normalizer.combine(&text, &normalizer.clean(tags));
        picks.push(Pick {
            category: category.to_string(),
            name: name.to_string(),
        });
    }

    if picks.is_empty() {
        return ComposeOutcome::NoImagesFound;
    }
    ComposeOutcome::Composed { text, picks }
}
