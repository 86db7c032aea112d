//! Catalog store: parsed hierarchy entries plus the custom assets.
//!
//! Sources are fetched and parsed in their configured order, so entry order
//! (and every stable sort over it) is the same from run to run. A source
//! that can't be fetched goes into the negative cache and is not requested
//! again until a forced refresh clears the cache.
//!
//! ## Grouping
//!
//! Entries are displayed under `section ?? primary_type`. Sectioned groups
//! are ordered by their composite key (`"Female Body - Race"`), the others
//! by their label. Within a group, items with the same name and resolved
//! reference collapse to one and the rest are sorted by name. The custom
//! group is always present and always last.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::backend::SourceFetcher;
use crate::config::SourceConfig;
use crate::hierarchy::parse_hierarchy;
use crate::naming;
use crate::order::CategoryOrder;
use crate::registry::CustomAssetRegistry;
use crate::types::{CatalogEntry, CustomAsset, GalleryItem};

/// Outcome of one load cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Sources fetched and parsed
    pub loaded: Vec<String>,
    /// Sources that failed this cycle and were added to the negative cache
    pub missing: Vec<String>,
    /// Sources skipped because they were already in the negative cache
    pub skipped: Vec<String>,
    /// Total entries after the load
    pub entries: usize,
}

impl LoadReport {
    pub fn found_any(&self) -> bool {
        self.entries > 0
    }
}

/// One display group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub label: String,
    /// Key used to place the group in the category order
    pub order_key: String,
    pub is_custom: bool,
    pub items: Vec<GalleryItem>,
}

/// Entries and custom assets matching a search term.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchView<'a> {
    pub entries: Vec<&'a CatalogEntry>,
    pub custom: Vec<&'a CustomAsset>,
}

#[derive(Debug, Clone)]
pub struct CatalogStore {
    sources: Vec<SourceConfig>,
    skip_sentinel: String,
    custom_label: String,
    entries: Vec<CatalogEntry>,
}

impl CatalogStore {
    pub fn new(
        sources: Vec<SourceConfig>,
        skip_sentinel: impl Into<String>,
        custom_label: impl Into<String>,
    ) -> Self {
        Self {
            sources,
            skip_sentinel: skip_sentinel.into(),
            custom_label: custom_label.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    #[cfg(test)]
    pub(crate) fn replace_entries(&mut self, entries: Vec<CatalogEntry>) {
        self.entries = entries;
    }

    /// Fetch and parse every source not in `missing`, replacing the current
    /// entries. Failed sources are added to `missing`.
    pub async fn load(
        &mut self,
        fetcher: &dyn SourceFetcher,
        missing: &mut BTreeSet<String>,
    ) -> LoadReport {
        let mut report = LoadReport::default();
        let mut entries = Vec::new();

        for source in &self.sources {
            if missing.contains(&source.name) {
                debug!(source = %source.name, "skipping source in negative cache");
                report.skipped.push(source.name.clone());
                continue;
            }
            let text = match fetcher.fetch_source(&source.name).await {
                Ok(Some(text)) => text,
                Ok(None) => {
                    debug!(source = %source.name, "source not found");
                    missing.insert(source.name.clone());
                    report.missing.push(source.name.clone());
                    continue;
                }
                Err(e) => {
                    warn!(source = %source.name, error = %e, "could not fetch source");
                    missing.insert(source.name.clone());
                    report.missing.push(source.name.clone());
                    continue;
                }
            };
            let parsed = parse_hierarchy(&text, &source.parse_options(&self.skip_sentinel));
            debug!(source = %source.name, entries = parsed.len(), "parsed source");
            entries.extend(parsed);
            report.loaded.push(source.name.clone());
        }

        self.entries = entries;
        report.entries = self.entries.len();
        info!(
            loaded = report.loaded.len(),
            missing = report.missing.len(),
            skipped = report.skipped.len(),
            entries = report.entries,
            "catalog loaded"
        );
        report
    }

    /// Entries whose primary type is `category`.
    pub fn entries_of_type<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries
            .iter()
            .filter(move |e| e.primary_type == category)
    }

    /// Find an item by name: catalog entries first, then custom assets.
    pub fn find(&self, custom: &CustomAssetRegistry, name: &str) -> Option<GalleryItem> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .map(GalleryItem::Catalog)
            .or_else(|| custom.get(name).cloned().map(GalleryItem::Custom))
    }

    /// Case-insensitive name search over both collections. An empty term
    /// matches everything.
    pub fn search<'a>(&'a self, custom: &'a CustomAssetRegistry, term: &str) -> SearchView<'a> {
        let needle = term.trim().to_lowercase();
        let matches = |name: &str| needle.is_empty() || name.to_lowercase().contains(&needle);
        SearchView {
            entries: self.entries.iter().filter(|e| matches(&e.name)).collect(),
            custom: custom
                .assets()
                .iter()
                .filter(|a| matches(&a.name))
                .collect(),
        }
    }

    /// Group the search results for display.
    pub fn groups(
        &self,
        custom: &CustomAssetRegistry,
        term: &str,
        ascending: bool,
        order: &CategoryOrder,
    ) -> Vec<Group> {
        let view = self.search(custom, term);

        let mut by_key: HashMap<String, Group> = HashMap::new();
        for entry in view.entries {
            let order_key = match &entry.section {
                Some(section) => naming::composite_key(&entry.primary_type, section),
                None => entry.primary_type.clone(),
            };
            by_key
                .entry(order_key.clone())
                .or_insert_with(|| Group {
                    label: entry.group_label().to_string(),
                    order_key,
                    is_custom: false,
                    items: Vec::new(),
                })
                .items
                .push(GalleryItem::Catalog(entry.clone()));
        }

        let custom_group = Group {
            label: self.custom_label.clone(),
            order_key: self.custom_label.clone(),
            is_custom: true,
            items: view
                .custom
                .into_iter()
                .cloned()
                .map(GalleryItem::Custom)
                .collect(),
        };

        let mut keys: Vec<String> = by_key.keys().cloned().collect();
        order.sort_keys(&mut keys);

        let mut groups: Vec<Group> = keys
            .iter()
            .filter_map(|key| by_key.remove(key))
            .filter(|g| g.order_key != self.custom_label)
            .collect();
        groups.push(custom_group);

        for group in &mut groups {
            dedup_items(&mut group.items);
            sort_items(&mut group.items, ascending);
        }
        groups
    }
}

/// Drop items whose `(name, resolved_ref)` was already seen, keeping the first.
fn dedup_items(items: &mut Vec<GalleryItem>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert((item.name().to_string(), item.resolved_ref())));
}

fn sort_items(items: &mut [GalleryItem], ascending: bool) {
    if ascending {
        items.sort_by(|a, b| a.name().cmp(b.name()));
    } else {
        items.sort_by(|a, b| b.name().cmp(a.name()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{PathRules, SectionRule};
    use crate::test_helpers::*;

    fn source(name: &str, category: &str, order: u32) -> SourceConfig {
        SourceConfig {
            name: name.into(),
            category: category.into(),
            skip_levels: 0,
            order,
            sections: Vec::new(),
            path_rules: PathRules::default(),
        }
    }

    fn body_source() -> SourceConfig {
        SourceConfig {
            sections: vec![SectionRule {
                key: "body_race".into(),
                label: "Race".into(),
            }],
            ..source("body.yaml", "Female Body", 3)
        }
    }

    const POSES: &str = "poses:\n  standing:\n    wave.png:\n      - waving, hand up\n    salute.png:\n      - saluting\n";
    const SCENES: &str = "scenes:\n  beach.png:\n    - beach, sunset\n";
    const BODY: &str = "body_race:\n  elf.png:\n    - elf ears\nbody_misc:\n  tall.png:\n    - tall\n";

    fn store(sources: Vec<SourceConfig>) -> CatalogStore {
        CatalogStore::new(sources, "SKIP", "Custom")
    }

    fn fetcher() -> MemorySources {
        let f = MemorySources::default();
        f.insert("poses.yaml", POSES);
        f.insert("scenes.yaml", SCENES);
        f.insert("body.yaml", BODY);
        f
    }

    fn default_order(sources: &[SourceConfig]) -> CategoryOrder {
        let mut order = CategoryOrder::new("Custom");
        order.register_source_defaults(sources);
        order
    }

    fn labels(groups: &[Group]) -> Vec<&str> {
        groups.iter().map(|g| g.label.as_str()).collect()
    }

    fn names(group: &Group) -> Vec<&str> {
        group.items.iter().map(|i| i.name()).collect()
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[tokio::test]
    async fn loads_sources_in_declared_order() {
        let mut s = store(vec![
            source("scenes.yaml", "Scenes", 2),
            source("poses.yaml", "Poses", 1),
        ]);
        let mut missing = BTreeSet::new();
        let report = s.load(&fetcher(), &mut missing).await;
        assert_eq!(report.loaded, vec!["scenes.yaml", "poses.yaml"]);
        assert_eq!(report.entries, 3);
        let order: Vec<&str> = s.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["beach.png", "wave.png", "salute.png"]);
    }

    #[tokio::test]
    async fn missing_source_goes_to_negative_cache() {
        let mut s = store(vec![
            source("gone.yaml", "Gone", 1),
            source("poses.yaml", "Poses", 2),
        ]);
        let f = fetcher();
        let mut missing = BTreeSet::new();

        let first = s.load(&f, &mut missing).await;
        assert_eq!(first.missing, vec!["gone.yaml"]);
        assert!(missing.contains("gone.yaml"));
        assert_eq!(f.fetch_count("gone.yaml"), 1);

        let second = s.load(&f, &mut missing).await;
        assert_eq!(second.skipped, vec!["gone.yaml"]);
        assert!(second.missing.is_empty());
        assert_eq!(f.fetch_count("gone.yaml"), 1);
        assert_eq!(second.entries, 2);
    }

    #[tokio::test]
    async fn fetch_errors_are_absorbed() {
        let mut s = store(vec![source("poses.yaml", "Poses", 1)]);
        let f = fetcher();
        f.fail("poses.yaml");
        let mut missing = BTreeSet::new();
        let report = s.load(&f, &mut missing).await;
        assert!(!report.found_any());
        assert_eq!(report.missing, vec!["poses.yaml"]);
    }

    #[tokio::test]
    async fn reload_replaces_entries() {
        let mut s = store(vec![source("poses.yaml", "Poses", 1)]);
        let f = fetcher();
        let mut missing = BTreeSet::new();
        s.load(&f, &mut missing).await;
        f.insert("poses.yaml", "poses:\n  sit.png:\n    - sitting\n");
        s.load(&f, &mut missing).await;
        assert_eq!(s.entries().len(), 1);
        assert_eq!(s.entries()[0].name, "sit.png");
    }

    // =========================================================================
    // Search
    // =========================================================================

    #[tokio::test]
    async fn search_filters_both_views_case_insensitively() {
        let mut s = store(vec![source("poses.yaml", "Poses", 1)]);
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let mut custom = CustomAssetRegistry::default();
        custom.upsert("custom/WaveCustom.png");
        custom.upsert("custom/other.png");

        let view = s.search(&custom, "WAVE");
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].name, "wave.png");
        assert_eq!(view.custom.len(), 1);
        assert_eq!(view.custom[0].name, "WaveCustom.png");

        let all = s.search(&custom, "  ");
        assert_eq!(all.entries.len(), 2);
        assert_eq!(all.custom.len(), 2);
    }

    // =========================================================================
    // Grouping
    // =========================================================================

    #[tokio::test]
    async fn groups_follow_category_order_with_custom_last() {
        let sources = vec![
            source("poses.yaml", "Poses", 2),
            source("scenes.yaml", "Scenes", 1),
        ];
        let mut s = store(sources.clone());
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let groups = s.groups(
            &CustomAssetRegistry::default(),
            "",
            true,
            &default_order(&sources),
        );
        assert_eq!(labels(&groups), vec!["Scenes", "Poses", "Custom"]);
        assert!(groups[2].is_custom);
        assert!(groups[2].items.is_empty());
    }

    #[tokio::test]
    async fn sectioned_entries_use_composite_keys() {
        let sources = vec![body_source(), source("poses.yaml", "Poses", 1)];
        let mut s = store(sources.clone());
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let groups = s.groups(
            &CustomAssetRegistry::default(),
            "",
            true,
            &default_order(&sources),
        );
        assert_eq!(labels(&groups), vec!["Poses", "Female Body", "Race", "Custom"]);
        assert_eq!(groups[2].order_key, "Female Body - Race");
        assert_eq!(names(&groups[2]), vec!["elf.png"]);
        assert_eq!(names(&groups[1]), vec!["tall.png"]);
    }

    #[tokio::test]
    async fn sort_direction_applies_within_groups() {
        let sources = vec![source("poses.yaml", "Poses", 1)];
        let mut s = store(sources.clone());
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let custom = CustomAssetRegistry::default();
        let order = default_order(&sources);

        let asc = s.groups(&custom, "", true, &order);
        assert_eq!(names(&asc[0]), vec!["salute.png", "wave.png"]);
        let desc = s.groups(&custom, "", false, &order);
        assert_eq!(names(&desc[0]), vec!["wave.png", "salute.png"]);
    }

    #[tokio::test]
    async fn duplicates_with_same_ref_collapse() {
        let text = "poses:\n  wave.png:\n    - a\n  wave.png:\n    - b\nother:\n  wave.png:\n    - c\n";
        let sources = vec![source("dup.yaml", "Poses", 1)];
        let f = MemorySources::default();
        f.insert("dup.yaml", text);
        let mut s = store(sources.clone());
        s.load(&f, &mut BTreeSet::new()).await;
        assert_eq!(s.entries().len(), 3);

        let groups = s.groups(&CustomAssetRegistry::default(), "", true, &default_order(&sources));
        let refs: Vec<String> = groups[0].items.iter().map(|i| i.resolved_ref()).collect();
        assert_eq!(refs, vec!["poses/wave.png", "other/wave.png"]);
        assert_eq!(groups[0].items[0].tags(), "a");
    }

    #[tokio::test]
    async fn custom_group_holds_filtered_custom_assets() {
        let mut s = store(Vec::new());
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let mut custom = CustomAssetRegistry::default();
        custom.upsert("custom/b.png");
        custom.upsert("custom/a.png");
        let groups = s.groups(&custom, "", true, &CategoryOrder::new("Custom"));
        assert_eq!(labels(&groups), vec!["Custom"]);
        assert_eq!(names(&groups[0]), vec!["a.png", "b.png"]);
    }

    #[tokio::test]
    async fn find_prefers_catalog_entries() {
        let mut s = store(vec![source("poses.yaml", "Poses", 1)]);
        s.load(&fetcher(), &mut BTreeSet::new()).await;
        let mut custom = CustomAssetRegistry::default();
        custom.upsert("custom/wave.png");
        custom.upsert("custom/mine.png");
        assert!(matches!(s.find(&custom, "wave.png"), Some(GalleryItem::Catalog(_))));
        assert!(matches!(s.find(&custom, "mine.png"), Some(GalleryItem::Custom(_))));
        assert_eq!(s.find(&custom, "nope.png"), None);
    }
}
