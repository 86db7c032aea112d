//! Gallery session: one method per user action.
//!
//! A [`Gallery`] owns the configuration, the state store, the catalog and
//! the category order for one session, and reports every user-visible
//! outcome through the context's notifier. Collaborator failures never
//! escape as panics or unhandled errors; each action converts them into a
//! notice and a typed result.
//!
//! ```text
//! open ──► refresh / groups / toggles / uploads / compose / copy ──► close
//! ```

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{AppContext, BackendError, Delivery};
use crate::catalog::{CatalogStore, Group, LoadReport};
use crate::composer::{self, ComposeOutcome};
use crate::config::GalleryConfig;
use crate::order::CategoryOrder;
use crate::registry::{self, EnrichOutcome, UploadError, UpsertOutcome};
use crate::state::{GalleryState, StateStore};
use crate::text::Normalizer;
use crate::types::{CustomAsset, Severity};

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("No image named {0}")]
    NotFound(String),
    #[error("Could not deliver tags: {0}")]
    Delivery(#[from] BackendError),
}

/// What happened to an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedAsset {
    pub asset: CustomAsset,
    pub upsert: UpsertOutcome,
    pub enrichment: EnrichOutcome,
}

pub struct Gallery {
    config: GalleryConfig,
    ctx: AppContext,
    normalizer: Normalizer,
    order: CategoryOrder,
    catalog: CatalogStore,
    store: StateStore,
    last_report: LoadReport,
}

impl std::fmt::Debug for Gallery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gallery")
            .field("store", &self.store)
            .field("last_report", &self.last_report)
            .finish_non_exhaustive()
    }
}

impl Gallery {
    /// Load state, register default category weights and load the catalog.
    pub async fn open(config: GalleryConfig, ctx: AppContext) -> Self {
        let store = StateStore::load(ctx.persistence.clone(), config.persistence.debounce()).await;

        let mut order = CategoryOrder::with_weights(
            config.category_order.clone(),
            config.categories.custom.clone(),
        );
        order.register_source_defaults(&config.sources);

        let catalog = CatalogStore::new(
            config.sources.clone(),
            config.text.skip_sentinel.clone(),
            config.categories.custom.clone(),
        );
        let normalizer = Normalizer::new(&config.text.separator_keyword);

        let mut gallery = Self {
            config,
            ctx,
            normalizer,
            order,
            catalog,
            store,
            last_report: LoadReport::default(),
        };
        gallery.refresh(false).await;

        let state = gallery.store.state();
        if !gallery.last_report.found_any()
            && state.custom_assets.is_empty()
            && !state.notice_dismissed
        {
            gallery.ctx.notify(
                Severity::Warn,
                "No Prompt Images Found",
                "No hierarchy sources could be loaded. Install a prompt image package \
                 into the data directory or add custom images.",
            );
        }
        gallery
    }

    /// Reload the catalog. A forced refresh retries sources in the negative
    /// cache.
    pub async fn refresh(&mut self, force: bool) -> &LoadReport {
        if force {
            self.store.clear_missing_sources();
        }
        let report = self
            .catalog
            .load(self.ctx.sources.as_ref(), self.store.missing_sources_mut())
            .await;
        self.last_report = report;
        &self.last_report
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    pub fn state(&self) -> &GalleryState {
        self.store.state()
    }

    pub fn order(&self) -> &CategoryOrder {
        &self.order
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn last_report(&self) -> &LoadReport {
        &self.last_report
    }

    /// Display groups for a search term, honoring the sort direction.
    pub fn groups(&self, search: &str) -> Vec<Group> {
        let state = self.store.state();
        self.catalog.groups(
            &state.custom_assets,
            search,
            state.sort_ascending,
            &self.order,
        )
    }

    // -------------------------------------------------------------------------
    // Cosmetic toggles
    // -------------------------------------------------------------------------

    pub async fn toggle_sort(&mut self) -> bool {
        self.store.toggle_sort().await
    }

    /// Open or close display groups. `name` is a group key
    /// (`"Female Body - Race"`) or a label; a label shared by several groups
    /// sets all of them. Returns the keys that were set.
    pub async fn set_section_open(&mut self, name: &str, open: bool) -> Vec<String> {
        let groups = self.groups("");
        let keys = if groups.iter().any(|g| g.order_key == name) {
            vec![name.to_string()]
        } else {
            let by_label: Vec<String> = groups
                .into_iter()
                .filter(|g| g.label == name)
                .map(|g| g.order_key)
                .collect();
            if by_label.is_empty() {
                vec![name.to_string()]
            } else {
                by_label
            }
        };
        for key in &keys {
            self.store.set_section_open(key, open).await;
        }
        keys
    }

    /// Set a category's inclusion flag. Returns every flag that changed.
    pub async fn set_category_included(&mut self, key: &str, included: bool) -> Vec<(String, bool)> {
        self.store
            .set_category_included(key, included, &self.config.categories.exclusive)
            .await
    }

    pub async fn dismiss_notice(&mut self) {
        self.store.dismiss_notice().await;
    }

    /// Wait out the debounce interval of pending cosmetic changes, then save
    /// them. Returns at once when nothing is pending. Hosts that keep a
    /// session open run this after each cosmetic action.
    pub async fn run_scheduled_flush(&mut self) -> bool {
        self.store.run_scheduled_flush().await
    }

    // -------------------------------------------------------------------------
    // Custom assets
    // -------------------------------------------------------------------------

    /// Upload a file, register it once it is servable, then look for tags.
    pub async fn add_custom_asset(
        &mut self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<AddedAsset, UploadError> {
        let storage_ref = match registry::intake(
            bytes,
            file_name,
            &self.config.upload.destination,
            self.config.retry_policy(),
            &self.ctx,
        )
        .await
        {
            Ok(storage_ref) => storage_ref,
            Err(e) => {
                warn!(file_name, error = %e, "upload failed");
                self.ctx.notify(
                    Severity::Error,
                    "Upload Failed",
                    &format!("Failed to add custom image {file_name}: {e}"),
                );
                return Err(e);
            }
        };

        let (asset, upsert) = self
            .store
            .update_assets(|assets| assets.upsert(&storage_ref))
            .await;
        let verb = match upsert {
            UpsertOutcome::Added => "Added",
            UpsertOutcome::Updated => "Updated",
        };
        info!(name = %asset.name, ?upsert, "custom asset registered");
        self.ctx.notify(
            Severity::Success,
            "Upload Successful",
            &format!("{verb} custom image: {}", asset.name),
        );

        let enrichment = registry::enrich(&asset, &self.ctx, &self.normalizer).await;
        match &enrichment {
            EnrichOutcome::Tagged(_) => {
                self.store
                    .update_assets(|assets| assets.apply_enrichment(&asset.name, &enrichment))
                    .await;
                self.ctx.notify(
                    Severity::Success,
                    "Metadata Extracted",
                    "Prompt tags were successfully extracted from the image.",
                );
            }
            EnrichOutcome::NoMetadata => self.ctx.notify(
                Severity::Info,
                "No Metadata Found",
                "No prompt tags were found in the image metadata.",
            ),
            EnrichOutcome::Failed(reason) => self.ctx.notify(
                Severity::Warn,
                "Metadata Extraction Failed",
                &format!("An error occurred while trying to extract metadata: {reason}"),
            ),
        }

        let asset = self
            .store
            .custom_assets()
            .get(&asset.name)
            .cloned()
            .unwrap_or(asset);
        Ok(AddedAsset {
            asset,
            upsert,
            enrichment,
        })
    }

    /// Remove every custom asset. Confirmation is the caller's job.
    pub async fn reset_custom_assets(&mut self) -> usize {
        let removed = self.store.update_assets(|assets| assets.reset()).await;
        info!(removed, "custom assets reset");
        self.ctx.notify(
            Severity::Info,
            "Custom Images Reset",
            "All custom images have been cleared.",
        );
        removed
    }

    // -------------------------------------------------------------------------
    // Prompt output
    // -------------------------------------------------------------------------

    /// Compose a random prompt from the included categories and deliver it.
    pub async fn compose_random<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> (ComposeOutcome, Option<Delivery>) {
        let state = self.store.state();
        let included = state.included_keys();
        let outcome = composer::compose_random(
            &self.catalog,
            &state.custom_assets,
            &included,
            &self.order,
            &self.normalizer,
            rng,
        );

        let delivery = match &outcome {
            ComposeOutcome::NoCategoriesSelected => {
                self.ctx.notify(
                    Severity::Warn,
                    "No Categories Selected",
                    "Include at least one category to build a random prompt.",
                );
                None
            }
            ComposeOutcome::NoImagesFound => {
                self.ctx.notify(
                    Severity::Warn,
                    "No Images Found",
                    "None of the included categories has any images.",
                );
                None
            }
            ComposeOutcome::Composed { text, picks } => {
                info!(picks = picks.len(), "random prompt composed");
                match self.ctx.sink.deliver(text).await {
                    Ok(delivery) => {
                        let detail = match delivery {
                            Delivery::DeliveredToTarget => "Random prompt sent to the prompt node.",
                            Delivery::FellBackToClipboard => "Random prompt copied to clipboard.",
                        };
                        self.ctx.notify(Severity::Success, "Random Prompt Created", detail);
                        Some(delivery)
                    }
                    Err(e) => {
                        warn!(error = %e, "could not deliver random prompt");
                        self.ctx.notify(
                            Severity::Error,
                            "Delivery Failed",
                            &format!("Could not deliver the random prompt: {e}"),
                        );
                        None
                    }
                }
            }
        };
        (outcome, delivery)
    }

    /// Clean one image's tags and deliver them.
    pub async fn copy_tags(&mut self, name: &str) -> Result<Delivery, CopyError> {
        let Some(item) = self.catalog.find(&self.store.state().custom_assets, name) else {
            self.ctx.notify(
                Severity::Error,
                "Copy Failed",
                &format!("Failed to copy tags for \"{name}\""),
            );
            return Err(CopyError::NotFound(name.to_string()));
        };

        let text = self.normalizer.clean(item.tags());
        match self.ctx.sink.deliver(&text).await {
            Ok(delivery) => {
                let detail = match delivery {
                    Delivery::DeliveredToTarget => format!("Tags for \"{name}\" sent to the prompt node"),
                    Delivery::FellBackToClipboard => format!("Tags for \"{name}\" copied to clipboard"),
                };
                self.ctx.notify(Severity::Success, "Tags Copied!", &detail);
                Ok(delivery)
            }
            Err(e) => {
                warn!(name, error = %e, "could not deliver tags");
                self.ctx.notify(
                    Severity::Error,
                    "Copy Failed",
                    &format!("Failed to copy tags for \"{name}\""),
                );
                Err(e.into())
            }
        }
    }

    /// Session teardown: flush pending state. Returns whether it was saved.
    pub async fn close(mut self) -> bool {
        self.store.close().await
    }
}
