//! Persisted gallery state and its save lifecycle.
//!
//! [`GalleryState`] is everything that survives a session: custom assets,
//! which sections are open, which categories feed the random composer, the
//! sort direction and whether the "no images" notice was dismissed.
//!
//! ## Lifecycle
//!
//! ```text
//! load (defaults on absence or error)
//!   → mutate + commit(Cosmetic | Structural)
//!   → close (unconditional flush)
//! ```
//!
//! Cosmetic changes (sort toggle, open/closed sections, inclusion flags)
//! mark the store dirty and push the flush deadline out by the debounce
//! interval, so a burst of toggles costs one write. Structural changes
//! (custom assets added or cleared) flush immediately.
//!
//! A failed save is logged and leaves the store dirty; the next flush or
//! [`StateStore::close`] tries again. Nothing here returns an error to the
//! caller.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::StatePersistence;
use crate::registry::CustomAssetRegistry;

/// The durable state of one gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryState {
    pub custom_assets: CustomAssetRegistry,
    /// Group key → open. Absent means open. Sub-category groups use their
    /// composite key, so equal labels under different parents stay apart.
    pub section_open_states: BTreeMap<String, bool>,
    /// Category key → included in random composition. Absent means excluded.
    pub category_include_states: BTreeMap<String, bool>,
    pub sort_ascending: bool,
    pub notice_dismissed: bool,
    /// Sources that failed to load this session. Never persisted.
    #[serde(skip)]
    pub missing_source_files: BTreeSet<String>,
}

impl Default for GalleryState {
    fn default() -> Self {
        Self {
            custom_assets: CustomAssetRegistry::default(),
            section_open_states: BTreeMap::new(),
            category_include_states: BTreeMap::new(),
            sort_ascending: true,
            notice_dismissed: false,
            missing_source_files: BTreeSet::new(),
        }
    }
}

impl GalleryState {
    pub fn is_section_open(&self, key: &str) -> bool {
        self.section_open_states.get(key).copied().unwrap_or(true)
    }

    pub fn is_included(&self, key: &str) -> bool {
        self.category_include_states
            .get(key)
            .copied()
            .unwrap_or(false)
    }

    /// Included category keys, in key order.
    pub fn included_keys(&self) -> Vec<&str> {
        self.category_include_states
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

/// How urgently a mutation needs to reach persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Coalesced: flushed once the debounce interval passes.
    Cosmetic,
    /// Flushed immediately.
    Structural,
}

/// Owns the [`GalleryState`] and decides when to save it.
pub struct StateStore {
    state: GalleryState,
    persistence: Arc<dyn StatePersistence>,
    debounce: Duration,
    dirty: bool,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("dirty", &self.dirty)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl StateStore {
    /// Load saved state, falling back to defaults when there is none or it
    /// can't be read.
    pub async fn load(persistence: Arc<dyn StatePersistence>, debounce: Duration) -> Self {
        let state = match persistence.load_state().await {
            Ok(Some(state)) => {
                debug!(assets = state.custom_assets.len(), "loaded gallery state");
                state
            }
            Ok(None) => {
                info!("no saved gallery state, starting fresh");
                GalleryState::default()
            }
            Err(e) => {
                warn!(error = %e, "could not load gallery state, using defaults");
                GalleryState::default()
            }
        };
        Self {
            state,
            persistence,
            debounce,
            dirty: false,
            deadline: None,
        }
    }

    pub fn state(&self) -> &GalleryState {
        &self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// When the pending cosmetic flush is due, if one is pending.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mutate the state and commit the change.
    pub async fn update<R>(&mut self, change: Change, f: impl FnOnce(&mut GalleryState) -> R) -> R {
        let result = f(&mut self.state);
        self.commit(change).await;
        result
    }

    /// Mark the state changed and schedule or perform the save.
    ///
    /// A cosmetic change arriving after an overdue deadline is saved right
    /// away together with the pending ones.
    pub async fn commit(&mut self, change: Change) {
        self.dirty = true;
        let overdue = self.deadline.is_some_and(|d| Instant::now() >= d);
        match change {
            Change::Cosmetic if !overdue => {
                self.deadline = Some(Instant::now() + self.debounce);
            }
            Change::Cosmetic | Change::Structural => {
                self.flush().await;
            }
        }
    }

    /// Save now if dirty. Returns whether the state is clean afterwards.
    pub async fn flush(&mut self) -> bool {
        if !self.dirty {
            return true;
        }
        self.deadline = None;
        match self.persistence.save_state(&self.state).await {
            Ok(()) => {
                debug!("gallery state saved");
                self.dirty = false;
                true
            }
            Err(e) => {
                warn!(error = %e, "could not save gallery state");
                false
            }
        }
    }

    /// Flush if the debounce deadline has passed.
    pub async fn flush_if_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => self.flush().await,
            _ => !self.dirty,
        }
    }

    /// Sleep until the pending deadline, then flush. Returns immediately
    /// when nothing is scheduled.
    pub async fn run_scheduled_flush(&mut self) -> bool {
        if let Some(deadline) = self.deadline {
            tokio::time::sleep_until(deadline).await;
        }
        self.flush_if_due().await
    }

    /// Session teardown: flush whatever is pending.
    pub async fn close(&mut self) -> bool {
        self.flush().await
    }

    // -------------------------------------------------------------------------
    // Durable flags
    // -------------------------------------------------------------------------

    /// Flip the sort direction. Returns the new value of `sort_ascending`.
    pub async fn toggle_sort(&mut self) -> bool {
        self.update(Change::Cosmetic, |s| {
            s.sort_ascending = !s.sort_ascending;
            s.sort_ascending
        })
        .await
    }

    pub async fn set_section_open(&mut self, key: &str, open: bool) {
        self.update(Change::Cosmetic, |s| {
            s.section_open_states.insert(key.to_string(), open);
        })
        .await;
    }

    pub async fn dismiss_notice(&mut self) {
        self.update(Change::Cosmetic, |s| s.notice_dismissed = true)
            .await;
    }

    /// Set the inclusion flag of `key`.
    ///
    /// `exclusive` names two categories that can't be included together:
    /// including one of them excludes the other. Returns every key whose
    /// flag changed, in the order they were changed.
    pub async fn set_category_included(
        &mut self,
        key: &str,
        included: bool,
        exclusive: &[String],
    ) -> Vec<(String, bool)> {
        let partner = match exclusive {
            [a, b] if a == key => Some(b.clone()),
            [a, b] if b == key => Some(a.clone()),
            _ => None,
        };
        let changed = self
            .update(Change::Cosmetic, |s| {
                let mut changed = Vec::new();
                if s.is_included(key) != included {
                    changed.push((key.to_string(), included));
                }
                s.category_include_states.insert(key.to_string(), included);
                if included
                    && let Some(partner) = partner
                    && s.is_included(&partner)
                {
                    s.category_include_states.insert(partner.clone(), false);
                    changed.push((partner, false));
                }
                changed
            })
            .await;
        if changed.len() > 1 {
            debug!(?changed, "exclusive categories adjusted");
        }
        changed
    }

    // -------------------------------------------------------------------------
    // Custom assets
    // -------------------------------------------------------------------------

    pub fn custom_assets(&self) -> &CustomAssetRegistry {
        &self.state.custom_assets
    }

    /// Mutate the registry. Always a structural change.
    pub async fn update_assets<R>(&mut self, f: impl FnOnce(&mut CustomAssetRegistry) -> R) -> R {
        self.update(Change::Structural, |s| f(&mut s.custom_assets))
            .await
    }

    // -------------------------------------------------------------------------
    // Negative cache (session only, no commit)
    // -------------------------------------------------------------------------

    pub fn missing_sources_mut(&mut self) -> &mut BTreeSet<String> {
        &mut self.state.missing_source_files
    }

    pub fn clear_missing_sources(&mut self) {
        self.state.missing_source_files.clear();
    }
}
