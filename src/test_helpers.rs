//! Shared test utilities for the prompt-gallery test suite.
//!
//! In-memory collaborators that record what the core asked of them, plus
//! lookup helpers that panic with a readable message on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let harness = Harness::new();
//! harness.sources.insert("poses.yaml", "poses:\n  wave.png:\n    - waving\n");
//! let mut gallery = Gallery::open(config, harness.ctx()).await;
//!
//! let groups = gallery.groups("");
//! let group = find_group(&groups, "Poses");
//! assert_eq!(item_names(group), vec!["wave.png"]);
//! assert!(harness.notifier.has(Severity::Success, "Upload Successful"));
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{
    AppContext, AssetStorage, BackendError, Delivery, Notifier, PromptSink, SourceFetcher,
    StatePersistence,
};
use crate::catalog::Group;
use crate::png_text::PngTextDecoder;
use crate::state::GalleryState;
use crate::types::Severity;

// =========================================================================
// Harness
// =========================================================================

/// One of each in-memory collaborator, shared with the context under test.
#[derive(Default)]
pub struct Harness {
    pub sources: Arc<MemorySources>,
    pub storage: Arc<MemoryStorage>,
    pub persistence: Arc<MemoryPersistence>,
    pub sink: Arc<RecordingSink>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ctx(&self) -> AppContext {
        AppContext {
            sources: self.sources.clone(),
            storage: self.storage.clone(),
            decoder: Arc::new(PngTextDecoder),
            persistence: self.persistence.clone(),
            sink: self.sink.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

// =========================================================================
// Sources
// =========================================================================

#[derive(Default)]
pub struct MemorySources {
    texts: Mutex<HashMap<String, String>>,
    failing: Mutex<Vec<String>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemorySources {
    pub fn insert(&self, name: &str, text: &str) {
        self.texts
            .lock()
            .unwrap()
            .insert(name.to_string(), text.to_string());
    }

    /// Make fetches of `name` fail with a transport error.
    pub fn fail(&self, name: &str) {
        self.failing.lock().unwrap().push(name.to_string());
    }

    pub fn fetch_count(&self, name: &str) -> usize {
        self.fetches.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

#[async_trait]
impl SourceFetcher for MemorySources {
    async fn fetch_source(&self, name: &str) -> Result<Option<String>, BackendError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default() += 1;
        if self.failing.lock().unwrap().iter().any(|n| n == name) {
            return Err(BackendError::Io(std::io::Error::other("connection reset")));
        }
        Ok(self.texts.lock().unwrap().get(name).cloned())
    }
}

// =========================================================================
// Storage
// =========================================================================

/// Stores uploads in memory. Files become visible to `exists` only after a
/// configurable number of checks.
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
    visible_after: Mutex<u32>,
    checks: Mutex<u32>,
    uploads: Mutex<usize>,
    rejection: Mutex<Option<String>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            visible_after: Mutex::new(1),
            checks: Mutex::new(0),
            uploads: Mutex::new(0),
            rejection: Mutex::new(None),
        }
    }
}

impl MemoryStorage {
    pub fn put(&self, storage_ref: &str, bytes: Vec<u8>) {
        self.files
            .lock()
            .unwrap()
            .insert(storage_ref.to_string(), bytes);
    }

    /// `exists` reports true from the `n`-th check on.
    pub fn set_visible_after(&self, n: u32) {
        *self.visible_after.lock().unwrap() = n;
    }

    pub fn reject_uploads(&self, message: &str) {
        *self.rejection.lock().unwrap() = Some(message.to_string());
    }

    pub fn check_count(&self) -> u32 {
        *self.checks.lock().unwrap()
    }

    pub fn upload_count(&self) -> usize {
        *self.uploads.lock().unwrap()
    }
}

#[async_trait]
impl AssetStorage for MemoryStorage {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        destination: &str,
    ) -> Result<String, BackendError> {
        if let Some(message) = self.rejection.lock().unwrap().clone() {
            return Err(BackendError::Rejected(message));
        }
        *self.uploads.lock().unwrap() += 1;
        let storage_ref = format!("{destination}/{file_name}");
        self.put(&storage_ref, bytes.to_vec());
        Ok(storage_ref)
    }

    async fn exists(&self, storage_ref: &str) -> Result<bool, BackendError> {
        let mut checks = self.checks.lock().unwrap();
        *checks += 1;
        let visible = *checks >= *self.visible_after.lock().unwrap();
        Ok(visible && self.files.lock().unwrap().contains_key(storage_ref))
    }

    async fn read(&self, storage_ref: &str) -> Result<Vec<u8>, BackendError> {
        self.files
            .lock()
            .unwrap()
            .get(storage_ref)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(storage_ref.to_string()))
    }
}

// =========================================================================
// Persistence
// =========================================================================

#[derive(Default)]
pub struct MemoryPersistence {
    stored: Mutex<Option<GalleryState>>,
    saves: Mutex<usize>,
    fail_loads: Mutex<bool>,
    fail_saves: Mutex<bool>,
}

impl MemoryPersistence {
    pub fn seed(&self, state: GalleryState) {
        *self.stored.lock().unwrap() = Some(state);
    }

    pub fn fail_loads(&self) {
        *self.fail_loads.lock().unwrap() = true;
    }

    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock().unwrap() = fail;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn saved(&self) -> Option<GalleryState> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatePersistence for MemoryPersistence {
    async fn load_state(&self) -> Result<Option<GalleryState>, BackendError> {
        if *self.fail_loads.lock().unwrap() {
            return Err(BackendError::Rejected("corrupt state".into()));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save_state(&self, state: &GalleryState) -> Result<(), BackendError> {
        if *self.fail_saves.lock().unwrap() {
            return Err(BackendError::Rejected("read-only".into()));
        }
        *self.stored.lock().unwrap() = Some(state.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

// =========================================================================
// Sink and notifier
// =========================================================================

#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<String>>,
    no_target: Mutex<bool>,
}

impl RecordingSink {
    /// Pretend there is no target node, so deliveries fall back.
    pub fn without_target(&self) {
        *self.no_target.lock().unwrap() = true;
    }

    pub fn delivered(&self) -> Vec<String> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptSink for RecordingSink {
    async fn deliver(&self, text: &str) -> Result<Delivery, BackendError> {
        self.delivered.lock().unwrap().push(text.to_string());
        if *self.no_target.lock().unwrap() {
            Ok(Delivery::FellBackToClipboard)
        } else {
            Ok(Delivery::DeliveredToTarget)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn has(&self, severity: Severity, summary: &str) -> bool {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .any(|n| n.severity == severity && n.summary == summary)
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, severity: Severity, summary: &str, detail: &str) {
        self.notices.lock().unwrap().push(Notice {
            severity,
            summary: summary.to_string(),
            detail: detail.to_string(),
        });
    }
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find a display group by label. Panics if not found.
pub fn find_group<'a>(groups: &'a [Group], label: &str) -> &'a Group {
    groups.iter().find(|g| g.label == label).unwrap_or_else(|| {
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        panic!("group '{label}' not found. Available: {labels:?}")
    })
}

/// Item names of a group, in display order.
pub fn item_names(group: &Group) -> Vec<&str> {
    group.items.iter().map(|i| i.name()).collect()
}

/// Group labels in display order.
pub fn group_labels(groups: &[Group]) -> Vec<&str> {
    groups.iter().map(|g| g.label.as_str()).collect()
}

