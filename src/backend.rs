//! Collaborator traits and the application context.
//!
//! The catalog pipeline never touches the network, the filesystem or the
//! user interface directly. Everything outside the core goes through one of
//! the traits below, and the set of collaborators for a session is bundled
//! in an [`AppContext`] passed to constructors. There are no globals.
//!
//! | Trait | Contract |
//! |-------|----------|
//! | [`SourceFetcher`] | hierarchy source text, or `None` when it doesn't exist |
//! | [`AssetStorage`] | upload bytes, check for existence, read stored bytes |
//! | [`MetadataDecoder`] | embedded text fields of an image, if any |
//! | [`StatePersistence`] | load and save the gallery state |
//! | [`PromptSink`] | deliver a composed prompt to its target |
//! | [`Notifier`] | fire-and-forget user notices |
//!
//! The production implementation is [`FsBackend`](crate::fs_backend::FsBackend),
//! which serves all storage-like traits from a local data directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::state::GalleryState;
use crate::types::Severity;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rejected: {0}")]
    Rejected(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Where a delivered prompt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    DeliveredToTarget,
    FellBackToClipboard,
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch a hierarchy source. `Ok(None)` means it doesn't exist.
    async fn fetch_source(&self, name: &str) -> Result<Option<String>, BackendError>;
}

#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store an uploaded file and return the reference it was assigned.
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        destination: &str,
    ) -> Result<String, BackendError>;

    /// Whether the stored file can be served yet.
    async fn exists(&self, storage_ref: &str) -> Result<bool, BackendError>;

    /// Raw bytes behind a storage reference.
    async fn read(&self, storage_ref: &str) -> Result<Vec<u8>, BackendError>;
}

pub trait MetadataDecoder: Send + Sync {
    /// Embedded text fields (keyword → text), `None` when the bytes carry none.
    fn decode(&self, bytes: &[u8]) -> Option<BTreeMap<String, String>>;
}

#[async_trait]
pub trait StatePersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load_state(&self) -> Result<Option<GalleryState>, BackendError>;
    async fn save_state(&self, state: &GalleryState) -> Result<(), BackendError>;
}

#[async_trait]
pub trait PromptSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<Delivery, BackendError>;
}

pub trait Notifier: Send + Sync {
    fn notify(&self, severity: Severity, summary: &str, detail: &str);
}

/// The collaborators of one session.
#[derive(Clone)]
pub struct AppContext {
    pub sources: Arc<dyn SourceFetcher>,
    pub storage: Arc<dyn AssetStorage>,
    pub decoder: Arc<dyn MetadataDecoder>,
    pub persistence: Arc<dyn StatePersistence>,
    pub sink: Arc<dyn PromptSink>,
    pub notifier: Arc<dyn Notifier>,
}

impl AppContext {
    pub fn notify(&self, severity: Severity, summary: &str, detail: &str) {
        self.notifier.notify(severity, summary, detail);
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext").finish_non_exhaustive()
    }
}
