//! Local-directory implementation of the collaborator traits.
//!
//! Everything lives under one data directory:
//!
//! ```text
//! promptImages/
//! ├── gallery.toml               # Config (optional)
//! ├── gallery-state.json         # Persisted state
//! ├── PonyXl-poses.yaml          # Hierarchy sources, fetched by name
//! ├── thumbnails/
//! │   └── poses/standing/wave.png.jpg
//! └── custom/                    # Upload destination
//!     └── mine.png
//! ```
//!
//! Source names, storage references and destinations are always relative to
//! the data directory; anything that would escape it is rejected.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::backend::{
    AssetStorage, BackendError, Delivery, Notifier, PromptSink, SourceFetcher, StatePersistence,
};
use crate::state::GalleryState;
use crate::types::Severity;

/// Extensions tried, in order, when looking up a thumbnail.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

const THUMBNAIL_DIR: &str = "thumbnails";

#[derive(Debug, Clone)]
pub struct FsBackend {
    data_dir: PathBuf,
    state_file: String,
}

impl FsBackend {
    pub fn new(data_dir: impl Into<PathBuf>, state_file: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            state_file: state_file.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(&self.state_file)
    }

    /// Resolve a relative reference inside the data directory.
    fn resolve(&self, relative: &str) -> Result<PathBuf, BackendError> {
        let rel = Path::new(relative);
        let safe = !relative.is_empty()
            && rel
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(BackendError::Rejected(format!(
                "path escapes the data directory: {relative}"
            )));
        }
        Ok(self.data_dir.join(rel))
    }

    /// Thumbnail for an image reference, if one exists on disk.
    pub fn thumbnail_path(&self, image_ref: &str) -> Option<PathBuf> {
        let base = self.resolve(&format!("{THUMBNAIL_DIR}/{image_ref}")).ok()?;
        THUMBNAIL_EXTENSIONS.iter().find_map(|ext| {
            let mut candidate = base.clone().into_os_string();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }
}

#[async_trait]
impl SourceFetcher for FsBackend {
    async fn fetch_source(&self, name: &str) -> Result<Option<String>, BackendError> {
        let path = self.resolve(name)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AssetStorage for FsBackend {
    async fn upload(
        &self,
        bytes: &[u8],
        file_name: &str,
        destination: &str,
    ) -> Result<String, BackendError> {
        let storage_ref = if destination.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{file_name}", destination.trim_end_matches('/'))
        };
        let path = self.resolve(&storage_ref)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "stored upload");
        Ok(storage_ref)
    }

    async fn exists(&self, storage_ref: &str) -> Result<bool, BackendError> {
        let path = self.resolve(storage_ref)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn read(&self, storage_ref: &str) -> Result<Vec<u8>, BackendError> {
        let path = self.resolve(storage_ref)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BackendError::NotFound(storage_ref.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StatePersistence for FsBackend {
    async fn load_state(&self) -> Result<Option<GalleryState>, BackendError> {
        let content = match tokio::fs::read_to_string(self.state_path()).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write to a sibling temp file, then rename over the old state.
    async fn save_state(&self, state: &GalleryState) -> Result<(), BackendError> {
        let path = self.state_path();
        let json = serde_json::to_string_pretty(state)?;
        tokio::fs::create_dir_all(&self.data_dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Routes notices into the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, severity: Severity, summary: &str, detail: &str) {
        match severity {
            Severity::Success | Severity::Info => info!(%summary, "{detail}"),
            Severity::Warn => warn!(%summary, "{detail}"),
            Severity::Error => error!(%summary, "{detail}"),
        }
    }
}

/// Writes prompts to a target file, or to stdout when there is none.
#[derive(Debug, Clone, Default)]
pub struct FileSink {
    target: Option<PathBuf>,
}

impl FileSink {
    pub fn new(target: Option<PathBuf>) -> Self {
        Self { target }
    }
}

#[async_trait]
impl PromptSink for FileSink {
    async fn deliver(&self, text: &str) -> Result<Delivery, BackendError> {
        match &self.target {
            Some(path) => {
                tokio::fs::write(path, format!("{text}\n")).await?;
                Ok(Delivery::DeliveredToTarget)
            }
            None => {
                println!("{text}");
                Ok(Delivery::FellBackToClipboard)
            }
        }
    }
}
