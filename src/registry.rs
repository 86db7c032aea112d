//! Custom asset registry: user-uploaded images and their tags.
//!
//! Assets are keyed by name, the final segment of their storage reference.
//! Uploading a file whose name is already registered updates the existing
//! record in place; the registry never holds two assets with the same name.
//!
//! ## Intake
//!
//! ```text
//! validate → upload → check until servable → upsert → enrich
//! ```
//!
//! [`intake`] covers the first three steps and fails the whole upload if
//! any of them fails, so a file that never became servable is never
//! registered. [`enrich`] runs after the upsert and cannot undo it: a
//! missing or unreadable prompt only leaves the asset without tags.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::backend::AppContext;
use crate::metadata;
use crate::naming;
use crate::retry::{self, RetryPolicy};
use crate::text::Normalizer;
use crate::types::CustomAsset;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload failed: {0}")]
    Failed(String),
    #[error("{storage_ref} was uploaded but is {source}")]
    ExistenceTimeout {
        storage_ref: String,
        #[source]
        source: retry::RetryExhausted,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
}

/// Result of looking for tags in an asset's embedded metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichOutcome {
    Tagged(String),
    /// The image carries no usable prompt. Not an error.
    NoMetadata,
    /// The bytes could not be read.
    Failed(String),
}

/// Ordered collection of custom assets, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomAssetRegistry {
    assets: Vec<CustomAsset>,
}

impl CustomAssetRegistry {
    pub fn assets(&self) -> &[CustomAsset] {
        &self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&CustomAsset> {
        self.assets.iter().find(|a| a.name == name)
    }

    /// Insert or update the asset stored at `storage_ref`.
    ///
    /// An existing asset keeps its position and its tags; only the storage
    /// reference changes.
    pub fn upsert(&mut self, storage_ref: &str) -> (CustomAsset, UpsertOutcome) {
        let name = naming::asset_name(storage_ref);
        if let Some(existing) = self.assets.iter_mut().find(|a| a.name == name) {
            existing.storage_ref = storage_ref.to_string();
            debug!(name, storage_ref, "custom asset updated");
            return (existing.clone(), UpsertOutcome::Updated);
        }
        let asset = CustomAsset {
            name: name.to_string(),
            storage_ref: storage_ref.to_string(),
            tag_text: None,
        };
        self.assets.push(asset.clone());
        debug!(name, storage_ref, "custom asset added");
        (asset, UpsertOutcome::Added)
    }

    /// Record the result of [`enrich`]. Returns whether tags changed.
    pub fn apply_enrichment(&mut self, name: &str, outcome: &EnrichOutcome) -> bool {
        let EnrichOutcome::Tagged(tags) = outcome else {
            return false;
        };
        match self.assets.iter_mut().find(|a| a.name == name) {
            Some(asset) if asset.tag_text.as_deref() != Some(tags.as_str()) => {
                asset.tag_text = Some(tags.clone());
                true
            }
            _ => false,
        }
    }

    /// Remove every asset. Returns how many were removed.
    pub fn reset(&mut self) -> usize {
        let removed = self.assets.len();
        self.assets.clear();
        removed
    }
}

/// Look for prompt tags in the image behind `asset`.
pub async fn enrich(asset: &CustomAsset, ctx: &AppContext, normalizer: &Normalizer) -> EnrichOutcome {
    let bytes = match ctx.storage.read(&asset.storage_ref).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(name = %asset.name, error = %e, "could not read custom asset for metadata");
            return EnrichOutcome::Failed(e.to_string());
        }
    };

    let tags = ctx
        .decoder
        .decode(&bytes)
        .and_then(|fields| metadata::extract_prompt_tags(&fields))
        .map(|raw| normalizer.clean(&raw))
        .filter(|tags| !tags.is_empty());

    match tags {
        Some(tags) => {
            info!(name = %asset.name, "extracted prompt tags");
            EnrichOutcome::Tagged(tags)
        }
        None => {
            debug!(name = %asset.name, "no prompt metadata");
            EnrichOutcome::NoMetadata
        }
    }
}

/// Check an upload before anything is sent to storage.
pub fn validate_upload(file_name: &str, destination: &str, bytes: &[u8]) -> Result<(), UploadError> {
    if file_name.trim().is_empty() {
        return Err(UploadError::Failed("missing file name".into()));
    }
    if file_name.contains("..") || file_name.contains('/') || file_name.contains('\\') {
        return Err(UploadError::Failed(format!("invalid file name: {file_name}")));
    }
    if destination.starts_with('/') || destination.contains("..") {
        return Err(UploadError::Failed(format!(
            "invalid destination: {destination}"
        )));
    }
    if bytes.is_empty() {
        return Err(UploadError::Failed(format!("{file_name} is empty")));
    }
    image::guess_format(bytes)
        .map_err(|_| UploadError::Failed(format!("{file_name} is not a recognized image")))?;
    Ok(())
}

/// Validate, upload and wait until the stored file can be served.
///
/// Returns the storage reference once the existence check succeeds. Check
/// errors count as "not yet".
pub async fn intake(
    bytes: &[u8],
    file_name: &str,
    destination: &str,
    policy: RetryPolicy,
    ctx: &AppContext,
) -> Result<String, UploadError> {
    validate_upload(file_name, destination, bytes)?;

    let storage_ref = ctx
        .storage
        .upload(bytes, file_name, destination)
        .await
        .map_err(|e| UploadError::Failed(e.to_string()))?;

    let storage = &ctx.storage;
    let stored_ref = storage_ref.as_str();
    let attempt = retry::until_ready(policy, |attempt| async move {
        match storage.exists(stored_ref).await {
            Ok(found) => found,
            Err(e) => {
                debug!(attempt, error = %e, "existence check errored");
                false
            }
        }
    })
    .await
    .map_err(|source| UploadError::ExistenceTimeout {
        storage_ref: storage_ref.clone(),
        source,
    })?;

    debug!(storage_ref, attempt, "upload is servable");
    Ok(storage_ref)
}
