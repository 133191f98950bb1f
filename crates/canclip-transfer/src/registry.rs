//! Client-side cache of the caller's media descriptors.

use std::sync::Arc;

use canclip_backend::MediaBackend;
use canclip_core::{MediaDescriptor, MediaId};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{info, warn};

/// Registry refresh and delete errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Listing failed; the cached list is unchanged.
    #[error("media listing failed: {reason}")]
    Refresh {
        /// Backend-reported reason.
        reason: String,
    },
    /// Delete was refused or lost; the cached list is unchanged.
    #[error("delete of {media_id} failed: {reason}")]
    Delete {
        /// Entry that was not deleted.
        media_id: MediaId,
        /// Backend-reported reason.
        reason: String,
    },
}

/// Cached descriptor list, replaced wholesale on every successful refresh.
///
/// Readers receive `Arc` snapshots, so a refresh never exposes a partially
/// updated list and never blocks on an in-flight backend call.
pub struct MediaRegistry {
    backend: Arc<dyn MediaBackend>,
    cache: RwLock<Arc<Vec<MediaDescriptor>>>,
}

impl MediaRegistry {
    /// Creates an empty registry over `backend`.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Replaces the cache with the backend's current listing and returns the
    /// number of entries.
    ///
    /// # Errors
    /// Returns [`RegistryError::Refresh`] and keeps the previous list when the
    /// listing call fails.
    pub async fn refresh(&self) -> Result<usize, RegistryError> {
        let listing = self.backend.get_user_media().await.map_err(|error| {
            warn!(%error, "media listing failed; keeping cached list");
            RegistryError::Refresh {
                reason: error.reason(),
            }
        })?;

        let count = listing.len();
        *self.cache.write() = Arc::new(listing);
        info!(entries = count, "media registry refreshed");
        Ok(count)
    }

    /// Deletes `media_id` on the backend, then refreshes.
    ///
    /// # Errors
    /// - [`RegistryError::Delete`] when the backend refuses; the cache is
    ///   untouched.
    /// - [`RegistryError::Refresh`] when the delete succeeded but the
    ///   follow-up listing failed.
    pub async fn delete(&self, media_id: &MediaId) -> Result<(), RegistryError> {
        if let Err(error) = self.backend.delete_media(media_id).await {
            warn!(%media_id, %error, "media delete failed");
            return Err(RegistryError::Delete {
                media_id: media_id.clone(),
                reason: error.reason(),
            });
        }

        info!(%media_id, "media deleted");
        self.refresh().await.map(|_| ())
    }

    /// Returns the current list.
    pub fn snapshot(&self) -> Arc<Vec<MediaDescriptor>> {
        self.cache.read().clone()
    }

    /// Returns the cached descriptor for `media_id`.
    pub fn find(&self, media_id: &MediaId) -> Option<MediaDescriptor> {
        self.cache
            .read()
            .iter()
            .find(|descriptor| &descriptor.id == media_id)
            .cloned()
    }

    /// Returns the number of cached descriptors.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Drops every cached descriptor without contacting the backend.
    pub fn clear(&self) {
        *self.cache.write() = Arc::new(Vec::new());
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for registry cache replacement.

    use canclip_backend::InMemoryBackend;
    use canclip_core::MediaKind;

    use super::*;
    use crate::UploadPipeline;

    #[tokio::test]
    async fn refresh_replaces_whole_list() {
        let backend = Arc::new(InMemoryBackend::new("principal-a"));
        let registry = MediaRegistry::new(backend.clone());
        assert!(registry.is_empty());

        let pipeline = UploadPipeline::new(backend.clone(), 4).expect("valid chunk size");
        pipeline
            .upload("first", MediaKind::Audio, b"0123456789")
            .await
            .expect("upload should succeed");
        assert_eq!(registry.refresh().await.expect("refresh"), 1);

        let before = registry.snapshot();
        registry.clear();
        assert_eq!(before.len(), 1);
        assert!(registry.is_empty());
    }
}
