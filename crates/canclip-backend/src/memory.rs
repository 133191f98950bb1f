//! In-memory reference backend with fault injection.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use canclip_core::{MAX_CHUNK_SIZE, MediaDescriptor, MediaId};
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use crate::{BackendError, MediaBackend, UploadInitRequest, UserProfile};

/// One recorded call against [`InMemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `uploadMediaInit`.
    UploadInit {
        /// Declared name.
        name: String,
        /// Declared chunk count.
        chunk_count: u32,
    },
    /// `uploadMediaChunk`.
    UploadChunk {
        /// Target media.
        media_id: MediaId,
        /// Chunk index.
        index: u32,
    },
    /// `getMediaChunk`.
    GetChunk {
        /// Target media.
        media_id: MediaId,
        /// Chunk index.
        index: u32,
    },
    /// `getUserMedia`.
    ListMedia,
    /// `deleteMedia`.
    Delete {
        /// Target media.
        media_id: MediaId,
    },
    /// `authenticate`.
    Authenticate,
}

#[derive(Debug)]
struct StoredMedia {
    descriptor: MediaDescriptor,
    chunks: Vec<Option<Vec<u8>>>,
}

#[derive(Debug, Default)]
struct Faults {
    reject_init: Option<String>,
    reject_chunks: HashMap<u32, String>,
    transport_chunks: HashMap<u32, String>,
    reject_delete: Option<String>,
    reject_listing: Option<String>,
    deny_authentication: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_sequence: u64,
    media: BTreeMap<u64, StoredMedia>,
    faults: Faults,
    calls: Vec<BackendCall>,
}

impl MemoryState {
    fn find(&self, media_id: &MediaId) -> Option<(u64, &StoredMedia)> {
        self.media
            .iter()
            .find(|(_, stored)| &stored.descriptor.id == media_id)
            .map(|(sequence, stored)| (*sequence, stored))
    }

    fn find_mut(&mut self, media_id: &MediaId) -> Option<&mut StoredMedia> {
        self.media
            .values_mut()
            .find(|stored| &stored.descriptor.id == media_id)
    }
}

/// Single-user backend that keeps every chunk in memory.
///
/// Enforces the same declared-shape checks a real canister does: chunk
/// indices must be inside the declared count and chunks may not exceed the
/// declared chunk size.
#[derive(Debug)]
pub struct InMemoryBackend {
    principal: String,
    state: Mutex<MemoryState>,
}

impl InMemoryBackend {
    /// Creates an empty backend for `principal`.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            state: Mutex::new(MemoryState::default()),
        }
    }

    /// Makes every `uploadMediaInit` answer `err: reason`.
    pub fn reject_init(&self, reason: impl Into<String>) {
        self.state.lock().faults.reject_init = Some(reason.into());
    }

    /// Makes `uploadMediaChunk` at `index` answer `err: reason`.
    pub fn reject_chunk(&self, index: u32, reason: impl Into<String>) {
        self.state
            .lock()
            .faults
            .reject_chunks
            .insert(index, reason.into());
    }

    /// Makes `uploadMediaChunk` at `index` fail before reaching the backend.
    pub fn fail_chunk_transport(&self, index: u32, reason: impl Into<String>) {
        self.state
            .lock()
            .faults
            .transport_chunks
            .insert(index, reason.into());
    }

    /// Makes every `deleteMedia` answer `err: reason`.
    pub fn reject_delete(&self, reason: impl Into<String>) {
        self.state.lock().faults.reject_delete = Some(reason.into());
    }

    /// Makes every `getUserMedia` fail with `reason`.
    pub fn reject_listing(&self, reason: impl Into<String>) {
        self.state.lock().faults.reject_listing = Some(reason.into());
    }

    /// Makes every `authenticate` answer `err: reason`.
    pub fn deny_authentication(&self, reason: impl Into<String>) {
        self.state.lock().faults.deny_authentication = Some(reason.into());
    }

    /// Clears every injected fault.
    pub fn clear_faults(&self) {
        self.state.lock().faults = Faults::default();
    }

    /// Removes a stored chunk so later fetches come back absent.
    pub fn drop_stored_chunk(&self, media_id: &MediaId, index: u32) {
        let mut state = self.state.lock();
        if let Some(slot) = state
            .find_mut(media_id)
            .and_then(|stored| stored.chunks.get_mut(index as usize))
        {
            *slot = None;
        }
    }

    /// Replaces a stored chunk with zero bytes.
    pub fn empty_stored_chunk(&self, media_id: &MediaId, index: u32) {
        let mut state = self.state.lock();
        if let Some(slot) = state
            .find_mut(media_id)
            .and_then(|stored| stored.chunks.get_mut(index as usize))
        {
            *slot = Some(Vec::new());
        }
    }

    /// Returns every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the chunk indices uploaded for `media_id`, in arrival order.
    pub fn uploaded_chunk_indices(&self, media_id: &MediaId) -> Vec<u32> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::UploadChunk {
                    media_id: target,
                    index,
                } if target == media_id => Some(*index),
                _ => None,
            })
            .collect()
    }

    /// Returns the stored chunks concatenated, or `None` when the media is
    /// unknown or incomplete.
    pub fn stored_payload(&self, media_id: &MediaId) -> Option<Vec<u8>> {
        let state = self.state.lock();
        let (_, stored) = state.find(media_id)?;
        let mut payload = Vec::new();
        for chunk in &stored.chunks {
            payload.extend_from_slice(chunk.as_deref()?);
        }
        Some(payload)
    }

    /// Returns the number of stored media entries, complete or not.
    pub fn media_count(&self) -> usize {
        self.state.lock().media.len()
    }
}

#[async_trait]
impl MediaBackend for InMemoryBackend {
    async fn upload_media_init(
        &self,
        request: &UploadInitRequest,
    ) -> Result<MediaId, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::UploadInit {
            name: request.name.clone(),
            chunk_count: request.chunk_count,
        });

        if let Some(reason) = &state.faults.reject_init {
            return Err(BackendError::Rejected(reason.clone()));
        }
        if request.chunk_count == 0 || request.total_bytes == 0 {
            return Err(BackendError::Rejected("upload is empty".to_string()));
        }
        if request.chunk_size == 0 || request.chunk_size > MAX_CHUNK_SIZE as u64 {
            return Err(BackendError::Rejected(format!(
                "chunk size {} is outside 1..={MAX_CHUNK_SIZE}",
                request.chunk_size
            )));
        }
        let expected_chunks = request.total_bytes.div_ceil(request.chunk_size);
        if expected_chunks != u64::from(request.chunk_count) {
            return Err(BackendError::Rejected(format!(
                "declared {} chunks but {} bytes at chunk size {} need {expected_chunks}",
                request.chunk_count, request.total_bytes, request.chunk_size
            )));
        }

        state.next_sequence += 1;
        let sequence = state.next_sequence;
        let media_id = MediaId::new(format!("media-{sequence}"))
            .map_err(|error| BackendError::InvalidContract(error.to_string()))?;
        let descriptor = MediaDescriptor {
            id: media_id.clone(),
            name: request.name.clone(),
            media_type: request.media_type,
            chunk_count: request.chunk_count,
            chunk_size: request.chunk_size,
            total_size: request.total_bytes,
            created_at: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        };
        state.media.insert(
            sequence,
            StoredMedia {
                descriptor,
                chunks: vec![None; request.chunk_count as usize],
            },
        );

        debug!(%media_id, chunks = request.chunk_count, "memory backend opened upload");
        Ok(media_id)
    }

    async fn upload_media_chunk(
        &self,
        media_id: &MediaId,
        chunk_index: u32,
        chunk: &[u8],
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::UploadChunk {
            media_id: media_id.clone(),
            index: chunk_index,
        });

        if let Some(reason) = state.faults.transport_chunks.get(&chunk_index) {
            return Err(BackendError::Transport(reason.clone()));
        }
        if let Some(reason) = state.faults.reject_chunks.get(&chunk_index) {
            return Err(BackendError::Rejected(reason.clone()));
        }

        let stored = state
            .find_mut(media_id)
            .ok_or_else(|| BackendError::Rejected("media not found".to_string()))?;
        if chunk.len() as u64 > stored.descriptor.chunk_size {
            return Err(BackendError::Rejected(
                "chunk exceeds declared size".to_string(),
            ));
        }
        let slot = stored
            .chunks
            .get_mut(chunk_index as usize)
            .ok_or_else(|| BackendError::Rejected("chunk index out of range".to_string()))?;
        *slot = Some(chunk.to_vec());
        Ok(())
    }

    async fn get_media_chunk(
        &self,
        media_id: &MediaId,
        chunk_index: u32,
    ) -> Result<Option<Vec<u8>>, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::GetChunk {
            media_id: media_id.clone(),
            index: chunk_index,
        });

        Ok(state
            .find(media_id)
            .and_then(|(_, stored)| stored.chunks.get(chunk_index as usize).cloned())
            .flatten())
    }

    async fn get_user_media(&self) -> Result<Vec<MediaDescriptor>, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::ListMedia);

        if let Some(reason) = &state.faults.reject_listing {
            return Err(BackendError::Transport(reason.clone()));
        }

        Ok(state
            .media
            .values()
            .map(|stored| stored.descriptor.clone())
            .collect())
    }

    async fn delete_media(&self, media_id: &MediaId) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Delete {
            media_id: media_id.clone(),
        });

        if let Some(reason) = &state.faults.reject_delete {
            return Err(BackendError::Rejected(reason.clone()));
        }

        let (sequence, _) = state
            .find(media_id)
            .ok_or_else(|| BackendError::Rejected("media not found".to_string()))?;
        state.media.remove(&sequence);
        debug!(%media_id, "memory backend deleted media");
        Ok(())
    }

    async fn authenticate(&self) -> Result<UserProfile, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Authenticate);

        if let Some(reason) = &state.faults.deny_authentication {
            return Err(BackendError::Rejected(reason.clone()));
        }

        Ok(UserProfile {
            principal: self.principal.clone(),
            created_at: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for declared-shape enforcement.

    use canclip_core::MediaKind;

    use super::*;

    fn init_request(chunk_count: u32) -> UploadInitRequest {
        UploadInitRequest {
            name: "Recording_1".to_string(),
            media_type: MediaKind::Video,
            chunk_count,
            chunk_size: 4,
            total_bytes: u64::from(chunk_count) * 4,
        }
    }

    #[tokio::test]
    async fn rejects_chunks_outside_declared_shape() {
        let backend = InMemoryBackend::new("principal-a");
        let media_id = backend
            .upload_media_init(&init_request(2))
            .await
            .expect("init should succeed");

        assert!(backend.upload_media_chunk(&media_id, 2, &[0; 4]).await.is_err());
        assert!(backend.upload_media_chunk(&media_id, 0, &[0; 5]).await.is_err());
        backend
            .upload_media_chunk(&media_id, 0, &[1; 4])
            .await
            .expect("chunk should be accepted");
        assert!(backend.stored_payload(&media_id).is_none());

        backend
            .upload_media_chunk(&media_id, 1, &[2; 4])
            .await
            .expect("chunk should be accepted");
        assert_eq!(
            backend.stored_payload(&media_id),
            Some(vec![1, 1, 1, 1, 2, 2, 2, 2])
        );
    }

    #[tokio::test]
    async fn refuses_empty_uploads() {
        let backend = InMemoryBackend::new("principal-a");
        assert!(backend.upload_media_init(&init_request(0)).await.is_err());
        assert_eq!(backend.media_count(), 0);
    }

    #[tokio::test]
    async fn refuses_chunk_count_that_disagrees_with_size() {
        let backend = InMemoryBackend::new("principal-a");
        let inflated = UploadInitRequest {
            chunk_count: u32::MAX,
            ..init_request(1)
        };
        let short = UploadInitRequest {
            total_bytes: 9,
            ..init_request(2)
        };

        assert!(matches!(
            backend.upload_media_init(&inflated).await,
            Err(BackendError::Rejected(_))
        ));
        assert!(matches!(
            backend.upload_media_init(&short).await,
            Err(BackendError::Rejected(_))
        ));
        assert_eq!(backend.media_count(), 0);

        let partial_tail = UploadInitRequest {
            total_bytes: 5,
            ..init_request(2)
        };
        backend
            .upload_media_init(&partial_tail)
            .await
            .expect("short final chunk is a valid shape");
        assert_eq!(backend.media_count(), 1);
    }
}
