//! Sequential chunked upload.

use std::sync::Arc;

use canclip_backend::{MediaBackend, UploadInitRequest};
use canclip_core::{
    ChunkPlan, MediaId, MediaKind, progress_percent, split_payload, validate_chunk_size,
};
use tracing::{debug, info, warn};

use crate::{MediaRegistry, OrphanPolicy, TransferError, payload_digest};

/// Progress snapshot delivered after the session opens and after every
/// acknowledged chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    /// Media id allocated for this upload.
    pub media_id: MediaId,
    /// Chunks acknowledged so far.
    pub acknowledged_chunks: u32,
    /// Total chunks in the job.
    pub total_chunks: u32,
    /// `round(acknowledged / total * 100)`.
    pub percent: u8,
}

/// State of one in-flight upload.
///
/// Chunk shape is fixed at creation; `next_chunk_index` only ever advances by
/// one acknowledged chunk at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    media_id: MediaId,
    total_chunks: u32,
    chunk_size: usize,
    total_bytes: usize,
    next_chunk_index: u32,
}

impl UploadJob {
    fn opened(media_id: MediaId, plan: &ChunkPlan) -> Self {
        Self {
            media_id,
            total_chunks: plan.chunk_count(),
            chunk_size: plan.chunk_size(),
            total_bytes: plan.total_bytes(),
            next_chunk_index: 0,
        }
    }

    /// Returns the backend-assigned media id.
    pub fn media_id(&self) -> &MediaId {
        &self.media_id
    }

    /// Returns the declared chunk count.
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    /// Returns the declared chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the declared payload length.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Returns the index of the next chunk to send.
    pub fn next_chunk_index(&self) -> u32 {
        self.next_chunk_index
    }

    /// Returns the acknowledged share of the job in percent.
    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.next_chunk_index, self.total_chunks)
    }

    /// Returns a progress snapshot.
    pub fn progress(&self) -> UploadProgress {
        UploadProgress {
            media_id: self.media_id.clone(),
            acknowledged_chunks: self.next_chunk_index,
            total_chunks: self.total_chunks,
            percent: self.progress_percent(),
        }
    }

    fn acknowledge(&mut self) {
        self.next_chunk_index += 1;
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    /// Backend-assigned media id.
    pub media_id: MediaId,
    /// Logical name the upload declared.
    pub name: String,
    /// Media kind the upload declared.
    pub kind: MediaKind,
    /// Number of chunks sent and acknowledged.
    pub chunk_count: u32,
    /// Payload length in bytes.
    pub total_bytes: usize,
    /// Hex SHA-256 of the uploaded payload.
    pub sha256: String,
    /// Whether the attached registry was refreshed afterwards.
    pub registry_refreshed: bool,
    /// Why the post-upload refresh failed, when it did. The cached list is
    /// stale until the next successful refresh.
    pub registry_refresh_error: Option<String>,
}

/// Opens upload sessions and sends chunks strictly in index order.
#[derive(Clone)]
pub struct UploadPipeline {
    backend: Arc<dyn MediaBackend>,
    chunk_size: usize,
    orphan_policy: OrphanPolicy,
    registry: Option<Arc<MediaRegistry>>,
}

impl UploadPipeline {
    /// Creates a pipeline with a fixed chunk-size policy.
    ///
    /// # Errors
    /// Returns [`TransferError::Plan`] when `chunk_size` is zero or above the
    /// backend message ceiling.
    pub fn new(backend: Arc<dyn MediaBackend>, chunk_size: usize) -> Result<Self, TransferError> {
        Ok(Self {
            backend,
            chunk_size: validate_chunk_size(chunk_size)?,
            orphan_policy: OrphanPolicy::default(),
            registry: None,
        })
    }

    /// Sets how incomplete backend entries are handled after a chunk failure.
    pub fn with_orphan_policy(mut self, orphan_policy: OrphanPolicy) -> Self {
        self.orphan_policy = orphan_policy;
        self
    }

    /// Refreshes `registry` after every completed upload.
    pub fn with_registry(mut self, registry: Arc<MediaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the chunk-size policy.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Uploads `payload` without progress reporting.
    ///
    /// # Errors
    /// See [`UploadPipeline::upload_with_progress`].
    pub async fn upload(
        &self,
        name: &str,
        kind: MediaKind,
        payload: &[u8],
    ) -> Result<UploadReport, TransferError> {
        self.upload_with_progress(name, kind, payload, |_| {}).await
    }

    /// Uploads `payload`, calling `on_progress` once after the session opens
    /// and once after every acknowledged chunk.
    ///
    /// # Errors
    /// - [`TransferError::EmptyPayload`] before any backend call.
    /// - [`TransferError::SessionOpen`] when the backend refuses the session;
    ///   no chunk is sent.
    /// - [`TransferError::ChunkTransfer`] on the first rejected or failed
    ///   chunk; later chunks are never sent.
    pub async fn upload_with_progress<F>(
        &self,
        name: &str,
        kind: MediaKind,
        payload: &[u8],
        mut on_progress: F,
    ) -> Result<UploadReport, TransferError>
    where
        F: FnMut(UploadProgress) + Send,
    {
        if payload.is_empty() {
            return Err(TransferError::EmptyPayload);
        }

        let plan = split_payload(payload, self.chunk_size)?;
        let request = UploadInitRequest {
            name: name.to_string(),
            media_type: kind,
            chunk_count: plan.chunk_count(),
            chunk_size: self.chunk_size as u64,
            total_bytes: payload.len() as u64,
        };

        let media_id = self
            .backend
            .upload_media_init(&request)
            .await
            .map_err(|error| {
                warn!(%error, recording = name, "upload session refused");
                TransferError::SessionOpen {
                    reason: error.reason(),
                }
            })?;

        let mut job = UploadJob::opened(media_id, &plan);
        info!(
            media_id = %job.media_id(),
            chunks = job.total_chunks(),
            bytes = job.total_bytes(),
            %kind,
            "upload session opened"
        );
        on_progress(job.progress());

        for range in plan.ranges() {
            let chunk = &payload[range.as_range()];
            if let Err(error) = self
                .backend
                .upload_media_chunk(job.media_id(), range.index, chunk)
                .await
            {
                warn!(
                    media_id = %job.media_id(),
                    index = range.index,
                    %error,
                    "chunk transfer failed; aborting upload"
                );
                self.handle_orphan(job.media_id()).await;
                return Err(TransferError::ChunkTransfer {
                    media_id: job.media_id().clone(),
                    index: range.index,
                    reason: error.reason(),
                });
            }

            job.acknowledge();
            debug!(
                media_id = %job.media_id(),
                index = range.index,
                percent = job.progress_percent(),
                "chunk acknowledged"
            );
            on_progress(job.progress());
        }

        let (registry_refreshed, registry_refresh_error) = match &self.registry {
            Some(registry) => match registry.refresh().await {
                Ok(_) => (true, None),
                Err(error) => {
                    warn!(%error, "registry refresh after upload failed");
                    (false, Some(error.to_string()))
                }
            },
            None => (false, None),
        };

        info!(media_id = %job.media_id(), "upload complete");
        Ok(UploadReport {
            media_id: job.media_id().clone(),
            name: name.to_string(),
            kind,
            chunk_count: job.total_chunks(),
            total_bytes: job.total_bytes(),
            sha256: payload_digest(payload),
            registry_refreshed,
            registry_refresh_error,
        })
    }

    async fn handle_orphan(&self, media_id: &MediaId) {
        match self.orphan_policy {
            OrphanPolicy::Leave => {
                info!(%media_id, "leaving incomplete media entry on backend");
            }
            OrphanPolicy::BestEffortDelete => match self.backend.delete_media(media_id).await {
                Ok(()) => info!(%media_id, "deleted incomplete media entry"),
                Err(error) => warn!(%media_id, %error, "cleanup of incomplete media entry failed"),
            },
        }
    }
}
