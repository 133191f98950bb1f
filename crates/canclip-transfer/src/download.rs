//! Ordered chunk fetch and all-or-nothing reassembly.

use std::sync::Arc;

use canclip_backend::MediaBackend;
use canclip_core::{MAX_CHUNK_SIZE, MediaDescriptor, MediaId, MediaKind};
use tracing::{debug, info, warn};

use crate::{TransferError, payload_digest};

/// Upper bound on the buffer reserved up front from a descriptor's
/// advertised size.
const MAX_PREALLOCATION: usize = 64 * MAX_CHUNK_SIZE;

/// A payload rebuilt from every chunk of one media entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReassembledPayload {
    /// Source media id.
    pub media_id: MediaId,
    /// Declared media kind.
    pub kind: MediaKind,
    /// Concatenated chunk bytes in index order.
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub sha256: String,
}

impl ReassembledPayload {
    /// Returns the mime type the payload should be presented with.
    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }

    /// Returns the payload length.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the payload holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the payload and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Fetches chunks `0..chunk_count` strictly in order and concatenates them.
#[derive(Clone)]
pub struct DownloadPipeline {
    backend: Arc<dyn MediaBackend>,
}

impl DownloadPipeline {
    /// Creates a pipeline over `backend`.
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Reassembles the payload described by `descriptor`.
    ///
    /// # Errors
    /// - [`TransferError::InvalidDescriptor`] when the descriptor declares no
    ///   chunks.
    /// - [`TransferError::ChunkFetch`] on the first missing, empty, or
    ///   unreachable chunk. No partial payload is returned.
    pub async fn fetch(
        &self,
        descriptor: &MediaDescriptor,
    ) -> Result<ReassembledPayload, TransferError> {
        if descriptor.chunk_count == 0 {
            return Err(TransferError::InvalidDescriptor(format!(
                "media {} declares zero chunks",
                descriptor.id
            )));
        }

        let reserve = usize::try_from(descriptor.total_size)
            .unwrap_or(MAX_PREALLOCATION)
            .min(MAX_PREALLOCATION);
        let mut bytes = Vec::with_capacity(reserve);

        for index in 0..descriptor.chunk_count {
            let chunk = match self.backend.get_media_chunk(&descriptor.id, index).await {
                Ok(Some(chunk)) if chunk.is_empty() => {
                    return Err(fetch_failure(&descriptor.id, index, "chunk is empty".into()));
                }
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    return Err(fetch_failure(&descriptor.id, index, "chunk is missing".into()));
                }
                Err(error) => return Err(fetch_failure(&descriptor.id, index, error.reason())),
            };

            debug!(media_id = %descriptor.id, index, len = chunk.len(), "chunk fetched");
            bytes.extend_from_slice(&chunk);
        }

        if bytes.len() as u64 != descriptor.total_size {
            debug!(
                media_id = %descriptor.id,
                declared = descriptor.total_size,
                actual = bytes.len(),
                "reassembled length differs from descriptor"
            );
        }

        info!(
            media_id = %descriptor.id,
            chunks = descriptor.chunk_count,
            bytes = bytes.len(),
            "payload reassembled"
        );
        let sha256 = payload_digest(&bytes);
        Ok(ReassembledPayload {
            media_id: descriptor.id.clone(),
            kind: descriptor.media_type,
            bytes,
            sha256,
        })
    }
}

fn fetch_failure(media_id: &MediaId, index: u32, reason: String) -> TransferError {
    warn!(%media_id, index, %reason, "chunk fetch failed; discarding partial payload");
    TransferError::ChunkFetch { index, reason }
}
