#![warn(missing_docs)]
//! # canclip-transfer
//!
//! ## Purpose
//! Moves arbitrarily large payloads through a backend that only accepts
//! bounded chunks, and keeps the client-side view of stored media current.
//!
//! ## Responsibilities
//! - Open upload sessions and send chunks strictly in index order.
//! - Fetch chunks in index order and reassemble them all-or-nothing.
//! - Cache the caller's media descriptors with whole-list replacement.
//! - Compute SHA-256 digests for byte-exact round-trip verification.
//!
//! ## Data flow
//! Finished payload -> [`UploadPipeline::upload`] -> backend ->
//! [`MediaRegistry::refresh`] -> [`MediaDescriptor`] ->
//! [`DownloadPipeline::fetch`] -> [`ReassembledPayload`].
//!
//! ## Ownership and lifetimes
//! Pipelines borrow the payload for the duration of one upload and own the
//! reassembled buffer they return. The registry hands out `Arc` snapshots so
//! readers never observe a partially replaced list.
//!
//! ## Error model
//! Every failure is terminal for the current job or fetch and is reported as
//! [`TransferError`] or [`RegistryError`]; nothing is retried automatically.
//!
//! ## Security and privacy notes
//! Payload bytes are never logged; only ids, indices, sizes, and reasons.
//!
//! [`MediaDescriptor`]: canclip_core::MediaDescriptor

mod download;
mod registry;
mod upload;

use std::str::FromStr;

use canclip_core::{CoreError, MediaId};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use download::{DownloadPipeline, ReassembledPayload};
pub use registry::{MediaRegistry, RegistryError};
pub use upload::{UploadJob, UploadPipeline, UploadProgress, UploadReport};

/// What the upload pipeline does with a backend entry left incomplete by a
/// failed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Leave the partial entry for the backend to tolerate or collect.
    #[default]
    Leave,
    /// Issue one `deleteMedia` for the partial entry; failures are logged.
    BestEffortDelete,
}

impl FromStr for OrphanPolicy {
    type Err = TransferError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "leave" => Ok(OrphanPolicy::Leave),
            "delete" => Ok(OrphanPolicy::BestEffortDelete),
            other => Err(TransferError::InvalidOrphanPolicy(other.to_string())),
        }
    }
}

/// Returns the lowercase hex SHA-256 digest of `payload`.
pub fn payload_digest(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// How a caller may react to a transfer failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Repeating the same call from a clean state may succeed.
    Retriable,
    /// The job is dead; a new upload must start from scratch.
    RestartRequired,
    /// The input itself is unusable.
    InvalidInput,
}

/// Classifies a transfer failure for caller retry/prompt decisions.
pub fn classify_transfer_error(error: &TransferError) -> FailureClass {
    match error {
        TransferError::SessionOpen { .. } | TransferError::ChunkFetch { .. } => {
            FailureClass::Retriable
        }
        TransferError::ChunkTransfer { .. } => FailureClass::RestartRequired,
        TransferError::EmptyPayload
        | TransferError::Plan(_)
        | TransferError::InvalidDescriptor(_)
        | TransferError::InvalidOrphanPolicy(_) => FailureClass::InvalidInput,
    }
}

/// Upload and download pipeline errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Nothing to upload.
    #[error("payload is empty")]
    EmptyPayload,
    /// Payload could not be partitioned.
    #[error("cannot plan chunks: {0}")]
    Plan(#[from] CoreError),
    /// Backend refused to allocate a media id; no chunk was sent.
    #[error("upload session refused: {reason}")]
    SessionOpen {
        /// Backend-reported reason.
        reason: String,
    },
    /// Chunk `index` was rejected or lost; later chunks were never sent and
    /// the backend entry is left incomplete.
    #[error("chunk {index} of {media_id} failed: {reason}")]
    ChunkTransfer {
        /// Media entry left incomplete.
        media_id: MediaId,
        /// First failing chunk index.
        index: u32,
        /// Backend-reported reason.
        reason: String,
    },
    /// Chunk `index` was missing, empty, or unreachable; nothing was
    /// reassembled.
    #[error("chunk {index} could not be fetched: {reason}")]
    ChunkFetch {
        /// First failing chunk index.
        index: u32,
        /// Failure detail.
        reason: String,
    },
    /// Descriptor cannot be reassembled.
    #[error("invalid media descriptor: {0}")]
    InvalidDescriptor(String),
    /// Orphan policy name is not recognised.
    #[error("unknown orphan policy: {0}")]
    InvalidOrphanPolicy(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for digests and failure classification.

    use super::*;

    #[test]
    fn digest_is_stable_lowercase_hex() {
        assert_eq!(
            payload_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chunk_transfer_requires_restart() {
        let error = TransferError::ChunkTransfer {
            media_id: MediaId::new("media-1").unwrap(),
            index: 2,
            reason: "quota".to_string(),
        };
        assert_eq!(classify_transfer_error(&error), FailureClass::RestartRequired);
        assert_eq!(
            classify_transfer_error(&TransferError::SessionOpen {
                reason: "busy".to_string()
            }),
            FailureClass::Retriable
        );
    }

    #[test]
    fn parses_orphan_policy() {
        assert_eq!("delete".parse::<OrphanPolicy>().unwrap(), OrphanPolicy::BestEffortDelete);
        assert!("purge".parse::<OrphanPolicy>().is_err());
    }
}
