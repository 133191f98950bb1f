#![warn(missing_docs)]
//! # canclip-backend
//!
//! ## Purpose
//! Defines the RPC contract of the size-limited media backend and the wire
//! codec for its `{ok}` / `{err}` results.
//!
//! ## Responsibilities
//! - Declare the [`MediaBackend`] calls the transfer engine consumes.
//! - Decode kind-tagged results into `Result` values.
//! - Provide [`InMemoryBackend`], a reference double with fault injection.
//!
//! ## Data flow
//! Transfer pipelines call [`MediaBackend`] methods -> an implementation
//! performs the RPC -> raw `{ok: T} | {err: string}` results are mapped by
//! [`RpcResult::into_result`] into `Result<T, BackendError>`.
//!
//! ## Ownership and lifetimes
//! Chunk bytes are borrowed on upload and owned on download so callers can
//! concatenate them without copying transport buffers twice.
//!
//! ## Error model
//! Backend refusals (`err` variants) become [`BackendError::Rejected`] with
//! the backend-reported reason; transport failures become
//! [`BackendError::Transport`].
//!
//! ## Security and privacy notes
//! Authorization is the backend's concern; this crate never inspects or
//! stores identity material beyond the returned principal.

mod memory;

use async_trait::async_trait;
use canclip_core::{MediaDescriptor, MediaId, MediaKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::{BackendCall, InMemoryBackend};

/// Kind-tagged RPC result as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcResult<T> {
    /// Call succeeded.
    Ok(T),
    /// Call was refused with a reason.
    Err(String),
}

impl<T> RpcResult<T> {
    /// Converts into a standard `Result`.
    ///
    /// # Errors
    /// Returns [`BackendError::Rejected`] carrying the `err` reason.
    pub fn into_result(self) -> Result<T, BackendError> {
        match self {
            RpcResult::Ok(value) => Ok(value),
            RpcResult::Err(reason) => Err(BackendError::Rejected(reason)),
        }
    }
}

impl<T> From<Result<T, String>> for RpcResult<T> {
    fn from(result: Result<T, String>) -> Self {
        match result {
            Ok(value) => RpcResult::Ok(value),
            Err(reason) => RpcResult::Err(reason),
        }
    }
}

/// Arguments of `uploadMediaInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadInitRequest {
    /// Logical recording name.
    pub name: String,
    /// Media kind tag.
    pub media_type: MediaKind,
    /// Number of chunks that will follow.
    pub chunk_count: u32,
    /// Size of every chunk but possibly the last.
    pub chunk_size: u64,
    /// Total payload length in bytes.
    pub total_bytes: u64,
}

/// Authenticated caller as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Caller principal in textual form.
    pub principal: String,
    /// First-seen time in Unix epoch nanoseconds.
    pub created_at: i64,
}

/// `ok` payload of `authenticate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticateOk {
    /// Authenticated user.
    pub user: UserProfile,
}

/// RPC surface of the media backend.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Allocates a media id for an upload of `request.chunk_count` chunks.
    async fn upload_media_init(
        &self,
        request: &UploadInitRequest,
    ) -> Result<MediaId, BackendError>;

    /// Stores chunk `chunk_index` of `media_id`. `Ok` means acknowledged.
    async fn upload_media_chunk(
        &self,
        media_id: &MediaId,
        chunk_index: u32,
        chunk: &[u8],
    ) -> Result<(), BackendError>;

    /// Fetches chunk `chunk_index` of `media_id`; `None` when absent.
    async fn get_media_chunk(
        &self,
        media_id: &MediaId,
        chunk_index: u32,
    ) -> Result<Option<Vec<u8>>, BackendError>;

    /// Lists the caller's media descriptors in backend order.
    async fn get_user_media(&self) -> Result<Vec<MediaDescriptor>, BackendError>;

    /// Deletes `media_id` and its chunks.
    async fn delete_media(&self, media_id: &MediaId) -> Result<(), BackendError>;

    /// Resolves the calling identity.
    async fn authenticate(&self) -> Result<UserProfile, BackendError>;
}

/// Decodes a raw `{ok: T} | {err: string}` JSON result.
///
/// # Errors
/// Returns [`BackendError::Decode`] for malformed JSON and
/// [`BackendError::Rejected`] for an `err` result.
pub fn decode_rpc_result<T: DeserializeOwned>(raw: &str) -> Result<T, BackendError> {
    let parsed: RpcResult<T> = serde_json::from_str(raw).map_err(BackendError::Decode)?;
    parsed.into_result()
}

/// Decodes a raw `getUserMedia` listing.
///
/// # Errors
/// Returns [`BackendError::Decode`] for malformed JSON and
/// [`BackendError::InvalidContract`] when a descriptor declares no chunks.
pub fn decode_media_listing(raw: &str) -> Result<Vec<MediaDescriptor>, BackendError> {
    let listing: Vec<MediaDescriptor> =
        serde_json::from_str(raw).map_err(BackendError::Decode)?;

    if let Some(descriptor) = listing.iter().find(|descriptor| descriptor.chunk_count == 0) {
        return Err(BackendError::InvalidContract(format!(
            "media {} declares zero chunks",
            descriptor.id
        )));
    }

    Ok(listing)
}

/// Backend call errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend answered with an `err` result.
    #[error("backend rejected call: {0}")]
    Rejected(String),
    /// Call never produced a backend answer.
    #[error("backend transport failure: {0}")]
    Transport(String),
    /// JSON decode failure.
    #[error("backend response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Decoded payload violates contract invariants.
    #[error("backend contract violation: {0}")]
    InvalidContract(String),
}

impl BackendError {
    /// Returns the human-readable reason without the error prefix.
    pub fn reason(&self) -> String {
        match self {
            BackendError::Rejected(reason)
            | BackendError::Transport(reason)
            | BackendError::InvalidContract(reason) => reason.clone(),
            BackendError::Decode(error) => error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for kind-tagged result decoding.

    use super::*;

    #[test]
    fn decodes_ok_and_err_variants() {
        let id: MediaId = decode_rpc_result(r#"{"ok":"media-1"}"#).expect("ok should decode");
        assert_eq!(id.as_str(), "media-1");

        let error = decode_rpc_result::<MediaId>(r#"{"err":"quota exceeded"}"#)
            .expect_err("err should map to rejection");
        assert!(matches!(error, BackendError::Rejected(reason) if reason == "quota exceeded"));
    }

    #[test]
    fn unit_ok_serializes_as_null() {
        let encoded = serde_json::to_string(&RpcResult::<()>::Ok(())).expect("encode");
        assert_eq!(encoded, r#"{"ok":null}"#);
    }
}
