#![warn(missing_docs)]
//! # canclip-core
//!
//! ## Purpose
//! Defines the pure data model shared across the `canclip` workspace.
//!
//! ## Responsibilities
//! - Represent media kinds, backend-assigned media ids, and media descriptors.
//! - Partition finished payloads into deterministic, ordered chunk ranges.
//! - Compute upload progress and human-readable sizes.
//!
//! ## Data flow
//! Capture produces a finished payload -> [`split_payload`] yields a
//! [`ChunkPlan`] -> the upload pipeline sends each [`ChunkRange`] in index
//! order. The backend later returns [`MediaDescriptor`] values that drive
//! download and reassembly.
//!
//! ## Ownership and lifetimes
//! A [`ChunkPlan`] stores only byte offsets, never payload bytes, so the same
//! plan can slice the payload it was built from without copying it.
//!
//! ## Error model
//! Invalid chunk sizes, blank media ids, and unknown media kinds are reported
//! as [`CoreError`] variants.
//!
//! ## Example
//! ```rust
//! use canclip_core::split_payload;
//!
//! let payload = vec![7_u8; 1_200_000];
//! let plan = split_payload(&payload, 500_000).expect("valid chunk size");
//! assert_eq!(plan.chunk_count(), 3);
//! assert_eq!(plan.ranges()[2].len(), 200_000);
//! ```

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Chunk size used when no explicit policy is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500_000;

/// Largest chunk the backend accepts in a single message.
pub const MAX_CHUNK_SIZE: usize = 2_000_000;

/// Kind of recorded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Audio and video tracks.
    #[default]
    Video,
    /// Audio track only.
    Audio,
}

impl MediaKind {
    /// Returns the wire tag sent as `mediaType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
        }
    }

    /// Returns the container mime type produced by the recorder.
    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaKind::Video => "video/webm",
            MediaKind::Audio => "audio/webm",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaKind::Video),
            "audio" => Ok(MediaKind::Audio),
            other => Err(CoreError::UnknownMediaKind(other.to_string())),
        }
    }
}

/// Opaque media identifier assigned by the backend when an upload opens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    /// Wraps a backend-issued identifier.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidMediaId`] when `raw` is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(CoreError::InvalidMediaId);
        }
        Ok(Self(raw))
    }

    /// Returns the identifier as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backend-held metadata describing one stored recording.
///
/// The client only ever holds read-only copies obtained from a registry
/// refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDescriptor {
    /// Backend-assigned identifier.
    pub id: MediaId,
    /// Logical recording name.
    pub name: String,
    /// Media kind tag.
    pub media_type: MediaKind,
    /// Number of chunks declared when the upload opened.
    pub chunk_count: u32,
    /// Declared chunk size; advisory only.
    pub chunk_size: u64,
    /// Declared payload length in bytes; descriptive only.
    pub total_size: u64,
    /// Creation time in Unix epoch nanoseconds.
    pub created_at: i64,
}

impl MediaDescriptor {
    /// Converts the nanosecond creation timestamp into UTC wall-clock time.
    pub fn created_at_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.created_at)
    }

    /// Serializes the descriptor to compact JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(CoreError::Codec)
    }

    /// Deserializes a descriptor from JSON bytes.
    ///
    /// # Errors
    /// Returns [`CoreError::Codec`] when JSON decoding fails.
    pub fn from_json_bytes(raw: &[u8]) -> Result<Self, CoreError> {
        serde_json::from_slice(raw).map_err(CoreError::Codec)
    }
}

/// One contiguous byte range of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    /// Zero-based chunk index.
    pub index: u32,
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
}

impl ChunkRange {
    /// Returns the range length in bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Returns `true` for a zero-length range.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Returns the range as a slice index.
    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Ordered partition of a payload into chunk ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunk_size: usize,
    total_bytes: usize,
    ranges: Vec<ChunkRange>,
}

impl ChunkPlan {
    /// Returns the chunk size the plan was built with.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the payload length covered by the plan.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Returns `ceil(total_bytes / chunk_size)`.
    pub fn chunk_count(&self) -> u32 {
        // Fits: `split_payload` rejects plans with more than `u32::MAX` ranges.
        self.ranges.len() as u32
    }

    /// Returns all ranges in index order.
    pub fn ranges(&self) -> &[ChunkRange] {
        &self.ranges
    }

    /// Returns the bytes of chunk `index` from the payload the plan was built
    /// from.
    ///
    /// # Errors
    /// Returns [`CoreError::ChunkOutOfRange`] for an index past the end, and
    /// [`CoreError::PayloadMismatch`] when `payload` is not the planned length.
    pub fn chunk<'a>(&self, payload: &'a [u8], index: u32) -> Result<&'a [u8], CoreError> {
        if payload.len() != self.total_bytes {
            return Err(CoreError::PayloadMismatch {
                expected: self.total_bytes,
                actual: payload.len(),
            });
        }

        let range = self
            .ranges
            .get(index as usize)
            .ok_or(CoreError::ChunkOutOfRange {
                index,
                count: self.chunk_count(),
            })?;
        Ok(&payload[range.as_range()])
    }
}

/// Partitions `payload` into ordered ranges of `chunk_size` bytes.
///
/// # Semantics
/// Every range is exactly `chunk_size` long except possibly the last, which
/// holds the remainder. An empty payload yields an empty plan. The same
/// inputs always produce the same ranges.
///
/// # Errors
/// Returns [`CoreError::InvalidChunkSize`] when `chunk_size == 0` and
/// [`CoreError::TooManyChunks`] when the count would not fit in `u32`.
pub fn split_payload(payload: &[u8], chunk_size: usize) -> Result<ChunkPlan, CoreError> {
    let count = chunk_count(payload.len(), chunk_size)?;

    let ranges = (0..count)
        .map(|index| {
            let start = index as usize * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            ChunkRange { index, start, end }
        })
        .collect();

    Ok(ChunkPlan {
        chunk_size,
        total_bytes: payload.len(),
        ranges,
    })
}

/// Returns `ceil(len / chunk_size)`.
///
/// # Errors
/// Returns [`CoreError::InvalidChunkSize`] when `chunk_size == 0` and
/// [`CoreError::TooManyChunks`] when the count would not fit in `u32`.
pub fn chunk_count(len: usize, chunk_size: usize) -> Result<u32, CoreError> {
    if chunk_size == 0 {
        return Err(CoreError::InvalidChunkSize);
    }

    u32::try_from(len.div_ceil(chunk_size)).map_err(|_| CoreError::TooManyChunks)
}

/// Validates a chunk-size policy against the backend message ceiling.
///
/// # Errors
/// Returns [`CoreError::InvalidChunkSize`] for zero and
/// [`CoreError::ChunkSizeTooLarge`] above [`MAX_CHUNK_SIZE`].
pub fn validate_chunk_size(chunk_size: usize) -> Result<usize, CoreError> {
    if chunk_size == 0 {
        return Err(CoreError::InvalidChunkSize);
    }
    if chunk_size > MAX_CHUNK_SIZE {
        return Err(CoreError::ChunkSizeTooLarge {
            size: chunk_size,
            max: MAX_CHUNK_SIZE,
        });
    }
    Ok(chunk_size)
}

/// Returns `round(acknowledged / total * 100)` clamped to `[0, 100]`.
///
/// A zero-chunk job reports 0. The result is 100 only once every chunk is
/// acknowledged; large jobs one chunk short report 99.
pub fn progress_percent(acknowledged: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }

    let acknowledged = u64::from(acknowledged.min(total));
    let total = u64::from(total);
    // Half-up rounding in integer arithmetic.
    let rounded = (acknowledged * 200 + total) / (total * 2);
    if acknowledged < total {
        rounded.min(99) as u8
    } else {
        100
    }
}

/// Returns the default logical name for a recording finished at `now_ms`.
pub fn recording_name(now_ms: u64) -> String {
    format!("Recording_{now_ms}")
}

/// Formats a byte count as `Bytes`, `KB`, `MB`, or `GB` with at most two
/// decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}

/// Error type for core domain validation and codec failures.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Chunk size must be strictly positive.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Chunk size exceeds the backend message ceiling.
    #[error("chunk size {size} exceeds backend limit of {max} bytes")]
    ChunkSizeTooLarge {
        /// Requested chunk size.
        size: usize,
        /// Largest accepted chunk size.
        max: usize,
    },
    /// Payload would need more chunks than the wire index can address.
    #[error("payload needs more than u32::MAX chunks")]
    TooManyChunks,
    /// Requested chunk index is past the end of the plan.
    #[error("chunk {index} out of range for {count} chunks")]
    ChunkOutOfRange {
        /// Requested index.
        index: u32,
        /// Number of chunks in the plan.
        count: u32,
    },
    /// Payload length differs from the planned length.
    #[error("payload length mismatch: planned {expected} bytes, got {actual}")]
    PayloadMismatch {
        /// Planned length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Media id cannot be blank.
    #[error("media id is empty")]
    InvalidMediaId,
    /// Media kind tag is not recognised.
    #[error("unknown media kind: {0}")]
    UnknownMediaKind(String),
    /// JSON encoding/decoding error.
    #[error("descriptor codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}
