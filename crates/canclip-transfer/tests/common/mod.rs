//! Shared fixtures for transfer integration tests.

use std::sync::Arc;

use canclip_backend::InMemoryBackend;

/// Creates a fresh in-memory backend for one test principal.
#[allow(dead_code)]
pub fn fixture_backend() -> Arc<InMemoryBackend> {
    Arc::new(InMemoryBackend::new("principal-test"))
}

/// Creates a deterministic payload of `len` bytes.
#[allow(dead_code)]
pub fn fixture_payload(len: usize) -> Vec<u8> {
    (0..len).map(|value| (value % 251) as u8).collect()
}
