//! Integration tests for identity provider resolution and backend sign-in.

use std::sync::Arc;

use canclip_auth::{AuthClient, AuthError, AuthStateMachine, identity_provider_url};
use canclip_backend::InMemoryBackend;

#[test]
fn identity_provider_tests_selects_mainnet_provider() {
    let url = identity_provider_url("ic", "").expect("mainnet should resolve");
    assert_eq!(url.as_str(), "https://identity.ic0.app/#authorize");
}

#[test]
fn identity_provider_tests_targets_local_canister() {
    let url = identity_provider_url("local", "rdmx6-jaaaa-aaaaa-aaadq-cai")
        .expect("local replica should resolve");
    assert_eq!(url.scheme(), "http");
    assert_eq!(url.host_str(), Some("localhost"));
    assert_eq!(url.port(), Some(4943));
    assert_eq!(url.query(), Some("canisterId=rdmx6-jaaaa-aaaaa-aaadq-cai"));
}

#[test]
fn identity_provider_tests_local_requires_canister() {
    assert!(matches!(
        identity_provider_url("local", "  "),
        Err(AuthError::InvalidEndpoint(_))
    ));
}

#[tokio::test]
async fn identity_provider_tests_authenticates_through_backend() {
    let backend = Arc::new(InMemoryBackend::new("principal-a"));
    let client = AuthClient::new("https://identity.ic0.app/#authorize", backend)
        .expect("client should build");

    let user = client.authenticate().await.expect("authentication should succeed");
    let mut machine = AuthStateMachine::new();
    machine.on_authenticated(user);

    assert!(machine.is_authenticated());
    assert_eq!(machine.user().map(|user| user.principal.as_str()), Some("principal-a"));
}

#[tokio::test]
async fn identity_provider_tests_maps_backend_refusal() {
    let backend = Arc::new(InMemoryBackend::new("principal-a"));
    backend.deny_authentication("anonymous caller");
    let client = AuthClient::new("http://localhost:4943/?canisterId=abc", backend)
        .expect("loopback provider should be accepted");

    let error = client.authenticate().await.expect_err("refusal should surface");
    assert!(matches!(error, AuthError::Rejected(reason) if reason == "anonymous caller"));
}

#[test]
fn identity_provider_tests_rejects_plain_http_remote() {
    let backend = Arc::new(InMemoryBackend::new("principal-a"));
    assert!(matches!(
        AuthClient::new("http://identity.example.test/", backend),
        Err(AuthError::InvalidEndpoint(_))
    ));
}
