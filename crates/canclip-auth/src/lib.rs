#![warn(missing_docs)]
//! # canclip-auth
//!
//! ## Purpose
//! Models the identity collaborator boundary: which identity provider the
//! caller signs in with, and whether the backend currently recognises them.
//!
//! ## Responsibilities
//! - Resolve and validate the identity provider endpoint (HTTPS, or loopback
//!   for a local replica).
//! - Resolve the calling identity through an injectable [`MediaBackend`].
//! - Model safe session transitions used to gate uploads and listings.
//!
//! ## Data flow
//! Config selects a network -> [`identity_provider_url`] -> the host signs the
//! caller in -> [`AuthClient::authenticate`] calls the backend -> the returned
//! [`UserProfile`] drives [`AuthStateMachine`].
//!
//! ## Ownership and lifetimes
//! Profiles are owned clones of the backend answer so the state machine never
//! borrows from transport buffers.
//!
//! ## Error model
//! Endpoint policy violations, backend refusals and transport failures are
//! surfaced as [`AuthError`], letting the app either prompt sign-in again or
//! stay unauthenticated.
//!
//! ## Security and privacy notes
//! Delegation and key material stay with the host identity agent; this crate
//! only sees the textual principal and never logs more than that.
//!
//! ## Example
//! ```rust
//! use canclip_auth::{AuthState, AuthStateMachine};
//!
//! let machine = AuthStateMachine::new();
//! assert!(matches!(machine.state(), AuthState::Unauthenticated));
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use canclip_backend::{BackendError, MediaBackend};
use thiserror::Error;
use tracing::{info, warn};
use url::{Host, Url};

pub use canclip_backend::UserProfile;

/// Network name selecting the public identity provider.
pub const MAINNET: &str = "ic";

/// Identity provider used on the public network.
pub const MAINNET_IDENTITY_PROVIDER: &str = "https://identity.ic0.app/#authorize";

/// Origin of a locally running replica.
pub const LOCAL_REPLICA_ORIGIN: &str = "http://localhost:4943";

/// Runtime authentication state used to gate backend calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No identity is attached.
    Unauthenticated,
    /// Backend recognised the caller.
    Authenticated(UserProfile),
}

/// Auth state machine with explicit legal transitions.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    state: AuthState,
}

impl AuthStateMachine {
    /// Creates a new state machine in `Unauthenticated` state.
    pub fn new() -> Self {
        Self {
            state: AuthState::Unauthenticated,
        }
    }

    /// Returns current auth state snapshot.
    pub fn state(&self) -> &AuthState {
        &self.state
    }

    /// Applies a successful `authenticate` answer.
    pub fn on_authenticated(&mut self, user: UserProfile) {
        self.state = AuthState::Authenticated(user);
    }

    /// Explicit logout transition.
    pub fn logout(&mut self) {
        self.state = AuthState::Unauthenticated;
    }

    /// Returns the signed-in user, if any.
    pub fn user(&self) -> Option<&UserProfile> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Unauthenticated => None,
        }
    }

    /// Returns `true` while a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the identity provider for `network`.
///
/// `"ic"` selects the public provider; any other value targets a local
/// replica serving the identity canister `local_canister`.
///
/// # Errors
/// Returns [`AuthError::InvalidEndpoint`] when a local network is selected
/// without a canister id.
pub fn identity_provider_url(network: &str, local_canister: &str) -> Result<Url, AuthError> {
    if network.trim() == MAINNET {
        return validate_identity_provider(MAINNET_IDENTITY_PROVIDER);
    }

    let canister = local_canister.trim();
    if canister.is_empty() {
        return Err(AuthError::InvalidEndpoint(
            "local network requires an identity canister id".to_string(),
        ));
    }

    let mut url = validate_identity_provider(LOCAL_REPLICA_ORIGIN)?;
    url.query_pairs_mut().append_pair("canisterId", canister);
    Ok(url)
}

/// Validates identity provider endpoint policy.
///
/// # Errors
/// Returns [`AuthError::InvalidEndpoint`] for unparsable URLs and for plain
/// HTTP to anything but a loopback host.
pub fn validate_identity_provider(endpoint: &str) -> Result<Url, AuthError> {
    let parsed = Url::parse(endpoint).map_err(|error| {
        AuthError::InvalidEndpoint(format!("invalid identity provider url: {error}"))
    })?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if is_loopback(&parsed) => Ok(parsed),
        _ => Err(AuthError::InvalidEndpoint(
            "identity provider must use https unless it is a local replica".to_string(),
        )),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(address)) => IpAddr::V4(address).is_loopback(),
        Some(Host::Ipv6(address)) => IpAddr::V6(address).is_loopback(),
        None => false,
    }
}

/// Auth client that validates endpoint policy and resolves the caller.
#[derive(Clone)]
pub struct AuthClient {
    identity_provider: Url,
    backend: Arc<dyn MediaBackend>,
}

impl AuthClient {
    /// Creates a validated auth client.
    ///
    /// # Errors
    /// Returns [`AuthError::InvalidEndpoint`] when `identity_provider` fails
    /// [`validate_identity_provider`].
    pub fn new(
        identity_provider: &str,
        backend: Arc<dyn MediaBackend>,
    ) -> Result<Self, AuthError> {
        Ok(Self {
            identity_provider: validate_identity_provider(identity_provider)?,
            backend,
        })
    }

    /// Asks the backend who the caller is.
    ///
    /// # Errors
    /// - [`AuthError::Rejected`] when the backend answers `err`.
    /// - [`AuthError::Transport`] when no answer arrives.
    /// - [`AuthError::InvalidResponse`] when the principal is blank.
    pub async fn authenticate(&self) -> Result<UserProfile, AuthError> {
        let user = self.backend.authenticate().await.map_err(|error| {
            warn!(%error, "authentication failed");
            match error {
                BackendError::Rejected(reason) => AuthError::Rejected(reason),
                other => AuthError::Transport(other.reason()),
            }
        })?;

        if user.principal.trim().is_empty() {
            return Err(AuthError::InvalidResponse(
                "backend returned a blank principal".to_string(),
            ));
        }

        info!(principal = %user.principal, "caller authenticated");
        Ok(user)
    }

    /// Returns the configured identity provider.
    pub fn identity_provider(&self) -> &Url {
        &self.identity_provider
    }
}

/// Errors produced by auth client/state logic.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Endpoint violates security requirements.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    /// Backend refused to authenticate the caller.
    #[error("authentication rejected: {0}")]
    Rejected(String),
    /// Transport failure while calling the backend.
    #[error("auth transport failure: {0}")]
    Transport(String),
    /// Response payload violated auth contract expectations.
    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for endpoint policy and state transitions.

    use super::*;

    #[test]
    fn validates_expected_endpoint_policy() {
        validate_identity_provider("https://identity.example.test/#authorize")
            .expect("https should pass");
        validate_identity_provider("http://127.0.0.1:4943/").expect("loopback should pass");
        assert!(validate_identity_provider("http://identity.example.test/").is_err());
        assert!(validate_identity_provider("not a url").is_err());
    }

    #[test]
    fn state_machine_drops_user_on_logout() {
        let mut machine = AuthStateMachine::new();
        machine.on_authenticated(UserProfile {
            principal: "principal-a".to_string(),
            created_at: 1,
        });
        assert_eq!(machine.user().map(|user| user.principal.as_str()), Some("principal-a"));

        machine.logout();
        assert!(!machine.is_authenticated());
        assert!(machine.user().is_none());
    }
}
