//! Engine configuration loaded from `CANCLIP_*` environment variables.

use std::str::FromStr;

use canclip_auth::identity_provider_url;
use canclip_capture::StreamConstraints;
use canclip_core::{DEFAULT_CHUNK_SIZE, MediaKind, validate_chunk_size};
use canclip_transfer::OrphanPolicy;
use url::Url;

use crate::AppError;

/// Chunk size in bytes.
pub const ENV_CHUNK_SIZE: &str = "CANCLIP_CHUNK_SIZE";
/// `video` or `audio`.
pub const ENV_MEDIA_KIND: &str = "CANCLIP_MEDIA_KIND";
/// `leave` or `delete`.
pub const ENV_ORPHAN_POLICY: &str = "CANCLIP_ORPHAN_POLICY";
/// `ic` for the public network, anything else for a local replica.
pub const ENV_NETWORK: &str = "CANCLIP_NETWORK";
/// Identity canister id on a local replica.
pub const ENV_LOCAL_IDENTITY_CANISTER: &str = "CANCLIP_LOCAL_IDENTITY_CANISTER";

const DEFAULT_NETWORK: &str = "ic";

/// Runtime configuration for one [`crate::ClipEngine`].
///
/// The chunk size is fixed for the engine's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upload chunk size in bytes.
    pub chunk_size: usize,
    /// Media kind captured by the session.
    pub media_kind: MediaKind,
    /// Handling of incomplete backend entries after a failed chunk.
    pub orphan_policy: OrphanPolicy,
    /// Identity provider the host signs the caller in with.
    pub identity_provider: Url,
    /// Device constraints requested on preview.
    pub constraints: StreamConstraints,
}

impl EngineConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] for malformed values.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; unset keys use defaults.
    ///
    /// # Errors
    /// Returns [`AppError::Config`] naming the offending key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chunk_size = match lookup(ENV_CHUNK_SIZE) {
            Some(raw) => {
                let parsed = parse_var::<usize>(ENV_CHUNK_SIZE, &raw)?;
                validate_chunk_size(parsed)
                    .map_err(|error| AppError::Config(format!("{ENV_CHUNK_SIZE}: {error}")))?
            }
            None => DEFAULT_CHUNK_SIZE,
        };

        let media_kind = match lookup(ENV_MEDIA_KIND) {
            Some(raw) => parse_var::<MediaKind>(ENV_MEDIA_KIND, &raw)?,
            None => MediaKind::default(),
        };

        let orphan_policy = match lookup(ENV_ORPHAN_POLICY) {
            Some(raw) => parse_var::<OrphanPolicy>(ENV_ORPHAN_POLICY, &raw)?,
            None => OrphanPolicy::default(),
        };

        let network = lookup(ENV_NETWORK).unwrap_or_else(|| DEFAULT_NETWORK.to_string());
        let canister = lookup(ENV_LOCAL_IDENTITY_CANISTER).unwrap_or_default();
        let identity_provider = identity_provider_url(&network, &canister).map_err(|error| {
            AppError::Config(format!("{ENV_NETWORK}/{ENV_LOCAL_IDENTITY_CANISTER}: {error}"))
        })?;

        Ok(Self {
            chunk_size,
            media_kind,
            orphan_policy,
            identity_provider,
            constraints: StreamConstraints::for_kind(media_kind),
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| AppError::Config(format!("{key}={raw:?}: {error}")))
}

#[cfg(test)]
mod tests {
    //! Unit tests for environment parsing.

    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn unset_environment_uses_defaults() {
        let config = EngineConfig::from_lookup(|_| None).expect("defaults should load");
        assert_eq!(config.chunk_size, 500_000);
        assert_eq!(config.media_kind, MediaKind::Video);
        assert_eq!(config.orphan_policy, OrphanPolicy::Leave);
        assert_eq!(
            config.identity_provider.as_str(),
            "https://identity.ic0.app/#authorize"
        );
        assert_eq!(config.constraints, StreamConstraints::for_kind(MediaKind::Video));
    }

    #[test]
    fn reads_every_variable() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_CHUNK_SIZE, "1000"),
            (ENV_MEDIA_KIND, "audio"),
            (ENV_ORPHAN_POLICY, "delete"),
            (ENV_NETWORK, "local"),
            (ENV_LOCAL_IDENTITY_CANISTER, "be2us-64aaa-aaaaa-qaabq-cai"),
        ]))
        .expect("config should load");

        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.media_kind, MediaKind::Audio);
        assert_eq!(config.orphan_policy, OrphanPolicy::BestEffortDelete);
        assert_eq!(config.identity_provider.host_str(), Some("localhost"));
        assert!(config.constraints.video.is_none());
    }

    #[test]
    fn malformed_values_are_config_errors() {
        for (key, value) in [
            (ENV_CHUNK_SIZE, "lots"),
            (ENV_CHUNK_SIZE, "0"),
            (ENV_CHUNK_SIZE, "2000001"),
            (ENV_MEDIA_KIND, "image"),
            (ENV_ORPHAN_POLICY, "purge"),
            (ENV_NETWORK, "local"),
        ] {
            let result = EngineConfig::from_lookup(lookup_from(&[(key, value)]));
            assert!(
                matches!(result, Err(AppError::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
