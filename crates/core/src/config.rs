//! Environment-driven configuration for the lifecycle manager and the name
//! resolver.
//!
//! Every setting has a default suitable for local development; unparsable
//! values are logged and replaced by the default.

use std::str::FromStr;

/// Settings for [`crate::lifecycle::SiteLifecycle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Send the loaded document version with every write and fail with
    /// `Conflict` if another writer got there first. Off by default: writes
    /// are last-writer-wins.
    pub optimistic_concurrency: bool,
}

impl LifecycleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default |
    /// |-----------------------------------|---------|
    /// | `CHANTIER_OPTIMISTIC_CONCURRENCY` | `false` |
    pub fn from_env() -> Self {
        Self {
            optimistic_concurrency: env_or("CHANTIER_OPTIMISTIC_CONCURRENCY", false),
        }
    }
}

/// Default number of id characters kept in a fallback display name.
pub const DEFAULT_FALLBACK_ID_LEN: usize = 8;

/// Settings for [`crate::resolver::NameResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// How many leading characters of an unresolvable user id appear in its
    /// fallback label.
    pub fallback_id_len: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_id_len: DEFAULT_FALLBACK_ID_LEN,
        }
    }
}

impl ResolverConfig {
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `CHANTIER_FALLBACK_ID_LEN` | `8`     |
    pub fn from_env() -> Self {
        Self {
            fallback_id_len: env_or("CHANTIER_FALLBACK_ID_LEN", DEFAULT_FALLBACK_ID_LEN),
        }
    }
}

/// Read and parse `key`, falling back to `default` when unset or invalid.
pub fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(raw) => parse_or(key, raw.trim(), default),
        Err(_) => default,
    }
}

fn parse_or<T>(key: &str, raw: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = raw, ?default, "Invalid configuration value, using default");
        default
    })
}
