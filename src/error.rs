//! Error types shared by the registry core.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by the stores, the versioning engine and admission control.
///
/// Every failure is a per-request condition; none of them is fatal to the
/// process and none is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No entity is stored under `(name, version)`.
    #[error("{kind} {name}/{version} not found")]
    NotFound {
        kind: &'static str,
        name: String,
        version: u64,
    },

    /// The group exists but holds no entry with the requested name.
    #[error("config {entry} not found in group {group}/{version}")]
    EntryNotFound {
        group: String,
        version: u64,
        entry: String,
    },

    /// An entity already occupies the target `(name, version)` slot.
    #[error("{kind} {name}/{version} already exists")]
    Conflict {
        kind: &'static str,
        name: String,
        version: u64,
    },

    /// The label query is not a `key:value;key:value` list.
    #[error("invalid label query {query:?}: {reason}")]
    InvalidLabelFormat { query: String, reason: String },

    /// A label-based removal did not match any entry.
    #[error("no config in group {group}/{version} matches labels {query:?}")]
    NoMatch {
        group: String,
        version: u64,
        query: String,
    },

    /// Admission denied by the rate limiter.
    #[error("rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },
}

impl RegistryError {
    /// True for both "entity absent" and "entry absent from group".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::NotFound { .. } | RegistryError::EntryNotFound { .. }
        )
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = RegistryError::NotFound {
            kind: "config group",
            name: "web".into(),
            version: 3,
        };
        assert_eq!(err.to_string(), "config group web/3 not found");
        assert!(err.is_not_found());

        let err = RegistryError::RateLimited {
            retry_after: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "rate limit exceeded, retry after 1s");
        assert!(!err.is_not_found());
    }
}
