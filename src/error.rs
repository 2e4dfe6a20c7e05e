use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Error type for cache operations.
///
/// Errors are `Clone` because every caller that joined a coalesced computation
/// receives its own copy of the single result. They serialize with their
/// variant as an explicit tag, so a sentinel read back from a remote lock
/// record compares equal to the one that was written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum CacheError {
    /// No usable value exists for the key.
    #[error("not found")]
    NotFound,
    /// A bounded wait expired, either on the computation or on a distributed lock.
    #[error("deadline exceeded")]
    DeadlineExceeded,
    /// The operation was abandoned because its owner went away.
    #[error("cancelled")]
    Cancelled,
    /// A cache operation failed.
    #[error("[{tier}] cache error for key '{key}': {message}")]
    Operation {
        tier: String,
        key: String,
        message: String,
    },
    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The supplied computation failed.
    #[error("computation failed: {0}")]
    Computation(String),
    /// The cache was configured with values that cannot work together.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CacheError {
    /// Create a new operation error.
    pub fn operation(
        tier: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        CacheError::Operation {
            tier: tier.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap a domain error raised by a computation.
    pub fn computation(err: impl Display) -> Self {
        CacheError::Computation(err.to_string())
    }

    /// Returns `true` for the "nothing cached" sentinel.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CacheError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        CacheError::Serialization(format!("Serialization failed: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for CacheError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        CacheError::Serialization(format!("Deserialization failed: {}", err))
    }
}
