use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CacheError;

/// What a computation produced.
///
/// `NoCache` is not an error: the value is returned to every waiting caller
/// but is never written to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Computed<T = Bytes> {
    /// Return the value and persist it.
    Cache(T),
    /// Return the value without persisting it.
    NoCache(T),
}

impl<T> Computed<T> {
    /// Whether the value may be written to a store.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Computed::Cache(_))
    }

    pub fn value(&self) -> &T {
        match self {
            Computed::Cache(v) | Computed::NoCache(v) => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Computed::Cache(v) | Computed::NoCache(v) => v,
        }
    }

    /// Transform the value, keeping the cacheability flag.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Computed<U> {
        match self {
            Computed::Cache(v) => Computed::Cache(f(v)),
            Computed::NoCache(v) => Computed::NoCache(f(v)),
        }
    }

    /// Fallible [`Computed::map`].
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Computed<U>, E> {
        Ok(match self {
            Computed::Cache(v) => Computed::Cache(f(v)?),
            Computed::NoCache(v) => Computed::NoCache(f(v)?),
        })
    }
}

/// A value together with its remaining physical TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub value: Bytes,
    /// `None` when the entry never expires or the backend cannot tell.
    pub ttl: Option<Duration>,
}

/// The computation handed to [`Store::race`].
pub type RaceFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<Computed, CacheError>> + Send>;

/// A store is a common interface for storing, reading and deleting key-value pairs.
///
/// Stores only see opaque bytes; payload semantics live in the orchestrator.
/// The store implementation is responsible for expiring data on its own.
#[async_trait]
pub trait Store: Send + Sync {
    /// A name for metrics/tracing.
    ///
    /// # Example
    /// - "memory"
    /// - "redis"
    /// - "hybrid"
    fn name(&self) -> &'static str;

    /// Return the cached bytes from the fastest available tier.
    ///
    /// The response must be `None` for cache misses.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Like [`Store::get`] but also reports the remaining TTL.
    async fn fetch(&self, key: &str) -> Result<Option<Fetched>, CacheError>;

    /// Sets the value for the given key. A zero `ttl` means "never expire".
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Removes the key(s) from the store.
    async fn del(&self, keys: &[&str]) -> Result<(), CacheError>;

    /// Removes every entry owned by this store.
    async fn clear(&self) -> Result<(), CacheError>;

    /// Releases the store's resources.
    async fn close(&self) -> Result<(), CacheError>;

    /// Run `compute` so that concurrent callers for `key` share one execution.
    ///
    /// Every caller that joins while the computation is in flight observes the
    /// same result. `wait_for` bounds how long a caller waits on someone else.
    async fn race(
        &self,
        key: &str,
        compute: RaceFn,
        wait_for: Duration,
    ) -> Result<Computed, CacheError>;

    /// How long a finished race result stays readable by late racers, if the
    /// store keeps one.
    fn suppression_ttl(&self) -> Option<Duration> {
        None
    }
}
