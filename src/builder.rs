//! Builder API for creating validated cache instances.
//!
//! One builder holds a store and timing configuration, and hands out typed
//! caches for as many namespaces as needed, all sharing that store.

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::store::Store;
use crate::swr::{SwrCache, SwrOptions};

/// Builder for creating caches over a single store.
///
/// Every `build*` call validates the timing options against the store, so a
/// misconfigured cache fails at startup rather than at the first refresh.
///
/// # Example
///
/// ```ignore
/// use swr_race::{CacheBuilder, MemoryStore, MemoryStoreConfig};
/// use std::{sync::Arc, time::Duration};
///
/// let memory = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
///
/// let builder = CacheBuilder::new(memory)
///     .fresh_for(Duration::from_secs(60))
///     .ttl(Duration::from_secs(300));
///
/// let accounts: Cache<Account> = builder.build("account")?;
/// let users: Cache<User> = builder.build("user")?;
/// ```
#[derive(Clone)]
pub struct CacheBuilder {
    store: Arc<dyn Store>,
    options: SwrOptions,
}

impl CacheBuilder {
    /// Create a new CacheBuilder with default timing.
    pub fn new(store: Arc<dyn Store>) -> Self {
        CacheBuilder {
            store,
            options: SwrOptions::default(),
        }
    }

    /// Replace all timing options at once.
    pub fn options(mut self, options: SwrOptions) -> Self {
        self.options = options;
        self
    }

    /// Maximum time to wait for a computation.
    pub fn wait_for(mut self, wait_for: Duration) -> Self {
        self.options.wait_for = wait_for;
        self
    }

    /// Time until a value becomes stale.
    pub fn fresh_for(mut self, fresh_for: Duration) -> Self {
        self.options.fresh_for = fresh_for;
        self
    }

    /// Time until a value is dropped from the store. Zero keeps it forever.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.options.ttl = ttl;
        self
    }

    /// Build the untyped orchestrator.
    pub fn build_swr(&self) -> Result<SwrCache, CacheError> {
        self.options.validate_for(self.store.as_ref())?;
        Ok(SwrCache::new(self.store.clone(), self.options))
    }

    /// Build a typed cache for `namespace`.
    pub fn build<V>(&self, namespace: &str) -> Result<Cache<V>, CacheError>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if namespace.is_empty() {
            return Err(CacheError::Config("namespace must not be empty".to_string()));
        }
        Ok(Cache::new(namespace, self.build_swr()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Computed;
    use crate::stores::memory::{MemoryStore, MemoryStoreConfig};
    use crate::stores::redis::{RedisStore, RedisStoreConfig};

    fn memory() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new(MemoryStoreConfig::default()))
    }

    #[tokio::test]
    async fn test_cache_builder() {
        let builder = CacheBuilder::new(memory());

        let account: Cache<String> = builder.build("account").unwrap();
        let user: Cache<String> = builder.build("user").unwrap();

        user.set("chronark", &"test_value".to_string())
            .await
            .unwrap();
        let result = user.get("chronark").await.unwrap();
        assert_eq!(result, Some("test_value".to_string()));

        account
            .set("acc1", &"account_data".to_string())
            .await
            .unwrap();
        let result = account.get("acc1").await.unwrap();
        assert_eq!(result, Some("account_data".to_string()));

        // Verify isolation
        let result = user.get("acc1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_builder_swr() {
        let cache: Cache<String> = CacheBuilder::new(memory()).build("user").unwrap();

        let result = cache
            .swr("chronark", |key, _ctx| async move {
                assert_eq!(key, "chronark");
                Ok(Computed::Cache("loaded_data".to_string()))
            })
            .await
            .unwrap();

        assert_eq!(result, "loaded_data");
    }

    #[test]
    fn test_rejects_invalid_timing() {
        let builder = CacheBuilder::new(memory())
            .fresh_for(Duration::from_secs(60))
            .ttl(Duration::from_secs(10));
        assert!(matches!(
            builder.build::<String>("user"),
            Err(CacheError::Config(_))
        ));

        let builder = CacheBuilder::new(memory()).wait_for(Duration::ZERO);
        assert!(matches!(builder.build_swr(), Err(CacheError::Config(_))));

        assert!(matches!(
            CacheBuilder::new(memory()).build::<String>(""),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_fresh_for_within_suppression_window() {
        let redis: Arc<dyn Store> = Arc::new(
            RedisStore::lazy(RedisStoreConfig {
                url: "redis://127.0.0.1:1/".to_string(),
                ..Default::default()
            })
            .unwrap(),
        );

        // Default suppression window is 2s.
        let builder = CacheBuilder::new(redis.clone()).fresh_for(Duration::from_secs(1));
        assert!(matches!(builder.build_swr(), Err(CacheError::Config(_))));

        let builder = CacheBuilder::new(redis).fresh_for(Duration::from_secs(5));
        assert!(builder.build_swr().is_ok());
    }
}
