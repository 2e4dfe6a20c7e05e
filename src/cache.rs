use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::RefreshContext;
use crate::error::CacheError;
use crate::payload::Payload;
use crate::store::Computed;
use crate::swr::SwrCache;
use crate::utils::build_cache_key;

/// Typed cache over a [`SwrCache`].
///
/// Values are stored as JSON inside the payload envelope. Each cache is
/// isolated by a namespace string, so one store can back many `Cache<V>`
/// instances with different value types.
pub struct Cache<V> {
    namespace: String,
    swr_cache: SwrCache,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Cache {
            namespace: self.namespace.clone(),
            swr_cache: self.swr_cache.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V> Cache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a typed cache on top of `swr_cache`.
    ///
    /// Use [`crate::CacheBuilder`] to get the options validated against the store.
    pub fn new(namespace: &str, swr_cache: SwrCache) -> Self {
        Cache {
            namespace: namespace.to_string(),
            swr_cache,
            _marker: PhantomData,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The untyped cache underneath.
    pub fn swr_cache(&self) -> &SwrCache {
        &self.swr_cache
    }

    fn cache_key(&self, key: &str) -> String {
        build_cache_key(&self.namespace, key)
    }

    /// Return the cached value.
    ///
    /// Returns `None` for cache misses and for values that no longer
    /// deserialize as `V`.
    pub async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let Some(payload) = self.swr_cache.get(&self.cache_key(key)).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&payload.value) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::debug!(
                    "Ignoring undecodable value: namespace={}, key={}, error={}",
                    self.namespace,
                    key,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Set the value in the cache.
    pub async fn set(&self, key: &str, value: &V) -> Result<(), CacheError> {
        let payload = Payload::new(serde_json::to_vec(value)?);
        self.swr_cache.set(&self.cache_key(key), payload).await
    }

    /// Remove the key from the cache.
    pub async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.swr_cache.remove(&[self.cache_key(key).as_str()]).await
    }

    /// Stale-while-revalidate: get the cached value or compute it.
    ///
    /// - If the value is fresh, return it immediately
    /// - If the value is stale, return it and recompute in the background
    /// - If the value is missing, compute it; concurrent callers share the result
    ///
    /// A cached value that no longer deserializes (e.g. after `V` changed
    /// shape) is recomputed once in the foreground.
    ///
    /// # Arguments
    /// * `key` - The cache key (without namespace)
    /// * `compute` - Called with the key; return [`Computed::NoCache`] to skip storing
    ///
    /// # Example
    /// ```ignore
    /// let user = cache.swr("user:123", |key, _ctx| async move {
    ///     db.get_user(&key).await.map(Computed::Cache).ok_or(CacheError::NotFound)
    /// }).await?;
    /// ```
    pub async fn swr<F, Fut>(&self, key: &str, compute: F) -> Result<V, CacheError>
    where
        F: Fn(String, RefreshContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Computed<V>, CacheError>> + Send + 'static,
    {
        let cache_key = self.cache_key(key);
        let compute = Arc::new(compute);

        let payload = self
            .swr_cache
            .swr(&cache_key, payload_fn::<V, _, _>(key, compute.clone()))
            .await?;

        match serde_json::from_slice(&payload.value) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::warn!(
                    "Cached value does not decode, recomputing: namespace={}, key={}, error={}",
                    self.namespace,
                    key,
                    e
                );
                let payload = self
                    .swr_cache
                    .refresh(&cache_key, payload_fn::<V, _, _>(key, compute))
                    .await?;
                Ok(serde_json::from_slice(&payload.value)?)
            }
        }
    }
}

/// Adapt a typed computation to the payload-level one the orchestrator runs.
fn payload_fn<V, F, Fut>(
    key: &str,
    compute: Arc<F>,
) -> impl FnOnce(RefreshContext) -> BoxFuture<'static, Result<Computed<Payload>, CacheError>>
+ Send
+ 'static
where
    V: Serialize + Send + 'static,
    F: Fn(String, RefreshContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Computed<V>, CacheError>> + Send + 'static,
{
    let key = key.to_string();
    move |ctx| {
        async move {
            let computed = compute(key, ctx).await?;
            computed.try_map(|value| -> Result<Payload, CacheError> {
                Ok(Payload::new(serde_json::to_vec(&value)?))
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::encode;
    use crate::store::Store;
    use crate::stores::memory::{MemoryStore, MemoryStoreConfig};
    use crate::swr::SwrOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn swr_cache() -> SwrCache {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
        SwrCache::new(store, SwrOptions::default())
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let swr_cache = swr_cache();
        let users_cache: Cache<String> = Cache::new("users", swr_cache.clone());
        let sessions_cache: Cache<String> = Cache::new("sessions", swr_cache);

        // Set and get
        users_cache
            .set("user:1", &"Alice".to_string())
            .await
            .unwrap();

        let result = users_cache.get("user:1").await.unwrap();
        assert_eq!(result, Some("Alice".to_string()));

        // Different namespace should not find it
        let result = sessions_cache.get("user:1").await.unwrap();
        assert!(result.is_none());

        // Remove
        users_cache.remove("user:1").await.unwrap();
        let result = users_cache.get("user:1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_cache_swr() {
        let cache: Cache<String> = Cache::new("users", swr_cache());

        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();

        // First call - cache miss
        let result = cache
            .swr("user:1", move |key, _ctx| {
                let count = call_count_clone.clone();
                async move {
                    // Verify we receive the key without namespace
                    assert_eq!(key, "user:1");
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(Computed::Cache("Bob".to_string()))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "Bob");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);

        // Wait for the write-back
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Second call - cache hit
        let call_count_clone = call_count.clone();
        let result = cache
            .swr("user:1", move |_key, _ctx| {
                let count = call_count_clone.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(Computed::Cache("Should not be called".to_string()))
                }
            })
            .await
            .unwrap();

        assert_eq!(result, "Bob");
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_swr_no_cache_is_not_stored() {
        let cache: Cache<u32> = Cache::new("counters", swr_cache());

        let result = cache
            .swr("c", |_key, _ctx| async { Ok(Computed::NoCache(7)) })
            .await
            .unwrap();
        assert_eq!(result, 7);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_swr_not_found() {
        let cache: Cache<String> = Cache::new("users", swr_cache());

        let result = cache
            .swr("missing", |_key, _ctx| async { Err(CacheError::NotFound) })
            .await;
        assert_eq!(result, Err(CacheError::NotFound));
    }

    #[tokio::test]
    async fn test_cache_swr_recovers_from_undecodable_value() {
        let swr_cache = swr_cache();
        let cache: Cache<u64> = Cache::new("numbers", swr_cache.clone());

        // A fresh payload whose value is not a u64.
        let mut payload = Payload::new(&b"\"not a number\""[..]);
        payload.fresh_for(Duration::from_secs(60));
        swr_cache
            .store()
            .set("numbers::n", encode(&payload).unwrap(), Duration::from_secs(300))
            .await
            .unwrap();
        assert!(cache.get("n").await.unwrap().is_none());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = cache
            .swr("n", move |_key, _ctx| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(Computed::Cache(42)) }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get("n").await.unwrap(), Some(42));
    }
}
