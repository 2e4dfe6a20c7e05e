use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::store::{Computed, Fetched, RaceFn, Store};

/// HybridStore layers a fast downstream store over a shared upstream store.
///
/// Reads try downstream first and fall back to upstream, copying the value
/// down with the TTL upstream still has left. Writes go downstream first and
/// stop there if it fails.
///
/// # Example
/// ```ignore
/// let store = HybridStore::new(
///     Arc::new(MemoryStore::new(MemoryStoreConfig::default())),
///     Arc::new(RedisStore::new(RedisStoreConfig::default()).await?),
/// );
/// ```
pub struct HybridStore {
    downstream: Arc<dyn Store>,
    upstream: Arc<dyn Store>,
}

impl HybridStore {
    pub fn new(downstream: Arc<dyn Store>, upstream: Arc<dyn Store>) -> Self {
        HybridStore {
            downstream,
            upstream,
        }
    }

    pub fn downstream(&self) -> &Arc<dyn Store> {
        &self.downstream
    }

    pub fn upstream(&self) -> &Arc<dyn Store> {
        &self.upstream
    }
}

#[async_trait]
impl Store for HybridStore {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        match self.downstream.get(key).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(
                    "Downstream read failed, falling back: tier={}, key={}, error={}",
                    self.downstream.name(),
                    key,
                    e
                );
            }
        }

        Ok(self.fetch(key).await?.map(|fetched| fetched.value))
    }

    /// Read from upstream and promote the value to downstream.
    async fn fetch(&self, key: &str) -> Result<Option<Fetched>, CacheError> {
        let Some(fetched) = self.upstream.fetch(key).await? else {
            return Ok(None);
        };

        // Only values that will expire upstream get copied down.
        if let Some(ttl) = fetched.ttl.filter(|ttl| !ttl.is_zero()) {
            match self.downstream.set(key, fetched.value.clone(), ttl).await {
                Ok(()) => {
                    tracing::debug!(
                        "Promoted value to downstream tier: tier={}, key={}",
                        self.downstream.name(),
                        key
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to promote value to downstream tier: tier={}, key={}, error={}",
                        self.downstream.name(),
                        key,
                        e
                    );
                }
            }
        }

        Ok(Some(fetched))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.downstream.set(key, value.clone(), ttl).await?;
        self.upstream.set(key, value, ttl).await
    }

    async fn del(&self, keys: &[&str]) -> Result<(), CacheError> {
        self.downstream.del(keys).await?;
        self.upstream.del(keys).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.downstream.clear().await?;
        self.upstream.clear().await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.downstream.close().await?;
        self.upstream.close().await
    }

    /// Coalesce locally first, then across processes with whatever is left
    /// of `wait_for`.
    async fn race(
        &self,
        key: &str,
        compute: RaceFn,
        wait_for: Duration,
    ) -> Result<Computed, CacheError> {
        let start = Instant::now();
        let upstream = self.upstream.clone();
        let owned_key = key.to_string();

        let upstream_race: RaceFn = Box::new(move || {
            async move {
                let remaining = wait_for.saturating_sub(start.elapsed());
                if remaining.is_zero() {
                    return Err(CacheError::DeadlineExceeded);
                }
                upstream.race(&owned_key, compute, remaining).await
            }
            .boxed()
        });

        self.downstream.race(key, upstream_race, wait_for).await
    }

    fn suppression_ttl(&self) -> Option<Duration> {
        match (
            self.downstream.suppression_ttl(),
            self.upstream.suppression_ttl(),
        ) {
            (Some(down), Some(up)) => Some(down.max(up)),
            (down, up) => down.or(up),
        }
    }
}
