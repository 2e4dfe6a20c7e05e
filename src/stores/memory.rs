use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::group::Group;
use crate::store::{Computed, Fetched, RaceFn, Store};

/// Configuration for MemoryStore.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Maximum total size in bytes (keys plus values) the cache can hold.
    pub max_capacity: u64,

    /// Upper bound for every entry's TTL. Entries written with a longer TTL,
    /// or with no expiry at all, are clamped to this value.
    /// `None` leaves TTLs untouched.
    pub max_ttl: Option<Duration>,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        MemoryStoreConfig {
            max_capacity: 64 << 20,
            max_ttl: None,
        }
    }
}

/// An item saved in the moka cache.
#[derive(Clone, Debug)]
struct MemoryItem {
    value: Bytes,
    /// When to evict this item, `None` for never.
    deadline: Option<Instant>,
}

impl MemoryItem {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// Expires every [`MemoryItem`] at its own deadline.
struct ItemExpiration;

impl Expiry<String, MemoryItem> for ItemExpiration {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &MemoryItem,
        current_time: Instant,
    ) -> Option<Duration> {
        value.remaining(current_time)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &MemoryItem,
        current_time: Instant,
        _current_duration: Option<Duration>,
    ) -> Option<Duration> {
        value.remaining(current_time)
    }
}

/// In-process store backed by Moka.
///
/// MemoryStore provides:
/// - Lock-free concurrent access for reads and writes
/// - Size-bounded eviction, weighted by entry byte size
/// - Per-entry TTLs, so `fetch` can report the remaining lifetime
/// - Process-local request coalescing for `race`
pub struct MemoryStore {
    cache: Cache<String, MemoryItem>,
    max_ttl: Option<Duration>,
    group: Group,
}

impl MemoryStore {
    /// Create a new MemoryStore with the given configuration.
    ///
    /// # Example
    /// ```ignore
    /// let store = MemoryStore::new(MemoryStoreConfig {
    ///     max_capacity: 10 << 20,
    ///     max_ttl: Some(Duration::from_secs(60)),
    /// });
    /// ```
    pub fn new(config: MemoryStoreConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .weigher(|key: &String, item: &MemoryItem| {
                u32::try_from(key.len() + item.value.len()).unwrap_or(u32::MAX)
            })
            .expire_after(ItemExpiration)
            .build();

        MemoryStore {
            cache,
            max_ttl: config.max_ttl,
            group: Group::new(),
        }
    }

    /// Get cache statistics (for monitoring/debugging).
    pub fn stats(&self) -> (u64, u64) {
        let entry_count = self.cache.entry_count();
        let weighted_size = self.cache.weighted_size();
        (entry_count, weighted_size)
    }

    /// Clamp `ttl` to the configured maximum. Zero means "no expiry".
    fn effective_ttl(&self, ttl: Duration) -> Option<Duration> {
        match (ttl.is_zero(), self.max_ttl) {
            (true, max_ttl) => max_ttl,
            (false, Some(max_ttl)) => Some(ttl.min(max_ttl)),
            (false, None) => Some(ttl),
        }
    }

    async fn item(&self, key: &str) -> Option<MemoryItem> {
        let item = self.cache.get(key).await?;
        if item.is_expired(Instant::now()) {
            self.cache.invalidate(key).await;
            return None;
        }
        Some(item)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.item(key).await.map(|item| item.value))
    }

    async fn fetch(&self, key: &str) -> Result<Option<Fetched>, CacheError> {
        Ok(self.item(key).await.map(|item| Fetched {
            ttl: item.remaining(Instant::now()),
            value: item.value,
        }))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let deadline = self
            .effective_ttl(ttl)
            .map(|ttl| Instant::now() + ttl);

        // Moka handles eviction automatically based on capacity
        self.cache
            .insert(key.to_string(), MemoryItem { value, deadline })
            .await;

        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> Result<(), CacheError> {
        for key in keys {
            self.cache.invalidate(*key).await;
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        Ok(())
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn race(
        &self,
        key: &str,
        compute: RaceFn,
        _wait_for: Duration,
    ) -> Result<Computed, CacheError> {
        self.group.race(key, compute).await
    }
}
