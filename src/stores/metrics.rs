//! Metrics middleware for cache stores.
//!
//! This module provides a `MetricsStore` wrapper that emits metrics for all
//! store operations (reads, writes, removes, races) to a user-provided sink.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swr_race::{MemoryStore, MemoryStoreConfig, Store, SwrCache, SwrOptions};
//! use swr_race::{CacheMetric, MetricsSink, MetricsStore};
//!
//! // Create metrics sink
//! let sink = Arc::new(MyMetricsSink::new());
//!
//! // Wrap store with metrics
//! let memory = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
//! let store: Arc<dyn Store> = Arc::new(MetricsStore::new(memory, sink.clone()));
//!
//! // Use in the cache - metrics emitted automatically
//! let cache = SwrCache::new(store, SwrOptions::default());
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::CacheError;
use crate::payload::decode;
use crate::store::{Computed, Fetched, RaceFn, Store};

/// Status of a cache entry on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntryStatus {
    /// Payload is before its best-before time.
    Fresh,
    /// Payload is past its best-before time but still stored.
    Stale,
}

/// Metrics emitted by the MetricsStore wrapper.
#[derive(Debug, Clone)]
pub enum CacheMetric {
    /// Emitted on every cache read (`get` and `fetch`).
    Read {
        /// The cache key that was read.
        key: String,
        /// Whether the key was found in the cache.
        hit: bool,
        /// Freshness of the payload (only present when the bytes decode as one).
        status: Option<CacheEntryStatus>,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every cache write (set) operation.
    Write {
        /// The cache key that was written.
        key: String,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted on every cache remove operation.
    Remove {
        /// Number of keys in the remove batch.
        key_count: usize,
        /// First key in the batch (for debugging/identification).
        first_key: Option<String>,
        /// Latency of the operation in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
    /// Emitted when a race resolves, whether this caller computed or joined.
    Race {
        /// The raced key.
        key: String,
        /// Whether the race produced a value.
        ok: bool,
        /// Time spent computing or waiting, in milliseconds.
        latency_ms: f64,
        /// Name of the store tier (from Store::name()).
        tier: String,
    },
}

/// Trait for receiving cache metrics.
///
/// Implement this trait to collect metrics from `MetricsStore`.
///
/// # Example
///
/// ```ignore
/// use std::sync::Mutex;
/// use async_trait::async_trait;
/// use swr_race::{CacheMetric, MetricsSink};
///
/// struct BufferedSink {
///     buffer: Mutex<Vec<CacheMetric>>,
/// }
///
/// #[async_trait]
/// impl MetricsSink for BufferedSink {
///     fn emit(&self, metric: CacheMetric) {
///         self.buffer.lock().unwrap().push(metric);
///     }
///
///     async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///         // Send buffered metrics to your backend
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Emit a single metric.
    ///
    /// This is called synchronously in the hot path of cache operations.
    /// Implementations should be fast (e.g., buffer metrics in memory).
    fn emit(&self, metric: CacheMetric);

    /// Flush any buffered metrics.
    ///
    /// Typically called at shutdown or at periodic intervals.
    async fn flush(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A store wrapper that emits metrics for all operations.
///
/// Every call is delegated to the wrapped store unchanged; only timing and
/// outcome are recorded.
pub struct MetricsStore {
    inner: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
    tier_name: String,
}

impl MetricsStore {
    /// Create a new MetricsStore wrapping the given store.
    ///
    /// # Arguments
    /// * `inner` - The store to wrap
    /// * `sink` - The metrics sink to emit metrics to
    pub fn new(inner: Arc<dyn Store>, sink: Arc<dyn MetricsSink>) -> Self {
        let tier_name = inner.name().to_string();
        MetricsStore {
            inner,
            sink,
            tier_name,
        }
    }

    /// Get a reference to the metrics sink.
    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    fn elapsed_ms(start: Instant) -> f64 {
        start.elapsed().as_secs_f64() * 1000.0
    }

    fn emit_read(&self, key: &str, value: Option<&[u8]>, start: Instant) {
        let status = value.and_then(decode).map(|payload| {
            if payload.needs_refresh() {
                CacheEntryStatus::Stale
            } else {
                CacheEntryStatus::Fresh
            }
        });

        self.sink.emit(CacheMetric::Read {
            key: key.to_string(),
            hit: value.is_some(),
            status,
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier_name.clone(),
        });
    }
}

#[async_trait]
impl Store for MetricsStore {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let start = Instant::now();
        let result = self.inner.get(key).await;
        let value = result.as_ref().ok().and_then(|v| v.as_deref());
        self.emit_read(key, value, start);
        result
    }

    async fn fetch(&self, key: &str) -> Result<Option<Fetched>, CacheError> {
        let start = Instant::now();
        let result = self.inner.fetch(key).await;
        let value = result
            .as_ref()
            .ok()
            .and_then(|f| f.as_ref())
            .map(|f| f.value.as_ref());
        self.emit_read(key, value, start);
        result
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.set(key, value, ttl).await;

        self.sink.emit(CacheMetric::Write {
            key: key.to_string(),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn del(&self, keys: &[&str]) -> Result<(), CacheError> {
        let start = Instant::now();
        let result = self.inner.del(keys).await;

        self.sink.emit(CacheMetric::Remove {
            key_count: keys.len(),
            first_key: keys.first().map(|k| k.to_string()),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier_name.clone(),
        });

        result
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.inner.clear().await
    }

    async fn close(&self) -> Result<(), CacheError> {
        self.inner.close().await
    }

    async fn race(
        &self,
        key: &str,
        compute: RaceFn,
        wait_for: Duration,
    ) -> Result<Computed, CacheError> {
        let start = Instant::now();
        let result = self.inner.race(key, compute, wait_for).await;

        self.sink.emit(CacheMetric::Race {
            key: key.to_string(),
            ok: result.is_ok(),
            latency_ms: Self::elapsed_ms(start),
            tier: self.tier_name.clone(),
        });

        result
    }

    fn suppression_ttl(&self) -> Option<Duration> {
        self.inner.suppression_ttl()
    }
}
