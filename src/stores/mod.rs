//! Store implementations for the cache library.

pub mod memory;
pub mod metrics;
pub mod redis;

pub use memory::{MemoryStore, MemoryStoreConfig};
pub use metrics::{CacheEntryStatus, CacheMetric, MetricsSink, MetricsStore};
pub use redis::{RedisStore, RedisStoreConfig};
