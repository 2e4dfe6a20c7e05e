//! swr-race - A stale-while-revalidate (SWR) cache library for Rust
//!
//! This library provides a caching core with:
//! - Stale-while-revalidate semantics over a versioned payload envelope
//! - Background revalidation that outlives the caller
//! - Request coalescing within a process ([`Group`]) and across processes
//!   sharing Redis ([`RedisStore`])
//! - Tiered storage: a fast local store over a shared remote one ([`HybridStore`])
//!
//! # Example
//!
//! ```ignore
//! use swr_race::{Cache, CacheBuilder, Computed, HybridStore, MemoryStore, MemoryStoreConfig};
//! use swr_race::{RedisStore, RedisStoreConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), swr_race::CacheError> {
//!     let memory = Arc::new(MemoryStore::new(MemoryStoreConfig::default()));
//!     let redis = Arc::new(RedisStore::new(RedisStoreConfig::default()).await?);
//!     let store = Arc::new(HybridStore::new(memory, redis));
//!
//!     let users: Cache<String> = CacheBuilder::new(store).build("users")?;
//!
//!     // The computation receives the key without namespace
//!     let user = users
//!         .swr("user:123", |id, _ctx| async move {
//!             Ok(Computed::Cache(format!("User data for {}", id)))
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

mod builder;
mod cache;
mod context;
mod error;
mod group;
mod hybrid;
mod lock;
mod payload;
mod store;
pub mod stores;
mod swr;
mod utils;

// Re-export public API
pub use builder::CacheBuilder;
pub use cache::Cache;
pub use context::{Mode, RefreshContext};
pub use error::CacheError;
pub use group::Group;
pub use hybrid::HybridStore;
pub use lock::{DEFAULT_LOCK_PREFIX, DEFAULT_SUPPRESSION_TTL, LockRecord, RetryDelay};
pub use payload::{Metadata, PAYLOAD_VERSION, Payload, decode, encode};
pub use store::{Computed, Fetched, RaceFn, Store};
pub use stores::memory::{MemoryStore, MemoryStoreConfig};
pub use stores::metrics::{CacheEntryStatus, CacheMetric, MetricsSink, MetricsStore};
pub use stores::redis::{RedisStore, RedisStoreConfig};
pub use swr::{SwrCache, SwrOptions};
