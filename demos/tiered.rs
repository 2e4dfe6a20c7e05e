//! Example: two "processes" sharing one Redis behind their own memory tier.
//!
//! Each process gets a `HybridStore` (memory over Redis). A stampede of
//! concurrent lookups across both results in a single origin load, and the
//! second process is served from Redis, promoted into its memory tier.
//!
//! Falls back to two independent memory stores when Redis is not reachable.
//!
//! Run with: `RUST_LOG=swr_race=debug cargo run --example tiered`

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use swr_race::{
    Cache, CacheBuilder, CacheError, Computed, HybridStore, MemoryStore, MemoryStoreConfig,
    RedisStore, RedisStoreConfig, Store,
};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct User {
    id: String,
    name: String,
    email: String,
}

async fn process_store(redis_url: &str) -> Arc<dyn Store> {
    let memory = Arc::new(MemoryStore::new(MemoryStoreConfig {
        max_ttl: Some(Duration::from_secs(30)),
        ..MemoryStoreConfig::default()
    }));

    let config = RedisStoreConfig {
        url: redis_url.to_string(),
        prefix: "demo:".to_string(),
        ..Default::default()
    };
    match RedisStore::new(config).await {
        Ok(redis) => Arc::new(HybridStore::new(memory, Arc::new(redis))),
        Err(e) => {
            tracing::warn!("Redis unavailable, using memory only: {}", e);
            memory
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let processes: Vec<Cache<User>> = vec![
        CacheBuilder::new(process_store(&redis_url).await)
            .fresh_for(Duration::from_secs(10))
            .ttl(Duration::from_secs(60))
            .build("users")?,
        CacheBuilder::new(process_store(&redis_url).await)
            .fresh_for(Duration::from_secs(10))
            .ttl(Duration::from_secs(60))
            .build("users")?,
    ];
    processes[0].remove("chronark").await?;

    let loads = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let cache = processes[i % processes.len()].clone();
            let loads = loads.clone();
            tokio::spawn(async move {
                cache
                    .swr("chronark", move |id, _ctx| {
                        let loads = loads.clone();
                        async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            println!("Loading user from database: {}", id);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            Ok::<_, CacheError>(Computed::Cache(User {
                                id,
                                name: "Andreas".to_string(),
                                email: "andreas@example.com".to_string(),
                            }))
                        }
                    })
                    .await
            })
        })
        .collect();

    for handle in handles {
        handle.await??;
    }
    println!(
        "20 concurrent lookups, {} origin load(s)",
        loads.load(Ordering::SeqCst)
    );

    // Wait for the write-back
    tokio::time::sleep(Duration::from_millis(50)).await;

    for (i, cache) in processes.iter().enumerate() {
        println!("process {}: {:?}", i, cache.get("chronark").await?);
    }

    Ok(())
}
