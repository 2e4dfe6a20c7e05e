use futures::FutureExt as _;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{Mode, RefreshContext};
use crate::error::CacheError;
use crate::group::panic_message;
use crate::payload::{Payload, decode, encode};
use crate::store::{Computed, RaceFn, Store};

/// Timing options for stale-while-revalidate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwrOptions {
    /// Maximum time to wait for a computation, including lock retries.
    pub wait_for: Duration,
    /// Time until a stored payload becomes stale.
    pub fresh_for: Duration,
    /// Time until the store may drop the entry. Zero means "never expire".
    pub ttl: Duration,
}

impl Default for SwrOptions {
    fn default() -> Self {
        SwrOptions {
            wait_for: Duration::from_secs(10),
            fresh_for: Duration::from_secs(60),
            ttl: Duration::from_secs(300),
        }
    }
}

impl SwrOptions {
    /// Reject option sets under which the cache cannot behave sanely.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.wait_for.is_zero() {
            return Err(CacheError::Config("wait_for must be positive".into()));
        }
        if !self.ttl.is_zero() && self.ttl < self.fresh_for {
            return Err(CacheError::Config(format!(
                "ttl ({:?}) must not be shorter than fresh_for ({:?})",
                self.ttl, self.fresh_for
            )));
        }
        Ok(())
    }

    /// [`SwrOptions::validate`] plus the checks that depend on `store`.
    ///
    /// A store that keeps race results must drop them before a value can go
    /// stale, otherwise a refresh could be answered with the result of the
    /// previous one.
    pub fn validate_for(&self, store: &dyn Store) -> Result<(), CacheError> {
        self.validate()?;
        if let Some(suppression_ttl) = store.suppression_ttl()
            && suppression_ttl >= self.fresh_for
        {
            return Err(CacheError::Config(format!(
                "suppression_ttl ({:?}) of the {} store must be shorter than fresh_for ({:?})",
                suppression_ttl,
                store.name(),
                self.fresh_for
            )));
        }
        Ok(())
    }
}

/// Stale-while-revalidate orchestrator over a byte-level [`Store`].
///
/// - a fresh payload is returned as is
/// - a stale payload is returned and refreshed in the background
/// - a miss computes the value through the store's race, so concurrent
///   callers (in this process and, for shared stores, in others) share a
///   single computation
#[derive(Clone)]
pub struct SwrCache {
    store: Arc<dyn Store>,
    options: SwrOptions,
}

impl SwrCache {
    /// Create a new SWR cache.
    ///
    /// # Arguments
    /// * `store` - The underlying store implementation
    /// * `options` - Default timing for every lookup
    pub fn new(store: Arc<dyn Store>, options: SwrOptions) -> Self {
        SwrCache { store, options }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn options(&self) -> &SwrOptions {
        &self.options
    }

    /// Return the cached payload without refreshing it.
    ///
    /// The response will be `None` for cache misses and for entries that do
    /// not decode.
    pub async fn get(&self, key: &str) -> Result<Option<Payload>, CacheError> {
        Ok(self.store.get(key).await?.and_then(|bytes| decode(&bytes)))
    }

    /// Stamp `payload` as fresh and write it with the default TTL.
    pub async fn set(&self, key: &str, mut payload: Payload) -> Result<(), CacheError> {
        payload.fresh_for(self.options.fresh_for);
        let bytes = encode(&payload)?;
        self.store.set(key, bytes, self.options.ttl).await
    }

    /// Removes the keys from the cache.
    pub async fn remove(&self, keys: &[&str]) -> Result<(), CacheError> {
        self.store.del(keys).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }

    pub async fn close(&self) -> Result<(), CacheError> {
        self.store.close().await
    }

    /// Stale-while-revalidate: get the cached payload or compute it.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `compute` - Produces the payload on a miss or a background refresh
    pub async fn swr<F, Fut>(&self, key: &str, compute: F) -> Result<Payload, CacheError>
    where
        F: FnOnce(RefreshContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<Payload>, CacheError>> + Send + 'static,
    {
        self.swr_with(key, self.options, compute).await
    }

    /// [`SwrCache::swr`] with per-call timing.
    pub async fn swr_with<F, Fut>(
        &self,
        key: &str,
        options: SwrOptions,
        compute: F,
    ) -> Result<Payload, CacheError>
    where
        F: FnOnce(RefreshContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<Payload>, CacheError>> + Send + 'static,
    {
        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                if let Some(payload) = decode(&bytes) {
                    if payload.needs_refresh() {
                        self.spawn_refresh(key, options, compute);
                    }
                    return Ok(payload);
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(
                    "Cache read failed, treating as miss: tier={}, key={}, error={}",
                    self.store.name(),
                    key,
                    e
                );
            }
        }

        self.do_call(key, options, compute, Mode::Attached).await
    }

    /// Recompute `key` through the store's race, ignoring whatever is cached.
    pub async fn refresh<F, Fut>(&self, key: &str, compute: F) -> Result<Payload, CacheError>
    where
        F: FnOnce(RefreshContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<Payload>, CacheError>> + Send + 'static,
    {
        self.do_call(key, self.options, compute, Mode::Attached).await
    }

    /// Spawn a background refresh that outlives the caller.
    fn spawn_refresh<F, Fut>(&self, key: &str, options: SwrOptions, compute: F)
    where
        F: FnOnce(RefreshContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<Payload>, CacheError>> + Send + 'static,
    {
        let this = self.clone();
        let key = key.to_string();

        tokio::spawn(async move {
            let refresh = async {
                // Another process may have refreshed the shared tier already.
                if let Ok(Some(fetched)) = this.store.fetch(&key).await
                    && let Some(payload) = decode(&fetched.value)
                    && !payload.needs_refresh()
                {
                    tracing::debug!("Skipping refresh of already fresh key: key={}", key);
                    return;
                }

                match this.do_call(&key, options, compute, Mode::Detached).await {
                    Ok(_) => tracing::debug!("Refreshed stale key: key={}", key),
                    Err(e) => {
                        tracing::debug!("Background refresh failed: key={}, error={}", key, e)
                    }
                }
            };

            if let Err(panic) = AssertUnwindSafe(refresh).catch_unwind().await {
                tracing::error!(
                    "Background refresh panicked: key={}, panic={}",
                    key,
                    panic_message(&*panic)
                );
            }
        });
    }

    /// Compute `key` once across all concurrent callers and write the result back.
    async fn do_call<F, Fut>(
        &self,
        key: &str,
        options: SwrOptions,
        compute: F,
        mode: Mode,
    ) -> Result<Payload, CacheError>
    where
        F: FnOnce(RefreshContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Computed<Payload>, CacheError>> + Send + 'static,
    {
        let store = self.store.clone();
        let owned_key = key.to_string();

        let race_fn: RaceFn = Box::new(move || {
            async move {
                let ctx = RefreshContext::new(mode, options.wait_for);
                let computed =
                    call_with_timeout(async move { compute(ctx).await }, options.wait_for).await?;
                let computed = computed.try_map(|mut payload| {
                    payload.fresh_for(options.fresh_for);
                    encode(&payload)
                })?;
                if ctx.is_expired() {
                    return Err(CacheError::DeadlineExceeded);
                }
                if computed.is_cacheable() {
                    let bytes = computed.value().clone();
                    write_back(store, owned_key, bytes, options.ttl, ctx).await;
                }
                Ok(computed)
            }
            .boxed()
        });

        let computed = self.store.race(key, race_fn, options.wait_for).await?;
        decode(computed.value()).ok_or(CacheError::NotFound)
    }
}

/// Store a computed value. A detached refresh has nobody waiting and writes
/// inline; an attached one hands the write off so the caller gets the value
/// right away. Failures only get logged.
async fn write_back(
    store: Arc<dyn Store>,
    key: String,
    bytes: bytes::Bytes,
    ttl: Duration,
    ctx: RefreshContext,
) {
    let write = async move {
        if let Err(e) = store.set(&key, bytes, ttl).await {
            tracing::warn!(
                "Failed to write computed value: tier={}, key={}, error={}",
                store.name(),
                key,
                e
            );
        }
    };

    if ctx.is_detached() {
        write.await;
    } else {
        tokio::spawn(write);
    }
}

/// Await `fut` for at most `timeout`, turning a panic into an error.
async fn call_with_timeout<T, Fut>(fut: Fut, timeout: Duration) -> Result<T, CacheError>
where
    Fut: Future<Output = Result<T, CacheError>>,
{
    match tokio::time::timeout(timeout, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(CacheError::Computation(format!(
            "panic: {}",
            panic_message(&*panic)
        ))),
        Err(_) => Err(CacheError::DeadlineExceeded),
    }
}
