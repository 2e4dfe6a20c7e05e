//! Process-local request coalescing.
//!
//! Concurrent callers for the same key await one shared computation. The
//! computation runs on its own task and retires its entry when it finishes,
//! so coalescing only spans callers that overlap in time and a caller that
//! goes away does not strand the key.

use futures::FutureExt as _;
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::CacheError;
use crate::store::{Computed, RaceFn};

type SharedCall = Shared<BoxFuture<'static, Result<Computed, CacheError>>>;
type Calls = Arc<Mutex<HashMap<String, Call>>>;

/// One generation of concurrent callers for a key.
struct Call {
    generation: u64,
    fut: SharedCall,
}

/// Deduplicates concurrent computations per key within one process.
#[derive(Default)]
pub struct Group {
    calls: Calls,
    next_gen: AtomicU64,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` unless a computation for `key` is already in flight, in
    /// which case wait for that one and return its result.
    ///
    /// The computation is spawned onto the runtime and keeps running when
    /// every caller is dropped. A panicking computation resolves to
    /// [`CacheError::Computation`] for every waiter.
    pub async fn race(&self, key: &str, compute: RaceFn) -> Result<Computed, CacheError> {
        let (generation, fut) = {
            let mut calls = lock(&self.calls);
            match calls.get(key) {
                Some(call) => (call.generation, call.fut.clone()),
                None => {
                    let generation = self.next_gen.fetch_add(1, Ordering::Relaxed);
                    // The task retires its entry under this lock, so it cannot
                    // finish before the entry is inserted below.
                    let fut = Self::spawn(self.calls.clone(), key.to_string(), generation, compute);
                    calls.insert(
                        key.to_string(),
                        Call {
                            generation,
                            fut: fut.clone(),
                        },
                    );
                    (generation, fut)
                }
            }
        };

        let result = fut.await;
        forget(&self.calls, key, generation);
        result
    }

    /// Number of keys with a computation in flight.
    pub fn in_flight(&self) -> usize {
        lock(&self.calls).len()
    }

    fn spawn(calls: Calls, key: String, generation: u64, compute: RaceFn) -> SharedCall {
        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(async move { compute().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(CacheError::Computation(format!(
                        "panic: {}",
                        panic_message(&*panic)
                    )))
                });
            forget(&calls, &key, generation);
            result
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                tracing::debug!("Coalesced computation did not finish: error={}", e);
                Err(CacheError::Cancelled)
            })
        })
        .boxed()
        .shared()
    }
}

fn lock(calls: &Calls) -> std::sync::MutexGuard<'_, HashMap<String, Call>> {
    calls.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Retire `key` only if it still belongs to `generation`; a newer
/// generation may already have replaced it.
fn forget(calls: &Calls, key: &str, generation: u64) {
    let mut calls = lock(calls);
    if calls.get(key).is_some_and(|call| call.generation == generation) {
        calls.remove(key);
    }
}

/// Best-effort text of a caught panic.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
