//! Wire format and retry policy for the distributed race lock.
//!
//! While a computation runs, the lock key holds [`PLACEHOLDER`]. Once it
//! finishes, the key is overwritten with a [`LockRecord`] so racers that are
//! still polling read the result instead of computing it again.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::store::Computed;

/// Value held at the lock key while the computation is in flight.
pub const PLACEHOLDER: &[u8] = b"1";

/// Default prefix of lock keys.
pub const DEFAULT_LOCK_PREFIX: &str = "!lock!";

/// Default lifetime of a finished race result.
pub const DEFAULT_SUPPRESSION_TTL: Duration = Duration::from_secs(2);

const DEFAULT_MIN_RETRY_DELAY: Duration = Duration::from_millis(50);
const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_millis(250);

/// The outcome of a finished race as stored under the lock key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub result: Result<Computed, CacheError>,
}

impl LockRecord {
    pub fn encode(result: &Result<Computed, CacheError>) -> Result<Vec<u8>, CacheError> {
        #[derive(Serialize)]
        struct Borrowed<'a> {
            result: &'a Result<Computed, CacheError>,
        }
        Ok(rmp_serde::to_vec_named(&Borrowed { result })?)
    }

    /// Decode a lock value. `None` for the placeholder or anything unreadable.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes == PLACEHOLDER {
            return None;
        }
        rmp_serde::from_slice(bytes).ok()
    }
}

/// Delay policy between lock retries.
#[derive(Clone)]
pub enum RetryDelay {
    /// Uniformly random delay in `[min, max)`, so waiting processes do not
    /// retry in lockstep.
    Jitter { min: Duration, max: Duration },
    /// Caller-supplied delay, given the number of retries so far.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl RetryDelay {
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        RetryDelay::Custom(Arc::new(f))
    }

    /// Delay before retry number `tries`.
    pub fn delay(&self, tries: u32) -> Duration {
        match self {
            RetryDelay::Jitter { min, max } if max > min => {
                rand::thread_rng().gen_range(*min..*max)
            }
            RetryDelay::Jitter { min, .. } => *min,
            RetryDelay::Custom(f) => f(tries),
        }
    }

    /// Upper bound of the delay, when it is known.
    pub fn max(&self) -> Option<Duration> {
        match self {
            RetryDelay::Jitter { min, max } => Some(*min.max(max)),
            RetryDelay::Custom(_) => None,
        }
    }
}

impl Default for RetryDelay {
    fn default() -> Self {
        RetryDelay::Jitter {
            min: DEFAULT_MIN_RETRY_DELAY,
            max: DEFAULT_MAX_RETRY_DELAY,
        }
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::Jitter { min, max } => f
                .debug_struct("Jitter")
                .field("min", min)
                .field("max", max)
                .finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}
