use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::CacheError;
use crate::utils::{duration_ms, now_ms};

/// Envelope version written by [`encode`] and required by [`decode`].
pub const PAYLOAD_VERSION: u8 = 1;

/// Response details carried alongside a value by adapters that cache
/// structured responses. The core never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub status: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
}

/// The unit written to every store: an opaque value plus its freshness deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// The cached value.
    pub value: Bytes,

    /// Unix timestamp in milliseconds.
    /// Before this time the payload is fresh; at or after it the payload is
    /// stale but still served while a refresh runs.
    pub best_before: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,

    version: u8,
}

impl Payload {
    /// Create a payload that is already stale until [`Payload::fresh_for`] is applied.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Payload {
            value: value.into(),
            best_before: 0,
            metadata: None,
            version: PAYLOAD_VERSION,
        }
    }

    /// Attach response metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Stamp the freshness deadline `fresh_for` from now.
    pub fn fresh_for(&mut self, fresh_for: Duration) {
        self.best_before = now_ms().saturating_add(duration_ms(fresh_for));
    }

    /// Check if the payload is still fresh at `now_ms`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.best_before
    }

    /// Check if the payload is stale and should be refreshed in the background.
    pub fn needs_refresh(&self) -> bool {
        !self.is_fresh(now_ms())
    }

    /// Whether this payload was written by a compatible encoder.
    pub fn is_valid(&self) -> bool {
        self.version == PAYLOAD_VERSION
    }
}

/// Serialize a payload. Fails only on serialization faults.
pub fn encode(payload: &Payload) -> Result<Bytes, CacheError> {
    if !payload.is_valid() {
        return Err(CacheError::NotFound);
    }
    Ok(rmp_serde::to_vec_named(payload)?.into())
}

/// Deserialize a payload.
///
/// Empty input, a foreign version and a structural decode failure all come
/// back as `None`: a corrupted entry is indistinguishable from a miss.
pub fn decode(bytes: &[u8]) -> Option<Payload> {
    if bytes.is_empty() {
        return None;
    }
    let payload: Payload = match rmp_serde::from_slice(bytes) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("discarding undecodable payload: {}", e);
            return None;
        }
    };
    payload.is_valid().then_some(payload)
}
