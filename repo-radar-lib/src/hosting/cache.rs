//! A TTL-aware, in-memory memo of hosting API responses.
//!
//! [`Cache`] is owned by a single [`Provider`](super::Provider). Entries are stored as JSON
//! values so that any serializable response type can share the same table, keyed by a
//! normalized [`CacheKey`] built from the operation name and all its parameters.

use super::clock::Clock;
use crate::Result;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use ohno::IntoAppError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

const LOG_TARGET: &str = "     cache";

/// Default time-to-live for cached responses.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Result of loading an entry from the cache.
#[derive(Debug, Clone)]
pub enum CacheResult<T> {
    /// Cached data was found and is still fresh.
    Data(T),

    /// A negative cache entry exists: the data was previously determined to be unavailable.
    NoData(String),

    /// No usable cache entry exists (never stored, expired, or undecodable).
    Miss,
}

/// Normalized composite key: the operation name plus every parameter that affects the result.
///
/// Parameters are kept sorted by name so that the same request always produces the same key
/// no matter the order in which parameters were added.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    #[must_use]
    pub fn new(operation: &str) -> CacheKeyBuilder {
        CacheKeyBuilder {
            operation: operation.to_string(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: String,
    params: BTreeMap<String, String>,
}

impl CacheKeyBuilder {
    #[must_use]
    pub fn param(mut self, name: &str, value: impl Display) -> Self {
        let _ = self.params.insert(name.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn build(self) -> CacheKey {
        if self.params.is_empty() {
            return CacheKey(self.operation);
        }

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.params)
            .finish();
        CacheKey(format!("{}?{query}", self.operation))
    }
}

#[derive(Debug, Clone)]
struct Envelope {
    timestamp: DateTime<Utc>,
    payload: EnvelopePayload,
}

#[derive(Debug, Clone)]
enum EnvelopePayload {
    Data(serde_json::Value),
    NoData(String),
}

/// A TTL-aware in-memory cache.
#[derive(Debug)]
pub struct Cache {
    entries: Mutex<HashMap<CacheKey, Envelope>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Cache {
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries currently held, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock not poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load an entry. Stale or undecodable entries are evicted and reported as a miss.
    #[must_use]
    pub fn load<T>(&self, key: &CacheKey) -> CacheResult<T>
    where
        T: DeserializeOwned,
    {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("lock not poisoned");

        let Some(envelope) = entries.get(key) else {
            log::debug!(target: LOG_TARGET, "Cache miss for {key}");
            return CacheResult::Miss;
        };

        // Handle future timestamps (clock skew) count as fresh
        let age = now.signed_duration_since(envelope.timestamp);
        if age.num_milliseconds() < 0 {
            log::debug!(target: LOG_TARGET, "Cache timestamp is in the future for {key} (clock skew detected), treating as fresh");
        } else {
            let age_duration = age.to_std().unwrap_or(Duration::MAX);

            if age_duration >= self.ttl {
                log::debug!(
                    target: LOG_TARGET,
                    "Cache expired for {key} (age: {}s, TTL: {}s)",
                    age_duration.as_secs(),
                    self.ttl.as_secs()
                );
                let _ = entries.remove(key);
                return CacheResult::Miss;
            }

            log::debug!(target: LOG_TARGET, "Cache hit for {key} (age: {}s)", age_duration.as_secs());
        }

        match &envelope.payload {
            EnvelopePayload::NoData(reason) => CacheResult::NoData(reason.clone()),
            EnvelopePayload::Data(value) => match serde_json::from_value(value.clone()) {
                Ok(data) => CacheResult::Data(data),
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Cache entry for {key} could not be decoded: {e:#}");
                    let _ = entries.remove(key);
                    CacheResult::Miss
                }
            },
        }
    }

    /// Store data under the given key, stamped with the current time.
    pub fn save<T>(&self, key: &CacheKey, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        let value = serde_json::to_value(data).into_app_err_with(|| format!("encoding cache entry for {key}"))?;
        self.insert(key, EnvelopePayload::Data(value));
        Ok(())
    }

    /// Store a negative entry (data unavailable) under the given key.
    pub fn save_no_data(&self, key: &CacheKey, reason: &str) {
        self.insert(key, EnvelopePayload::NoData(reason.to_string()));
    }

    fn insert(&self, key: &CacheKey, payload: EnvelopePayload) {
        let envelope = Envelope {
            timestamp: self.clock.now(),
            payload,
        };
        let _ = self.entries.lock().expect("lock not poisoned").insert(key.clone(), envelope);
    }
}
