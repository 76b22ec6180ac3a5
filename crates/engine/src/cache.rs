//! TTL cache for pipeline results.
//!
//! Keys are canonical JSON of the inputs that affect a computation (ids and
//! primitive values only). A fresh entry is returned as the same [`Arc`]
//! that was stored; an expired entry is recomputed and overwritten in place.
//! Expiry is only checked on read.
//!
//! All access goes through one mutex, held across the computation on a
//! miss, so concurrent writers to a key are serialized.

use std::{
    collections::HashMap,
    convert::Infallible,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::EngineError;

/// Time source of a cache.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
struct CacheEntry<T> {
    data: Arc<T>,
    timestamp: DateTime<Utc>,
    ttl: TimeDelta,
}

impl<T> CacheEntry<T> {
    fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.timestamp
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.ttl
    }
}

/// Introspection of one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub age_ms: i64,
    pub ttl_ms: i64,
    pub expired: bool,
}

/// Introspection of a whole cache.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
    pub entries: Vec<EntryStats>,
}

/// Memoizes computations of `T` by canonical key.
pub struct ComputationCache<T> {
    name: &'static str,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> fmt::Debug for ComputationCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("size", &self.len())
            .finish()
    }
}

impl<T> ComputationCache<T> {
    #[must_use]
    pub fn new(name: &'static str, ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Canonical key of a request.
    pub fn key<K: Serialize>(request: &K) -> Result<String, EngineError> {
        // Round-tripping through `Value` sorts object keys.
        let value = serde_json::to_value(request)?;
        Ok(serde_json::to_string(&value)?)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value for `key`, if fresh.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| Arc::clone(&entry.data))
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn insert(&self, key: String, data: T) -> Arc<T> {
        let data = Arc::new(data);
        let entry = CacheEntry {
            data: Arc::clone(&data),
            timestamp: self.clock.now(),
            ttl: self.ttl,
        };
        self.lock().insert(key, entry);
        data
    }

    /// Return the fresh value for `key` or compute and store a new one.
    ///
    /// Errors are returned as they are and nothing is stored.
    pub fn get_or_try_compute<E, F>(&self, key: String, compute: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let mut entries = self.lock();
        let now = self.clock.now();
        match entries.get(&key) {
            Some(entry) if entry.is_fresh(now) => {
                tracing::debug!(cache = self.name, key = %key, "cache hit");
                return Ok(Arc::clone(&entry.data));
            }
            Some(_) => tracing::debug!(cache = self.name, key = %key, "cache entry expired"),
            None => tracing::debug!(cache = self.name, key = %key, "cache miss"),
        }

        let data = Arc::new(compute()?);
        entries.insert(
            key,
            CacheEntry {
                data: Arc::clone(&data),
                timestamp: now,
                ttl: self.ttl,
            },
        );
        Ok(data)
    }

    /// Infallible form of [`get_or_try_compute`](Self::get_or_try_compute).
    pub fn get_or_compute<F>(&self, key: String, compute: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_compute(key, || Ok::<T, Infallible>(compute())) {
            Ok(data) => data,
            Err(never) => match never {},
        }
    }

    /// Drop one entry. Returns `true` if it existed.
    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.lock();
        let mut stats: Vec<EntryStats> = entries
            .iter()
            .map(|(key, entry)| EntryStats {
                key: key.clone(),
                age_ms: entry.age(now).num_milliseconds(),
                ttl_ms: entry.ttl.num_milliseconds(),
                expired: !entry.is_fresh(now),
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        CacheStats {
            size: stats.len(),
            keys: stats.iter().map(|e| e.key.clone()).collect(),
            entries: stats,
        }
    }
}
