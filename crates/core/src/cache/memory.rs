//! In-process cache store.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use super::{CacheStore, Error, Expiration};
use crate::lookup::Payload;

struct Entry {
    payload: Payload,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// A `HashMap` behind an `RwLock`, with optional expiration.
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
    expiration: Expiration,
}

impl MemoryCacheStore {
    pub fn new(expiration: Expiration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), expiration }
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> Result<usize, Error> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.read()?.is_empty())
    }

    pub fn clear(&self) -> Result<(), Error> {
        self.write()?.clear();
        Ok(())
    }

    /// Drop expired entries and return how many were removed.
    pub fn purge_expired(&self) -> Result<usize, Error> {
        let now = Instant::now();
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();
        tracing::debug!(purged, "purged expired memory cache entries");
        Ok(purged)
    }

    fn deadline(&self, now: Instant) -> Option<Instant> {
        // `None` past the end of the clock means the entry never expires.
        self.expiration.ttl().and_then(|ttl| now.checked_add(ttl))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Entry>>, Error> {
        self.entries.read().map_err(|_| Error::CacheUnavailable("memory cache lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Entry>>, Error> {
        self.entries.write().map_err(|_| Error::CacheUnavailable("memory cache lock poisoned".into()))
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(Expiration::none())
    }
}

impl CacheStore for MemoryCacheStore {
    fn exists(&self, key: &str) -> Result<bool, Error> {
        let now = Instant::now();
        Ok(self.read()?.get(key).is_some_and(|entry| !entry.is_expired(now)))
    }

    fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        let now = Instant::now();
        if !self.expiration.is_sliding() {
            let entries = self.read()?;
            return Ok(entries.get(key).filter(|entry| !entry.is_expired(now)).map(|entry| entry.payload.clone()));
        }

        let deadline = self.deadline(now);
        let mut entries = self.write()?;
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = deadline;
                Ok(Some(entry.payload.clone()))
            }
            _ => Ok(None),
        }
    }

    fn put(&self, key: &str, value: &Payload) -> Result<(), Error> {
        let expires_at = self.deadline(Instant::now());
        self.write()?.insert(key.to_owned(), Entry { payload: value.clone(), expires_at });
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheStore").field("expiration", &self.expiration).finish_non_exhaustive()
    }
}
