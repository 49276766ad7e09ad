//! Cache tier for lookup payloads.
//!
//! The store itself is an external collaborator behind [`CacheStore`]. Two
//! implementations ship with the crate:
//!
//! - [`MemoryCacheStore`]: in-process map, lost on exit
//! - [`SqliteCacheStore`]: persistent, SHA-256 keyed, migrated schema in WAL mode
//!
//! Both honor an [`Expiration`] mode. [`CacheAdapter`] maps queries onto a
//! store and rejects null keys.

pub mod hash;
pub mod memory;
pub mod migrations;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Error;
pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use crate::lookup::{Payload, Query};

/// A key/value store for payloads. Implementations must be safe to share
/// between threads.
pub trait CacheStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, Error>;

    fn get(&self, key: &str) -> Result<Option<Payload>, Error>;

    fn put(&self, key: &str, value: &Payload) -> Result<(), Error>;
}

/// How entries expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationMode {
    /// Entries live until overwritten.
    #[default]
    None,
    /// Entries expire a fixed time after they were written.
    Absolute,
    /// Entries expire a fixed time after they were last read or written.
    Sliding,
}

/// Expiration mode plus time-to-live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expiration {
    pub mode: ExpirationMode,
    pub ttl: Duration,
}

impl Expiration {
    pub const fn none() -> Self {
        Self { mode: ExpirationMode::None, ttl: Duration::ZERO }
    }

    pub const fn absolute(ttl: Duration) -> Self {
        Self { mode: ExpirationMode::Absolute, ttl }
    }

    pub const fn sliding(ttl: Duration) -> Self {
        Self { mode: ExpirationMode::Sliding, ttl }
    }

    /// Time-to-live for a write, or `None` when entries never expire.
    pub fn ttl(&self) -> Option<Duration> {
        match self.mode {
            ExpirationMode::None => None,
            ExpirationMode::Absolute | ExpirationMode::Sliding => Some(self.ttl),
        }
    }

    pub fn is_sliding(&self) -> bool {
        self.mode == ExpirationMode::Sliding
    }
}

/// Maps queries to a [`CacheStore`] by their key.
#[derive(Clone)]
pub struct CacheAdapter {
    store: Arc<dyn CacheStore>,
}

impl CacheAdapter {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Whether the store holds an entry for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NullKey`] if the query has no key.
    pub fn contains(&self, query: &Query) -> Result<bool, Error> {
        self.store.exists(Self::key(query, "cache contains")?)
    }

    pub fn get(&self, query: &Query) -> Result<Option<Payload>, Error> {
        self.store.get(Self::key(query, "cache get")?)
    }

    pub fn put(&self, query: &Query, value: &Payload) -> Result<(), Error> {
        self.store.put(Self::key(query, "cache put")?, value)
    }

    fn key<'q>(query: &'q Query, operation: &'static str) -> Result<&'q str, Error> {
        query.key().ok_or(Error::NullKey { operation })
    }
}

impl std::fmt::Debug for CacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAdapter").finish_non_exhaustive()
    }
}
