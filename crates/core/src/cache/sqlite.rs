//! Persistent cache store on SQLite.
//!
//! Opens the database, applies the WAL pragmas and runs migrations. Keys are
//! stored as SHA-256 hashes next to the original key; timestamps are Unix
//! milliseconds.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tokio_rusqlite::rusqlite::{Connection, OptionalExtension, params};

use super::hash::compute_cache_key;
use super::{CacheStore, Error, Expiration, migrations};
use crate::lookup::Payload;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                       PRAGMA synchronous=NORMAL;
                       PRAGMA temp_store=MEMORY;
                       PRAGMA foreign_keys=ON;";

/// Cache store handle. Statements run on the calling thread under a mutex.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    expiration: Expiration,
}

impl SqliteCacheStore {
    /// Open a store at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies pragmas, and runs any
    /// pending migrations.
    pub fn open(path: impl AsRef<Path>, expiration: Expiration) -> Result<Self, Error> {
        Self::init(Connection::open(path)?, expiration)
    }

    /// Open an in-memory store for testing.
    pub fn open_in_memory(expiration: Expiration) -> Result<Self, Error> {
        Self::init(Connection::open_in_memory()?, expiration)
    }

    fn init(conn: Connection, expiration: Expiration) -> Result<Self, Error> {
        conn.execute_batch(PRAGMAS)?;
        migrations::run(&conn)?;
        Ok(Self { conn: Mutex::new(conn), expiration })
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    /// Delete expired entries.
    ///
    /// Returns the number of deleted entries.
    pub fn purge_expired(&self) -> Result<u64, Error> {
        let now = Utc::now().timestamp_millis();
        let count = self
            .conn()?
            .execute("DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= ?1", params![now])?;
        tracing::debug!(purged = count, "purged expired cache entries");
        Ok(count as u64)
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> Result<u64, Error> {
        let count: i64 = self.conn()?.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn.lock().map_err(|_| Error::CacheUnavailable("sqlite cache connection lock poisoned".into()))
    }

    fn expires_at(&self, now: i64) -> Option<i64> {
        self.expiration.ttl().map(|ttl| now.saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)))
    }
}

impl CacheStore for SqliteCacheStore {
    fn exists(&self, key: &str) -> Result<bool, Error> {
        let now = Utc::now().timestamp_millis();
        let fresh: bool = self.conn()?.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM cache_entries
                WHERE key_hash = ?1
                AND (expires_at IS NULL OR expires_at > ?2)
            )",
            params![compute_cache_key(key), now],
            |row| row.get(0),
        )?;
        Ok(fresh)
    }

    fn get(&self, key: &str) -> Result<Option<Payload>, Error> {
        let key_hash = compute_cache_key(key);
        let now = Utc::now().timestamp_millis();
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM cache_entries
                WHERE key_hash = ?1
                AND (expires_at IS NULL OR expires_at > ?2)",
                params![key_hash, now],
                |row| row.get(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(None);
        };

        if self.expiration.is_sliding() {
            conn.execute(
                "UPDATE cache_entries SET accessed_at = ?2, expires_at = ?3 WHERE key_hash = ?1",
                params![key_hash, now, self.expires_at(now)],
            )?;
        }

        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Uses UPSERT semantics: inserts if the key doesn't exist, updates all fields if it does.
    fn put(&self, key: &str, value: &Payload) -> Result<(), Error> {
        let payload_json = serde_json::to_string(value)?;
        let now = Utc::now().timestamp_millis();

        self.conn()?.execute(
            "INSERT INTO cache_entries (key_hash, lookup_key, payload_json, stored_at, accessed_at, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?4, ?5)
            ON CONFLICT(key_hash) DO UPDATE SET
                lookup_key = excluded.lookup_key,
                payload_json = excluded.payload_json,
                stored_at = excluded.stored_at,
                accessed_at = excluded.accessed_at,
                expires_at = excluded.expires_at",
            params![compute_cache_key(key), key, payload_json, now, self.expires_at(now)],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCacheStore").field("expiration", &self.expiration).finish_non_exhaustive()
    }
}
