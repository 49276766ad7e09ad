//! Cache-or-database resolution.
//!
//! [`CacheDbLookupManager`] wraps a [`DbLookupManager`] with a cache tier.
//! The cache policy decides whether the cache is consulted first; a database
//! hit fills the cache unless the query suppresses it; a closed connection
//! under a no-auto-connect policy falls back to the cache.

use std::sync::Arc;

use crate::Error;
use crate::cache::{CacheAdapter, CacheStore};
use crate::db::resolver::Fetch;
use crate::db::{ConnectionHandle, DbLookupManager};
use crate::lookup::{CacheOptions, Lookup, LookupResult, Payload, Query, QueryBuilder};
use crate::policy::{CachePolicy, Policies};

/// Resolves lookups from a cache store or the database.
#[derive(Debug)]
pub struct CacheDbLookupManager {
    db: DbLookupManager,
    cache: CacheAdapter,
    policy: CachePolicy,
}

impl CacheDbLookupManager {
    pub fn new(connection: ConnectionHandle, store: Arc<dyn CacheStore>, policies: Policies) -> Self {
        Self::from_parts(DbLookupManager::new(connection, policies), store, policies.cache)
    }

    /// Wrap an existing database manager, keeping its provider and observers.
    pub fn from_parts(db: DbLookupManager, store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self { db, cache: CacheAdapter::new(store), policy }
    }

    pub fn db(&self) -> &DbLookupManager {
        &self.db
    }

    /// Mutable access to the database manager, for connection swaps.
    pub fn db_mut(&mut self) -> &mut DbLookupManager {
        &mut self.db
    }

    pub fn cache_policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn policies(&self) -> Policies {
        Policies { lookup: self.db.lookup_policy(), connection: self.db.connection_policy(), cache: self.policy }
    }

    /// Admit `lookup`, bind it to this manager's connection if unbound, and
    /// attach cache options.
    ///
    /// `options` overrides whatever the lookup carries. A lookup without
    /// options gets the defaults.
    pub fn build_lookup(&self, lookup: impl Into<Lookup>, options: Option<CacheOptions>) -> Result<Query, Error> {
        let query = self.db.build_lookup(lookup)?;
        let options = options.or(query.cache_options()).unwrap_or_default();
        Ok(query.with_cache_options(options))
    }

    pub fn build_mutable_lookup(
        &self, seed: Option<Lookup>, options: Option<CacheOptions>,
    ) -> Result<QueryBuilder, Error> {
        let query = match seed {
            Some(seed) => self.build_lookup(seed, options)?,
            None => Query::bound(None, self.db.connection()).with_cache_options(options.unwrap_or_default()),
        };
        Ok(QueryBuilder::from_query(query))
    }

    /// A [`crate::DataSource::None`] result for `lookup`.
    pub fn failure_result(&self, lookup: impl Into<Lookup>) -> Result<LookupResult, Error> {
        Ok(LookupResult::failure(self.build_lookup(lookup, None)?))
    }

    pub fn lookup(&self, lookup: impl Into<Lookup>) -> Result<LookupResult, Error> {
        self.lookup_with(lookup, None)
    }

    /// Like [`CacheDbLookupManager::lookup`] with explicit cache options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupNotPermitted`] when the lookup policy is
    /// cleared, plus any error from admission, the cache store or the
    /// database.
    pub fn lookup_with(&self, lookup: impl Into<Lookup>, options: Option<CacheOptions>) -> Result<LookupResult, Error> {
        self.db.ensure_lookup_allowed()?;
        let query = self.build_lookup(lookup, options)?;
        self.resolve_permitted(&query)
    }

    /// Resolve an already built query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupNotPermitted`] when the lookup policy is
    /// cleared, plus any error from the cache store or the database.
    pub fn resolve(&self, query: &Query) -> Result<LookupResult, Error> {
        self.db.ensure_lookup_allowed()?;
        self.resolve_permitted(query)
    }

    fn resolve_permitted(&self, query: &Query) -> Result<LookupResult, Error> {
        let options = query.cache_options().unwrap_or_default();
        let cache_first = self.policy.contains(CachePolicy::PREFER_CACHE) && !options.bypass_cache;

        if cache_first && let Some(hit) = self.read_cache(query)? {
            return Ok(hit);
        }

        match self.db.fetch(query)? {
            Fetch::Rows(table) => {
                let payload = Payload::Table(table);
                if options.suppress_cache_write {
                    tracing::debug!("cache write suppressed");
                } else {
                    self.cache.put(query, &payload)?;
                }
                Ok(LookupResult::from_database(query.clone(), payload))
            }
            Fetch::NotConnected if !cache_first && !options.bypass_cache => {
                tracing::debug!("database unavailable without auto-connect, falling back to cache");
                Ok(self.read_cache(query)?.unwrap_or_else(|| LookupResult::failure(query.clone())))
            }
            Fetch::NotConnected => Ok(LookupResult::failure(query.clone())),
        }
    }

    /// Read `lookup` from the cache without touching the database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheLookupNotAllowed`] unless the cache policy allows
    /// custom cache lookups.
    pub fn lookup_cache_only(&self, lookup: impl Into<Lookup>) -> Result<LookupResult, Error> {
        if !self.policy.contains(CachePolicy::ALLOW_CUSTOM_CACHE_LOOKUP) {
            return Err(Error::CacheLookupNotAllowed);
        }
        let query = self.build_lookup(lookup, None)?;
        Ok(self.read_cache(&query)?.unwrap_or_else(|| LookupResult::failure(query)))
    }

    /// Write `payload` under `lookup` without touching the database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheInsertNotAllowed`] unless the cache policy allows
    /// custom cache inserts.
    pub fn insert_cache_only(&self, lookup: impl Into<Lookup>, payload: Payload) -> Result<Query, Error> {
        if !self.policy.contains(CachePolicy::ALLOW_CUSTOM_CACHE_INSERT) {
            return Err(Error::CacheInsertNotAllowed);
        }
        let query = self.build_lookup(lookup, None)?;
        self.cache.put(&query, &payload)?;
        tracing::debug!("inserted custom cache entry");
        Ok(query)
    }

    /// Store a previous result's payload under its query.
    pub fn insert_result_cache_only(&self, result: &LookupResult) -> Result<Query, Error> {
        let payload = result
            .payload()
            .cloned()
            .ok_or_else(|| Error::InvalidInput("cannot cache a result without a payload".into()))?;
        self.insert_cache_only(result.query(), payload)
    }

    fn read_cache(&self, query: &Query) -> Result<Option<LookupResult>, Error> {
        if !self.cache.contains(query)? {
            tracing::debug!("cache miss");
            return Ok(None);
        }
        match self.cache.get(query)? {
            Some(payload) => {
                tracing::debug!("cache hit");
                Ok(Some(LookupResult::from_cache(query.clone(), payload)))
            }
            None => {
                tracing::debug!("cache entry vanished between contains and get");
                Ok(None)
            }
        }
    }
}
