//! Mutable staging for a [`Query`].

use std::any::Any;
use std::sync::Arc;

use super::{CacheOptions, LookupValue, MutableLookup, Query};
use crate::db::ConnectionHandle;
use crate::{Error, verify};

/// A mutable façade over one [`Query`].
///
/// Every setter swaps the wrapped query for a new value, so a copy taken
/// with [`QueryBuilder::as_immutable`] never observes later mutation.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    pub(super) inner: Query,
}

impl QueryBuilder {
    pub fn new<'a>(key: impl Into<Option<&'a str>>) -> Self {
        Self { inner: Query::new(key) }
    }

    /// Seed a builder from an existing query.
    pub fn from_query(query: Query) -> Self {
        Self { inner: query }
    }

    pub fn key_copy(&self) -> Option<String> {
        self.inner.key_copy()
    }

    pub fn set_key<'a>(&mut self, key: impl Into<Option<&'a str>>) {
        self.inner = self.inner.with_key(key.into());
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.inner.connection()
    }

    pub fn set_connection(&mut self, connection: Option<ConnectionHandle>) {
        self.inner = self.inner.with_connection(connection);
    }

    pub fn cache_options(&self) -> Option<CacheOptions> {
        self.inner.cache_options()
    }

    pub fn set_cache_options(&mut self, options: Option<CacheOptions>) {
        self.inner = self.inner.with_cache(options);
    }

    pub fn bypass_cache(&self) -> bool {
        self.inner.bypass_cache()
    }

    pub fn set_bypass_cache(&mut self, bypass: bool) {
        let options = CacheOptions { bypass_cache: bypass, ..self.inner.cache_options().unwrap_or_default() };
        self.set_cache_options(Some(options));
    }

    pub fn suppress_cache_write(&self) -> bool {
        self.inner.suppress_cache_write()
    }

    pub fn set_suppress_cache_write(&mut self, suppress: bool) {
        let options =
            CacheOptions { suppress_cache_write: suppress, ..self.inner.cache_options().unwrap_or_default() };
        self.set_cache_options(Some(options));
    }

    /// Snapshot the current state as an immutable query.
    pub fn as_immutable(&self) -> Query {
        self.inner.clone()
    }

    /// Equality against any lookup; see [`Query::try_eq`].
    pub fn try_eq(&self, other: &dyn LookupValue) -> Result<bool, Error> {
        if std::ptr::addr_eq(self as *const QueryBuilder, other as *const dyn LookupValue) {
            return Ok(true);
        }
        let any: &dyn Any = other;
        if let Some(builder) = any.downcast_ref::<QueryBuilder>() {
            return Ok(self.inner == builder.inner);
        }
        if let Some(query) = any.downcast_ref::<Query>() {
            return Ok(self.inner == *query);
        }
        let admitted =
            verify::admit_value(other)?.inherit(self.inner.connection(), self.inner.cache_options());
        Ok(self.inner == admitted)
    }
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl From<Query> for QueryBuilder {
    fn from(query: Query) -> Self {
        Self::from_query(query)
    }
}

impl LookupValue for QueryBuilder {
    fn key_copy(&self) -> Option<String> {
        self.inner.key_copy()
    }

    fn connection(&self) -> Option<ConnectionHandle> {
        self.inner.connection().cloned()
    }

    fn cache_options(&self) -> Option<CacheOptions> {
        self.inner.cache_options()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.try_eq(other).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "builder comparison rejected an unverified lookup");
            false
        })
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for QueryBuilder {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(self.as_immutable())
    }
}

impl PartialEq for QueryBuilder {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for QueryBuilder {}

impl PartialEq<Query> for QueryBuilder {
    fn eq(&self, other: &Query) -> bool {
        self.inner == *other
    }
}
