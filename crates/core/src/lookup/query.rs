//! The immutable query value.

use std::any::Any;
use std::hash::{Hash, Hasher};

use super::{CacheOptions, LookupValue, MutableLookup, QueryBuilder};
use crate::db::ConnectionHandle;
use crate::{Error, verify};

/// Mixed into every query hash.
const HASH_SALT: u64 = 0x5bd1_e995_9e37_79b9;

/// An immutable (key, connection) pair.
///
/// Two queries are equal when their keys are equal by value, their
/// connection handles are the same handle, and their cache options match.
/// The key is never handed out by reference.
#[derive(Clone, Debug)]
pub struct Query {
    key: Option<Box<str>>,
    connection: Option<ConnectionHandle>,
    cache: Option<CacheOptions>,
}

impl Query {
    /// A query that is not bound to any connection. Managers bind it when it
    /// is built into a lookup.
    pub fn new<'a>(key: impl Into<Option<&'a str>>) -> Self {
        Self { key: key.into().map(Box::from), connection: None, cache: None }
    }

    /// A query bound to `connection`.
    pub fn bound<'a>(key: impl Into<Option<&'a str>>, connection: &ConnectionHandle) -> Self {
        Self { key: key.into().map(Box::from), connection: Some(connection.clone()), cache: None }
    }

    /// A copy of this query carrying `options`.
    pub fn with_cache_options(&self, options: CacheOptions) -> Self {
        Self { cache: Some(options), ..self.clone() }
    }

    /// A fresh copy of the key on every call.
    pub fn key_copy(&self) -> Option<String> {
        self.key.as_deref().map(str::to_owned)
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub fn connection(&self) -> Option<&ConnectionHandle> {
        self.connection.as_ref()
    }

    pub fn cache_options(&self) -> Option<CacheOptions> {
        self.cache
    }

    pub fn bypass_cache(&self) -> bool {
        self.cache.is_some_and(|options| options.bypass_cache)
    }

    pub fn suppress_cache_write(&self) -> bool {
        self.cache.is_some_and(|options| options.suppress_cache_write)
    }

    pub(crate) fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn from_parts(
        key: Option<String>, connection: Option<ConnectionHandle>, cache: Option<CacheOptions>,
    ) -> Self {
        Self { key: key.map(String::into_boxed_str), connection, cache }
    }

    pub(crate) fn with_key(&self, key: Option<&str>) -> Self {
        Self { key: key.map(Box::from), ..self.clone() }
    }

    pub(crate) fn with_connection(&self, connection: Option<ConnectionHandle>) -> Self {
        Self { connection, ..self.clone() }
    }

    pub(crate) fn with_cache(&self, cache: Option<CacheOptions>) -> Self {
        Self { cache, ..self.clone() }
    }

    /// Fill in a missing connection or missing cache options.
    pub(crate) fn inherit(mut self, connection: Option<&ConnectionHandle>, cache: Option<CacheOptions>) -> Self {
        if self.connection.is_none() {
            self.connection = connection.cloned();
        }
        if self.cache.is_none() {
            self.cache = cache;
        }
        self
    }

    /// Equality against any lookup.
    ///
    /// Internal values compare directly. Anything else is admitted through
    /// verification first, so a misbehaving mutable lookup is an error here
    /// rather than a silent `false`.
    pub fn try_eq(&self, other: &dyn LookupValue) -> Result<bool, Error> {
        if std::ptr::addr_eq(self as *const Query, other as *const dyn LookupValue) {
            return Ok(true);
        }
        let any: &dyn Any = other;
        if let Some(query) = any.downcast_ref::<Query>() {
            return Ok(self == query);
        }
        if let Some(builder) = any.downcast_ref::<QueryBuilder>() {
            return Ok(self == builder);
        }
        let admitted = verify::admit_value(other)?.inherit(self.connection.as_ref(), self.cache);
        Ok(*self == admitted)
    }
}

impl LookupValue for Query {
    fn key_copy(&self) -> Option<String> {
        Query::key_copy(self)
    }

    fn connection(&self) -> Option<ConnectionHandle> {
        self.connection.clone()
    }

    fn cache_options(&self) -> Option<CacheOptions> {
        self.cache
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.try_eq(other).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "query comparison rejected an unverified lookup");
            false
        })
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        None
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.connection == other.connection && self.cache == other.cache
    }
}

impl Eq for Query {}

impl PartialEq<QueryBuilder> for Query {
    fn eq(&self, other: &QueryBuilder) -> bool {
        *self == other.inner
    }
}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        HASH_SALT.hash(state);
        self.key.hash(state);
        self.connection.hash(state);
        self.cache.hash(state);
    }
}
