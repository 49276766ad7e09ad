//! Lookup values: the immutable [`Query`], the mutable [`QueryBuilder`], and
//! the capability traits externally defined lookups implement.
//!
//! Inside this crate every lookup travels as a [`Lookup`]. The two internal
//! variants are trusted by construction. An external value that can mutate
//! travels as [`Lookup::ExternalMutable`] and is only admitted after it passes
//! [`crate::verify`].

pub mod builder;
pub mod query;
pub mod result;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use builder::QueryBuilder;
pub use query::Query;
pub use result::{DataSource, LookupResult, Payload};

use crate::db::ConnectionHandle;

/// Per-lookup cache overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Skip the cache read; the lookup always goes to the database.
    #[serde(default)]
    pub bypass_cache: bool,
    /// Do not fill the cache with the database result.
    #[serde(default)]
    pub suppress_cache_write: bool,
}

impl CacheOptions {
    pub const fn new(bypass_cache: bool, suppress_cache_write: bool) -> Self {
        Self { bypass_cache, suppress_cache_write }
    }
}

/// Read side of a lookup.
///
/// Implementations outside this crate are untrusted. A type that also
/// implements [`MutableLookup`] should be wrapped with
/// [`Lookup::external_mutable`], which verifies it regardless of what
/// [`LookupValue::as_mutable`] reports.
pub trait LookupValue: Any + Debug + Send + Sync {
    /// A fresh copy of the key. `None` is a legal key meaning "no key".
    fn key_copy(&self) -> Option<String>;

    /// The connection this lookup is bound to, if any.
    fn connection(&self) -> Option<ConnectionHandle> {
        None
    }

    /// Cache overrides carried by cache-aware lookups.
    fn cache_options(&self) -> Option<CacheOptions> {
        None
    }

    /// Lookup equality.
    fn lookup_eq(&self, other: &dyn LookupValue) -> bool;

    /// `Some(self)` for types that also implement [`MutableLookup`].
    fn as_mutable(&self) -> Option<&dyn MutableLookup>;
}

/// Write side of a lookup.
pub trait MutableLookup: LookupValue {
    /// A new value that is not `self`, is not mutable, and compares equal to
    /// `self` at the time of the call.
    fn immutable_copy(&self) -> Arc<dyn LookupValue>;
}

/// A lookup as accepted by the managers.
#[derive(Debug, Clone)]
pub enum Lookup {
    Query(Query),
    Builder(QueryBuilder),
    External(Arc<dyn LookupValue>),
    ExternalMutable(Arc<dyn MutableLookup>),
}

impl Lookup {
    /// An unbound query for `key`.
    pub fn from_key<'a>(key: impl Into<Option<&'a str>>) -> Self {
        Lookup::Query(Query::new(key))
    }

    /// Wrap an externally defined lookup.
    pub fn external(value: impl LookupValue) -> Self {
        Lookup::External(Arc::new(value))
    }

    /// Wrap an externally defined mutable lookup. Admission always verifies it.
    pub fn external_mutable(value: impl MutableLookup) -> Self {
        Lookup::ExternalMutable(Arc::new(value))
    }

    /// The lookup as a trait object.
    pub fn as_value(&self) -> &dyn LookupValue {
        match self {
            Lookup::Query(query) => query,
            Lookup::Builder(builder) => builder,
            Lookup::External(value) => value.as_ref(),
            Lookup::ExternalMutable(value) => {
                let value: &dyn LookupValue = value.as_ref();
                value
            }
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Lookup::External(_) | Lookup::ExternalMutable(_))
    }
}

impl From<Query> for Lookup {
    fn from(query: Query) -> Self {
        Lookup::Query(query)
    }
}

impl From<&Query> for Lookup {
    fn from(query: &Query) -> Self {
        Lookup::Query(query.clone())
    }
}

impl From<QueryBuilder> for Lookup {
    fn from(builder: QueryBuilder) -> Self {
        Lookup::Builder(builder)
    }
}

impl From<Arc<dyn LookupValue>> for Lookup {
    fn from(value: Arc<dyn LookupValue>) -> Self {
        Lookup::External(value)
    }
}

impl From<Arc<dyn MutableLookup>> for Lookup {
    fn from(value: Arc<dyn MutableLookup>) -> Self {
        Lookup::ExternalMutable(value)
    }
}

impl From<&str> for Lookup {
    fn from(key: &str) -> Self {
        Lookup::from_key(key)
    }
}

impl From<String> for Lookup {
    fn from(key: String) -> Self {
        Lookup::from_key(key.as_str())
    }
}
