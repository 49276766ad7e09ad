//! The database-only lookup manager.

use std::sync::Arc;

use super::resolver::Fetch;
use super::{ConnectionHandle, ConnectionProvider, ConnectionState, DatabaseResolver, QueryExecutor};
use crate::Error;
use crate::lookup::{Lookup, LookupResult, Query, QueryBuilder};
use crate::policy::{ConnectionPolicy, LookupPolicy, Policies};
use crate::verify;

/// When an observer is notified about a connection swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    BeforeChange,
    AfterChange,
}

/// The connections involved in a swap.
#[derive(Debug, Clone)]
pub struct ConnectionChange {
    pub old: ConnectionHandle,
    pub new: ConnectionHandle,
}

type Observer = Box<dyn Fn(ConnectionEvent, &ConnectionChange) + Send + Sync>;

/// Owns one connection and resolves lookups against it.
pub struct DbLookupManager {
    connection: ConnectionHandle,
    provider: Option<Arc<dyn ConnectionProvider>>,
    observers: Vec<Observer>,
    lookup_policy: LookupPolicy,
    resolver: DatabaseResolver,
}

impl DbLookupManager {
    pub fn new(connection: ConnectionHandle, policies: Policies) -> Self {
        Self {
            connection,
            provider: None,
            observers: Vec::new(),
            lookup_policy: policies.lookup,
            resolver: DatabaseResolver::new(policies.connection),
        }
    }

    /// Build a manager whose first connection comes from `provider`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConnectionProvider`] if the provider fails.
    pub fn from_provider(provider: impl ConnectionProvider + 'static, policies: Policies) -> Result<Self, Error> {
        let provider: Arc<dyn ConnectionProvider> = Arc::new(provider);
        let connection = provider.connect().map_err(Error::InvalidConnectionProvider)?;
        let mut manager = Self::new(ConnectionHandle::from_boxed(connection), policies);
        manager.provider = Some(provider);
        Ok(manager)
    }

    /// Replace the query executor used for database resolution.
    pub fn with_executor(mut self, executor: impl QueryExecutor + 'static) -> Self {
        self.resolver = DatabaseResolver::with_executor(self.resolver.policy(), Arc::new(executor));
        self
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn database_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Open
    }

    pub fn lookup_policy(&self) -> LookupPolicy {
        self.lookup_policy
    }

    pub fn connection_policy(&self) -> ConnectionPolicy {
        self.resolver.policy()
    }

    /// Register an observer for connection swaps.
    pub fn on_connection_change(
        &mut self, observer: impl Fn(ConnectionEvent, &ConnectionChange) + Send + Sync + 'static,
    ) {
        self.observers.push(Box::new(observer));
    }

    /// Swap in a fresh connection from the provider.
    ///
    /// Lookups built before the swap stay bound to the old connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConnectionProvider`] for managers built from a
    /// single connection, and [`Error::InvalidConnectionProvider`] if the
    /// provider fails. The current connection is kept in both cases.
    pub fn next_connection(&mut self) -> Result<ConnectionHandle, Error> {
        let provider = self.provider.as_ref().ok_or(Error::MissingConnectionProvider)?;
        let fresh = provider.connect().map_err(Error::InvalidConnectionProvider)?;

        let change = ConnectionChange { old: self.connection.clone(), new: ConnectionHandle::from_boxed(fresh) };
        self.notify(ConnectionEvent::BeforeChange, &change);
        self.connection = change.new.clone();
        self.notify(ConnectionEvent::AfterChange, &change);

        tracing::debug!(old = ?change.old, new = ?change.new, "swapped connection");
        Ok(change.new)
    }

    fn notify(&self, event: ConnectionEvent, change: &ConnectionChange) {
        for observer in &self.observers {
            observer(event, change);
        }
    }

    /// Admit `lookup` and bind it to this manager's connection if it is
    /// unbound. A lookup already bound elsewhere keeps its binding.
    pub fn build_lookup(&self, lookup: impl Into<Lookup>) -> Result<Query, Error> {
        let query = verify::admit(&lookup.into())?;
        Ok(query.inherit(Some(&self.connection), None))
    }

    /// A builder seeded from `seed`, or with a null key.
    pub fn build_mutable_lookup(&self, seed: Option<Lookup>) -> Result<QueryBuilder, Error> {
        let query = match seed {
            Some(seed) => self.build_lookup(seed)?,
            None => Query::bound(None, &self.connection),
        };
        Ok(QueryBuilder::from_query(query))
    }

    /// A [`crate::DataSource::None`] result for `lookup`.
    pub fn failure_result(&self, lookup: impl Into<Lookup>) -> Result<LookupResult, Error> {
        Ok(LookupResult::failure(self.build_lookup(lookup)?))
    }

    /// Resolve `lookup` against the database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupNotPermitted`] when the lookup policy is
    /// cleared, plus any error from admission or resolution.
    pub fn lookup(&self, lookup: impl Into<Lookup>) -> Result<LookupResult, Error> {
        self.ensure_lookup_allowed()?;
        let query = self.build_lookup(lookup)?;
        self.resolver.resolve(&query)
    }

    /// Resolve an already built query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LookupNotPermitted`] when the lookup policy is
    /// cleared, plus any error from resolution.
    pub fn resolve(&self, query: &Query) -> Result<LookupResult, Error> {
        self.ensure_lookup_allowed()?;
        self.resolver.resolve(query)
    }

    pub(crate) fn ensure_lookup_allowed(&self) -> Result<(), Error> {
        if self.lookup_policy.contains(LookupPolicy::ALLOW_LOOKUP) {
            Ok(())
        } else {
            Err(Error::LookupNotPermitted)
        }
    }

    pub(crate) fn fetch(&self, query: &Query) -> Result<Fetch, Error> {
        self.resolver.fetch(query)
    }
}

impl std::fmt::Debug for DbLookupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbLookupManager")
            .field("connection", &self.connection)
            .field("has_provider", &self.provider.is_some())
            .field("observers", &self.observers.len())
            .field("lookup_policy", &self.lookup_policy)
            .field("connection_policy", &self.resolver.policy())
            .finish()
    }
}
