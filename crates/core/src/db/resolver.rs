//! Connection bracketing around one database resolution.

use std::sync::{Arc, MutexGuard};

use super::{ConnectionState, DataTable, DbConnection};
use crate::Error;
use crate::error::CollaboratorError;
use crate::lookup::{LookupResult, Payload, Query};
use crate::policy::ConnectionPolicy;

/// Runs one command on an open connection.
pub trait QueryExecutor: Send + Sync {
    fn execute(&self, connection: &mut dyn DbConnection, command_text: &str) -> Result<DataTable, CollaboratorError>;
}

/// Begin a transaction, run the key as command text, load every row, commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionalExecutor;

impl QueryExecutor for TransactionalExecutor {
    fn execute(&self, connection: &mut dyn DbConnection, command_text: &str) -> Result<DataTable, CollaboratorError> {
        let mut tx = connection.begin_transaction()?;
        let table = tx.execute_reader(command_text)?;
        tx.commit()?;
        Ok(table)
    }
}

/// Database outcome before it is turned into a [`LookupResult`].
#[derive(Debug)]
pub(crate) enum Fetch {
    Rows(DataTable),
    /// The connection was closed and policy forbids auto-connect.
    NotConnected,
}

/// Drives connect and disconnect policy around query execution.
#[derive(Clone)]
pub struct DatabaseResolver {
    policy: ConnectionPolicy,
    executor: Arc<dyn QueryExecutor>,
}

impl DatabaseResolver {
    pub fn new(policy: ConnectionPolicy) -> Self {
        Self { policy, executor: Arc::new(TransactionalExecutor) }
    }

    pub fn with_executor(policy: ConnectionPolicy, executor: Arc<dyn QueryExecutor>) -> Self {
        Self { policy, executor }
    }

    pub fn policy(&self) -> ConnectionPolicy {
        self.policy
    }

    /// Resolve `query` against its bound connection.
    ///
    /// A closed connection under a policy without auto-connect yields a
    /// [`crate::DataSource::None`] result instead of an error.
    pub fn resolve(&self, query: &Query) -> Result<LookupResult, Error> {
        match self.fetch(query)? {
            Fetch::Rows(table) => Ok(LookupResult::from_database(query.clone(), Payload::Table(table))),
            Fetch::NotConnected => Ok(LookupResult::failure(query.clone())),
        }
    }

    pub(crate) fn fetch(&self, query: &Query) -> Result<Fetch, Error> {
        if self.policy.contains(ConnectionPolicy::AUTO_REFRESH) {
            return Err(Error::NotYetSupported("auto-refresh connection policy".into()));
        }
        let Some(handle) = query.connection() else {
            return Err(Error::NotYetSupported("query is not bound to a connection of this manager".into()));
        };
        let key = query.key().ok_or(Error::NullKey { operation: "database lookup" })?;

        let mut connection = handle.lock()?;
        let mut auto_connected = false;
        if connection.state() != ConnectionState::Open {
            if !self.policy.contains(ConnectionPolicy::AUTO_CONNECT) {
                tracing::debug!(state = ?connection.state(), "connection closed and auto-connect disabled");
                return Ok(Fetch::NotConnected);
            }
            connection.open().map_err(|source| Error::DataUnreachable { context: "auto-connect", source })?;
            auto_connected = true;
            tracing::debug!("auto-connected");
        }

        let disconnect = self.policy.contains(ConnectionPolicy::AUTO_DISCONNECT_ALL)
            || (auto_connected && self.policy.contains(ConnectionPolicy::AUTO_DISCONNECT_WHEN_AUTOCONNECTED));
        let mut bracket = Bracket { connection, disconnect };

        let state = bracket.connection.state();
        let outcome = if state == ConnectionState::Open {
            self.executor.execute(&mut **bracket.connection, key).map_err(Error::ExecutionFailed)
        } else {
            Err(Error::UnexpectedBehavior(format!("connection reported {state:?} after a successful open")))
        };
        let closed = bracket.release();

        let table = outcome?;
        closed.map_err(|source| Error::DataUnreachable { context: "auto-disconnect", source })?;
        Ok(Fetch::Rows(table))
    }
}

/// Closes the connection on the way out when policy asks for it, including
/// on unwind.
struct Bracket<'a> {
    connection: MutexGuard<'a, Box<dyn DbConnection>>,
    disconnect: bool,
}

impl Bracket<'_> {
    fn release(mut self) -> Result<(), CollaboratorError> {
        self.close()
    }

    fn close(&mut self) -> Result<(), CollaboratorError> {
        if !std::mem::take(&mut self.disconnect) {
            return Ok(());
        }
        tracing::debug!("auto-disconnecting");
        self.connection.close()
    }
}

impl Drop for Bracket<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "auto-disconnect failed during unwind");
        }
    }
}
