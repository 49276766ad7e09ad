//! Database side of a lookup.
//!
//! The physical connection is an external collaborator described by
//! [`DbConnection`]. A manager owns one [`ConnectionHandle`] at a time and
//! drives it through the [`DatabaseResolver`].

pub mod manager;
pub mod resolver;
pub mod sqlite;
pub mod table;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use manager::{ConnectionChange, ConnectionEvent, DbLookupManager};
pub use resolver::{DatabaseResolver, QueryExecutor, TransactionalExecutor};
pub use sqlite::SqliteConnection;
pub use table::DataTable;

use crate::Error;
use crate::error::CollaboratorError;

/// State reported by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Closed,
    Open,
    Connecting,
    Executing,
    Fetching,
    Broken,
}

/// A physical database connection.
pub trait DbConnection: Send {
    fn state(&self) -> ConnectionState;

    fn open(&mut self) -> Result<(), CollaboratorError>;

    fn close(&mut self) -> Result<(), CollaboratorError>;

    fn begin_transaction(&mut self) -> Result<Box<dyn DbTransaction + '_>, CollaboratorError>;
}

/// A transaction on a [`DbConnection`]. Dropping it without committing
/// rolls it back.
pub trait DbTransaction {
    /// Run `command_text` and load every row it yields.
    fn execute_reader(&mut self, command_text: &str) -> Result<DataTable, CollaboratorError>;

    fn commit(self: Box<Self>) -> Result<(), CollaboratorError>;
}

/// Shared reference to one connection.
///
/// Handles compare by identity: two handles are equal only when they point
/// at the same connection.
#[derive(Clone)]
pub struct ConnectionHandle(Arc<Mutex<Box<dyn DbConnection>>>);

impl ConnectionHandle {
    pub fn new(connection: impl DbConnection + 'static) -> Self {
        Self::from_boxed(Box::new(connection))
    }

    pub fn from_boxed(connection: Box<dyn DbConnection>) -> Self {
        Self(Arc::new(Mutex::new(connection)))
    }

    /// Current state. A poisoned lock reads as [`ConnectionState::Broken`].
    pub fn state(&self) -> ConnectionState {
        match self.0.lock() {
            Ok(connection) => connection.state(),
            Err(_) => ConnectionState::Broken,
        }
    }

    /// Open the connection by hand, for managers that do not auto-connect.
    pub fn open(&self) -> Result<(), Error> {
        self.lock()?.open().map_err(|source| Error::DataUnreachable { context: "connect", source })
    }

    /// Close the connection by hand.
    pub fn close(&self) -> Result<(), Error> {
        self.lock()?.close().map_err(|source| Error::DataUnreachable { context: "disconnect", source })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Box<dyn DbConnection>>, Error> {
        self.0.lock().map_err(|_| Error::UnexpectedBehavior("connection lock poisoned".into()))
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ConnectionHandle {}

impl Hash for ConnectionHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionHandle({:#x})", self.addr())
    }
}

/// Produces fresh connections for a manager.
pub trait ConnectionProvider: Send + Sync {
    fn connect(&self) -> Result<Box<dyn DbConnection>, CollaboratorError>;
}

impl<F> ConnectionProvider for F
where
    F: Fn() -> Result<Box<dyn DbConnection>, CollaboratorError> + Send + Sync,
{
    fn connect(&self) -> Result<Box<dyn DbConnection>, CollaboratorError> {
        self()
    }
}
