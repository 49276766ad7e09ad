//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use serde_json::json;

use crate::db::{ConnectionHandle, ConnectionState, DataTable, DbConnection, DbTransaction};
use crate::error::CollaboratorError;
use crate::lookup::{CacheOptions, LookupValue, MutableLookup, Query};

/// What a [`ScriptedConnection`] was asked to do.
#[derive(Debug, Default)]
pub struct ConnectionLog {
    pub opens: usize,
    pub closes: usize,
    pub executed: Vec<String>,
    /// Connection state observed at each execution.
    pub states_during_execute: Vec<ConnectionState>,
}

pub type SharedLog = Arc<Mutex<ConnectionLog>>;

/// A connection whose behavior is fixed up front.
///
/// Every command returns a one-row table echoing the command text unless a
/// response or failure has been scripted for it.
#[derive(Debug)]
pub struct ScriptedConnection {
    state: ConnectionState,
    state_after_open: ConnectionState,
    open_error: Option<String>,
    close_error: Option<String>,
    responses: HashMap<String, DataTable>,
    failures: HashMap<String, String>,
    log: SharedLog,
}

impl ScriptedConnection {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        let connection = Self {
            state: ConnectionState::Closed,
            state_after_open: ConnectionState::Open,
            open_error: None,
            close_error: None,
            responses: HashMap::new(),
            failures: HashMap::new(),
            log: log.clone(),
        };
        (connection, log)
    }

    pub fn opened(mut self) -> Self {
        self.state = ConnectionState::Open;
        self
    }

    pub fn in_state(mut self, state: ConnectionState) -> Self {
        self.state = state;
        self
    }

    /// Report `state` after an open that claims success.
    pub fn reporting_after_open(mut self, state: ConnectionState) -> Self {
        self.state_after_open = state;
        self
    }

    pub fn failing_open(mut self, message: &str) -> Self {
        self.open_error = Some(message.into());
        self
    }

    pub fn failing_close(mut self, message: &str) -> Self {
        self.close_error = Some(message.into());
        self
    }

    pub fn responding(mut self, command: &str, table: DataTable) -> Self {
        self.responses.insert(command.into(), table);
        self
    }

    pub fn failing_command(mut self, command: &str, message: &str) -> Self {
        self.failures.insert(command.into(), message.into());
        self
    }

    pub fn into_handle(self) -> ConnectionHandle {
        ConnectionHandle::new(self)
    }
}

impl DbConnection for ScriptedConnection {
    fn state(&self) -> ConnectionState {
        self.state
    }

    fn open(&mut self) -> Result<(), CollaboratorError> {
        self.log.lock().unwrap().opens += 1;
        if let Some(message) = &self.open_error {
            return Err(message.clone().into());
        }
        self.state = self.state_after_open;
        Ok(())
    }

    fn close(&mut self) -> Result<(), CollaboratorError> {
        self.log.lock().unwrap().closes += 1;
        if let Some(message) = &self.close_error {
            return Err(message.clone().into());
        }
        self.state = ConnectionState::Closed;
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn DbTransaction + '_>, CollaboratorError> {
        Ok(Box::new(ScriptedTransaction { connection: self }))
    }
}

struct ScriptedTransaction<'a> {
    connection: &'a mut ScriptedConnection,
}

impl DbTransaction for ScriptedTransaction<'_> {
    fn execute_reader(&mut self, command_text: &str) -> Result<DataTable, CollaboratorError> {
        let connection = &*self.connection;
        {
            let mut log = connection.log.lock().unwrap();
            log.executed.push(command_text.into());
            log.states_during_execute.push(connection.state);
        }
        if let Some(message) = connection.failures.get(command_text) {
            return Err(message.clone().into());
        }
        Ok(connection.responses.get(command_text).cloned().unwrap_or_else(|| echo_table(command_text)))
    }

    fn commit(self: Box<Self>) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// The default response of a [`ScriptedConnection`].
pub fn echo_table(command_text: &str) -> DataTable {
    let mut table = DataTable::new(vec!["command".into()]);
    table.push_row(vec![json!(command_text)]);
    table
}

/// A closed scripted connection behind a handle.
pub fn scripted_handle() -> (ConnectionHandle, SharedLog) {
    let (connection, log) = ScriptedConnection::new();
    (connection.into_handle(), log)
}

/// An immutable external lookup comparing by key.
#[derive(Debug, Clone)]
pub struct KeyedLookup {
    key: Option<String>,
    cache: Option<CacheOptions>,
}

impl KeyedLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from), cache: None }
    }

    pub fn with_cache_options(mut self, options: CacheOptions) -> Self {
        self.cache = Some(options);
        self
    }
}

impl LookupValue for KeyedLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn cache_options(&self) -> Option<CacheOptions> {
        self.cache
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        None
    }
}

/// A mutable external lookup that honors both contracts. Its copies are
/// plain [`Query`] values.
#[derive(Debug)]
pub struct WellBehavedLookup {
    key: Mutex<Option<String>>,
}

impl WellBehavedLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: Mutex::new(key.map(String::from)) }
    }

    pub fn set_key(&self, key: Option<&str>) {
        *self.key.lock().unwrap() = key.map(String::from);
    }
}

impl LookupValue for WellBehavedLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.lock().unwrap().clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key_copy() == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for WellBehavedLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(Query::new(self.key_copy().as_deref()))
    }
}

/// Returns itself from `immutable_copy`.
#[derive(Debug)]
pub struct SelfCopyLookup {
    key: Option<String>,
    me: Weak<SelfCopyLookup>,
}

impl SelfCopyLookup {
    pub fn new(key: Option<&str>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self { key: key.map(String::from), me: me.clone() })
    }
}

impl LookupValue for SelfCopyLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for SelfCopyLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        self.me.upgrade().expect("self-copy lookup dropped while in use")
    }
}

/// Returns another mutable value from `immutable_copy`.
#[derive(Debug)]
pub struct MutableCopyLookup {
    key: Option<String>,
}

impl MutableCopyLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for MutableCopyLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for MutableCopyLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(MutableCopyLookup { key: self.key.clone() })
    }
}

/// Equal only to itself, while its copy compares by key.
#[derive(Debug)]
pub struct AsymmetricLookup {
    key: Option<String>,
}

impl AsymmetricLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for AsymmetricLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        same_address(self, other)
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for AsymmetricLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(KeyedLookup::new(self.key.as_deref()))
    }
}

fn same_address<T>(this: &T, other: &dyn LookupValue) -> bool {
    std::ptr::addr_eq(this as *const T, other as *const dyn LookupValue)
}

/// Returns itself from `immutable_copy` and reports no mutable capability.
#[derive(Debug)]
pub struct UndeclaredSelfCopyLookup {
    key: Option<String>,
    me: Weak<UndeclaredSelfCopyLookup>,
}

impl UndeclaredSelfCopyLookup {
    pub fn new(key: Option<&str>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self { key: key.map(String::from), me: me.clone() })
    }
}

impl LookupValue for UndeclaredSelfCopyLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        None
    }
}

impl MutableLookup for UndeclaredSelfCopyLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        self.me.upgrade().expect("self-copy lookup dropped while in use")
    }
}

/// Immutable and never equal to anything, itself included.
#[derive(Debug)]
pub struct UnequalLookup {
    key: Option<String>,
}

impl UnequalLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for UnequalLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, _other: &dyn LookupValue) -> bool {
        false
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        None
    }
}

/// Mutable, never equal to itself. Its copy compares by key.
#[derive(Debug)]
pub struct SelfUnequalLookup {
    key: Option<String>,
}

impl SelfUnequalLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for SelfUnequalLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, _other: &dyn LookupValue) -> bool {
        false
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for SelfUnequalLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(KeyedLookup::new(self.key.as_deref()))
    }
}

/// Compares by key, but its copy is an [`UnequalLookup`].
#[derive(Debug)]
pub struct UnequalCopyLookup {
    key: Option<String>,
}

impl UnequalCopyLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for UnequalCopyLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        self.key == other.key_copy()
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for UnequalCopyLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(UnequalLookup::new(self.key.as_deref()))
    }
}

/// Immutable and equal only to itself.
#[derive(Debug)]
pub struct IdentityLookup {
    key: Option<String>,
}

impl LookupValue for IdentityLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        same_address(self, other)
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        None
    }
}

/// Equal only to itself, with an [`IdentityLookup`] copy, so neither side
/// equals the other.
#[derive(Debug)]
pub struct DisjointCopyLookup {
    key: Option<String>,
}

impl DisjointCopyLookup {
    pub fn new(key: Option<&str>) -> Self {
        Self { key: key.map(String::from) }
    }
}

impl LookupValue for DisjointCopyLookup {
    fn key_copy(&self) -> Option<String> {
        self.key.clone()
    }

    fn lookup_eq(&self, other: &dyn LookupValue) -> bool {
        same_address(self, other)
    }

    fn as_mutable(&self) -> Option<&dyn MutableLookup> {
        Some(self)
    }
}

impl MutableLookup for DisjointCopyLookup {
    fn immutable_copy(&self) -> Arc<dyn LookupValue> {
        Arc::new(IdentityLookup { key: self.key.clone() })
    }
}
