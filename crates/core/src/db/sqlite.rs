//! SQLite implementation of the connection collaborator.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio_rusqlite::rusqlite::{self, OpenFlags, types::ValueRef};

use super::{ConnectionState, DataTable, DbConnection, DbTransaction};
use crate::error::CollaboratorError;

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Memory,
}

/// A SQLite database opened and closed on demand.
///
/// The connection starts closed. An in-memory database loses its contents
/// when closed; `init_sql` runs after every open to rebuild whatever it needs.
#[derive(Debug)]
pub struct SqliteConnection {
    target: Target,
    init_sql: Option<String>,
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { target: Target::File(path.as_ref().to_path_buf()), init_sql: None, conn: None }
    }

    pub fn in_memory() -> Self {
        Self { target: Target::Memory, init_sql: None, conn: None }
    }

    /// SQL batch to run after each open.
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }
}

impl DbConnection for SqliteConnection {
    fn state(&self) -> ConnectionState {
        match self.conn {
            Some(_) => ConnectionState::Open,
            None => ConnectionState::Closed,
        }
    }

    fn open(&mut self) -> Result<(), CollaboratorError> {
        if self.conn.is_some() {
            return Ok(());
        }

        let conn = match &self.target {
            Target::File(path) => rusqlite::Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
            Target::Memory => rusqlite::Connection::open_in_memory()?,
        };
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA temp_store=MEMORY;
             PRAGMA foreign_keys=ON;",
        )?;
        if let Some(sql) = &self.init_sql {
            conn.execute_batch(sql)?;
        }

        tracing::debug!(database = ?self.target, "sqlite connection opened");
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<(), CollaboratorError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| err)?;
            tracing::debug!(database = ?self.target, "sqlite connection closed");
        }
        Ok(())
    }

    fn begin_transaction(&mut self) -> Result<Box<dyn DbTransaction + '_>, CollaboratorError> {
        let conn = self.conn.as_mut().ok_or("sqlite connection is closed")?;
        Ok(Box::new(SqliteTransaction { tx: conn.transaction()? }))
    }
}

struct SqliteTransaction<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl DbTransaction for SqliteTransaction<'_> {
    fn execute_reader(&mut self, command_text: &str) -> Result<DataTable, CollaboratorError> {
        let mut stmt = self.tx.prepare(command_text)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut table = DataTable::new(columns);

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(to_json(row.get_ref(index)?));
            }
            table.push_row(values);
        }

        Ok(table)
    }

    fn commit(self: Box<Self>) -> Result<(), CollaboratorError> {
        let SqliteTransaction { tx } = *self;
        tx.commit()?;
        Ok(())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}
