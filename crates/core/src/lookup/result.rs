//! Resolution results and their provenance.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Query;
use crate::db::DataTable;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Cache,
    Database,
    None,
}

/// A resolved value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// Rows loaded from the database.
    Table(DataTable),
    /// A value inserted directly into the cache.
    Value(serde_json::Value),
}

impl Payload {
    pub fn as_table(&self) -> Option<&DataTable> {
        match self {
            Payload::Table(table) => Some(table),
            Payload::Value(_) => None,
        }
    }
}

impl From<DataTable> for Payload {
    fn from(table: DataTable) -> Self {
        Payload::Table(table)
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

/// The outcome of one resolution.
///
/// A result carries a payload exactly when its source is not
/// [`DataSource::None`].
#[derive(Debug, Clone)]
pub struct LookupResult {
    query: Query,
    payload: Option<Payload>,
    source: DataSource,
}

impl LookupResult {
    pub(crate) fn from_cache(query: Query, payload: Payload) -> Self {
        Self { query, payload: Some(payload), source: DataSource::Cache }
    }

    pub(crate) fn from_database(query: Query, payload: Payload) -> Self {
        Self { query, payload: Some(payload), source: DataSource::Database }
    }

    pub(crate) fn failure(query: Query) -> Self {
        Self { query, payload: None, source: DataSource::None }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn is_success(&self) -> bool {
        self.source != DataSource::None
    }

    pub fn into_payload(self) -> Option<Payload> {
        self.payload
    }
}
