//! Core types and shared functionality for dblookup.
//!
//! This crate provides:
//! - Lookup keys (`Query`, `QueryBuilder`, external lookup types) and their verification
//! - Database resolution with connection policies
//! - Cache stores (memory and SQLite) and the cache-aware lookup manager
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod lookup;
pub mod orchestrator;
pub mod policy;
pub mod verify;

#[cfg(test)]
mod testing;

pub use cache::{CacheAdapter, CacheStore, Expiration, ExpirationMode, MemoryCacheStore, SqliteCacheStore};
pub use config::{AppConfig, CacheBackend, ConfigError};
pub use db::{
    ConnectionHandle, ConnectionProvider, ConnectionState, DataTable, DbConnection, DbLookupManager, DbTransaction,
    SqliteConnection,
};
pub use error::{CollaboratorError, Error};
pub use lookup::{
    CacheOptions, DataSource, Lookup, LookupResult, LookupValue, MutableLookup, Payload, Query, QueryBuilder,
};
pub use orchestrator::CacheDbLookupManager;
pub use policy::{CachePolicy, ConnectionPolicy, LookupPolicy, Policies, PolicyPreset};
pub use verify::VerificationFlags;
