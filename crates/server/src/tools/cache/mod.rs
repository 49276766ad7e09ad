//! Cache-only MCP tools.
//!
//! These read and write the cache store directly; the database is never
//! consulted. Both are gated by the cache policy.

pub mod get;
pub mod put;

pub use get::{CacheGetParams, get_impl};
pub use put::{CachePutParams, put_impl};
