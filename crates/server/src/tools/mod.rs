//! MCP tool implementations.
//!
//! This module contains all tools exposed by the dblookup server. The core
//! library is blocking, so every manager call runs on the blocking pool with
//! the manager held behind a mutex.

use std::sync::{Arc, Mutex};

use dblookup_core::{CacheDbLookupManager, Error};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

pub mod cache;
pub mod lookup;
pub mod status;

pub use cache::{CacheGetParams, CachePutParams};
pub use lookup::LookupParams;

/// The lookup manager shared by all tool calls.
pub type SharedManager = Arc<Mutex<CacheDbLookupManager>>;

/// Run `f` against the manager on the blocking pool.
pub(crate) async fn with_manager<T, F>(manager: &SharedManager, f: F) -> Result<T, McpError>
where
    T: Send + 'static,
    F: FnOnce(&mut CacheDbLookupManager) -> Result<T, Error> + Send + 'static,
{
    let manager = Arc::clone(manager);
    let outcome = tokio::task::spawn_blocking(move || {
        let mut guard = manager.lock().map_err(|_| Error::UnexpectedBehavior("lookup manager lock poisoned".into()))?;
        f(&mut guard)
    })
    .await
    .map_err(|e| McpError::internal_error(format!("lookup task failed: {e}"), None))?;

    Ok(outcome?)
}

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(Error::from)?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
