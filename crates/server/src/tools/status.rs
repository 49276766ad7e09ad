//! connection_status tool implementation.
//!
//! Reports the connection state and the active policies.

use dblookup_core::ConnectionState;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{SharedManager, json_result, with_manager};

/// Output from the connection_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConnectionStatusOutput {
    pub state: ConnectionState,
    pub database_connected: bool,
    /// Set lookup policy flags by name.
    pub lookup_policy: Vec<String>,
    pub connection_policy: Vec<String>,
    pub cache_policy: Vec<String>,
}

/// Implementation of the connection_status tool.
pub async fn status_impl(manager: &SharedManager) -> Result<CallToolResult, McpError> {
    let output = with_manager(manager, |m| {
        let policies = m.policies();
        Ok(ConnectionStatusOutput {
            state: m.db().connection_state(),
            database_connected: m.db().database_connected(),
            lookup_policy: policies.lookup.iter_names().map(|(name, _)| name.to_string()).collect(),
            connection_policy: policies.connection.iter_names().map(|(name, _)| name.to_string()).collect(),
            cache_policy: policies.cache.iter_names().map(|(name, _)| name.to_string()).collect(),
        })
    })
    .await?;

    json_result(&output)
}
