//! lookup tool implementation.
//!
//! Resolves a key through the cache and the database according to the
//! configured policies.

use dblookup_core::{CacheOptions, DataSource, Error, Payload};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{SharedManager, json_result, with_manager};

/// Parameters for the lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LookupParams {
    /// The lookup key, run as SQL command text on a database hit.
    pub key: String,

    /// Skip the cache read and go straight to the database.
    #[serde(default)]
    pub bypass_cache: bool,

    /// Do not store a database hit in the cache.
    #[serde(default)]
    pub suppress_cache_write: bool,
}

/// Output from the lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LookupOutput {
    pub key: String,
    /// Where the payload came from; `none` when nothing was found.
    pub source: DataSource,
    pub payload: Option<Payload>,
}

/// Implementation of the lookup tool.
pub async fn lookup_impl(manager: &SharedManager, params: LookupParams) -> Result<CallToolResult, McpError> {
    if params.key.trim().is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let options = CacheOptions::new(params.bypass_cache, params.suppress_cache_write);
    let key = params.key.clone();
    let result = with_manager(manager, move |m| m.lookup_with(key, Some(options))).await?;
    tracing::debug!(source = ?result.source(), "lookup resolved");

    json_result(&LookupOutput { key: params.key, source: result.source(), payload: result.into_payload() })
}
