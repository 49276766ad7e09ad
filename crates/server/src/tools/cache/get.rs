//! cache_get tool implementation.
//!
//! Retrieves a cached payload by lookup key.

use dblookup_core::{DataSource, Error, Payload};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{SharedManager, json_result, with_manager};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// The lookup key of the cached entry.
    pub key: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub key: String,
    /// Whether a live entry was found.
    pub found: bool,
    pub payload: Option<Payload>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(manager: &SharedManager, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.key.is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let key = params.key.clone();
    let result = with_manager(manager, move |m| m.lookup_cache_only(key)).await?;
    let found = result.source() == DataSource::Cache;

    json_result(&CacheGetOutput { key: params.key, found, payload: result.into_payload() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::cache::put::{CachePutParams, put_impl};
    use crate::tools::test_support::{manager, output};
    use dblookup_core::{ConnectionState, Policies};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_impl_missing() {
        let manager = manager(Policies::standard());
        let params = CacheGetParams { key: "nonexistent".to_string() };

        let result: CacheGetOutput = output(&get_impl(&manager, params).await.unwrap());
        assert!(!result.found);
        assert!(result.payload.is_none());
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let manager = manager(Policies::standard());
        let put = CachePutParams { key: "settings:theme".into(), value: json!({"theme": "dark"}) };
        put_impl(&manager, put).await.unwrap();

        let params = CacheGetParams { key: "settings:theme".into() };
        let result: CacheGetOutput = output(&get_impl(&manager, params).await.unwrap());
        assert!(result.found);
        assert_eq!(result.payload, Some(Payload::Value(json!({"theme": "dark"}))));
    }

    #[tokio::test]
    async fn test_get_impl_never_touches_database() {
        let manager = manager(Policies::standard());
        let params = CacheGetParams { key: "SELECT name FROM people".into() };

        let result: CacheGetOutput = output(&get_impl(&manager, params).await.unwrap());
        assert!(!result.found);

        let manager = manager.lock().unwrap();
        assert_eq!(manager.db().connection_state(), ConnectionState::Closed);
        // Nothing was fetched into the cache, so the first real lookup still hits the database.
        let looked_up = manager.lookup("SELECT name FROM people").unwrap();
        assert_eq!(looked_up.source(), DataSource::Database);
    }

    #[tokio::test]
    async fn test_get_impl_not_allowed() {
        let manager = manager(Policies::locked());
        let params = CacheGetParams { key: "k".into() };

        let err = get_impl(&manager, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
