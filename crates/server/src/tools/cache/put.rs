//! cache_put tool implementation.
//!
//! Stores an arbitrary JSON value under a lookup key.

use dblookup_core::{Error, Payload};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::{SharedManager, json_result, with_manager};

/// Parameters for the cache_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutParams {
    /// The lookup key to store under.
    pub key: String,

    /// The value to cache.
    pub value: serde_json::Value,
}

/// Output from the cache_put tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePutOutput {
    pub key: String,
    pub stored: bool,
}

/// Implementation of the cache_put tool.
pub async fn put_impl(manager: &SharedManager, params: CachePutParams) -> Result<CallToolResult, McpError> {
    if params.key.is_empty() {
        return Err(Error::InvalidInput("key cannot be empty".into()).into());
    }

    let CachePutParams { key, value } = params;
    let stored_key = key.clone();
    with_manager(manager, move |m| m.insert_cache_only(stored_key, Payload::Value(value))).await?;

    json_result(&CachePutOutput { key, stored: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{manager, output};
    use dblookup_core::{DataSource, Policies};
    use serde_json::json;

    #[tokio::test]
    async fn test_put_impl_stores_value() {
        let manager = manager(Policies::standard());
        let params = CachePutParams { key: "k".into(), value: json!([1, 2, 3]) };

        let result: CachePutOutput = output(&put_impl(&manager, params).await.unwrap());
        assert!(result.stored);

        let cached = manager.lock().unwrap().lookup_cache_only("k").unwrap();
        assert_eq!(cached.source(), DataSource::Cache);
        assert_eq!(cached.into_payload(), Some(Payload::Value(json!([1, 2, 3]))));
    }

    #[tokio::test]
    async fn test_put_impl_serves_later_lookups() {
        let manager = manager(Policies::standard());
        let params = CachePutParams { key: "SELECT name FROM people".into(), value: json!("precomputed") };
        put_impl(&manager, params).await.unwrap();

        let result = manager.lock().unwrap().lookup("SELECT name FROM people").unwrap();
        assert_eq!(result.source(), DataSource::Cache);
    }

    #[tokio::test]
    async fn test_put_impl_empty_key() {
        let manager = manager(Policies::standard());
        let params = CachePutParams { key: String::new(), value: json!(null) };

        let err = put_impl(&manager, params).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_put_impl_not_allowed() {
        let manager = manager(Policies::locked());
        let params = CachePutParams { key: "k".into(), value: json!(1) };

        let err = put_impl(&manager, params).await.unwrap_err();
        assert_eq!(err.code.0, -32001);
    }
}
