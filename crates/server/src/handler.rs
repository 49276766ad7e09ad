//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::{Arc, Mutex};

use dblookup_core::CacheDbLookupManager;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

use crate::tools::{self, CacheGetParams, CachePutParams, LookupParams, SharedManager};

/// The main MCP server handler for dblookup.
#[derive(Clone)]
pub struct LookupServer {
    manager: SharedManager,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl LookupServer {
    /// Create a new server handler around `manager`.
    pub fn new(manager: CacheDbLookupManager) -> Self {
        Self { manager: Arc::new(Mutex::new(manager)), tool_router: Self::tool_router() }
    }

    /// Resolve a key through the cache and the database.
    #[tool(
        description = "Look up a key. Serves from the cache or runs the key as SQL against the database, \
                       per the configured policies. Returns the data source and payload."
    )]
    async fn lookup(&self, params: Parameters<LookupParams>) -> Result<CallToolResult, McpError> {
        tools::lookup::lookup_impl(&self.manager, params.0).await
    }

    /// Read a cache entry without touching the database.
    #[tool(description = "Read a cached payload by lookup key without touching the database.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        tools::cache::get_impl(&self.manager, params.0).await
    }

    /// Write a cache entry without touching the database.
    #[tool(description = "Store a JSON value in the cache under a lookup key.")]
    async fn cache_put(&self, params: Parameters<CachePutParams>) -> Result<CallToolResult, McpError> {
        tools::cache::put_impl(&self.manager, params.0).await
    }

    #[tool(description = "Report the database connection state and the active lookup, connection and cache policies.")]
    async fn connection_status(&self) -> Result<CallToolResult, McpError> {
        tools::status::status_impl(&self.manager).await
    }
}

impl ServerHandler for LookupServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "dblookup".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
