//! dblookup MCP server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use dblookup_core::{AppConfig, CacheDbLookupManager, ConnectionHandle, ConnectionPolicy, SqliteConnection};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let policies = config.policies();
    tracing::info!(
        database = %config.database_path.display(),
        cache_backend = ?config.cache_backend,
        policy = ?config.policy,
        "Starting dblookup server on stdio transport"
    );

    let store = config.open_cache_store()?;
    let connection = ConnectionHandle::new(SqliteConnection::new(&config.database_path));
    if !policies.connection.contains(ConnectionPolicy::AUTO_CONNECT) {
        connection.open()?;
        tracing::info!("opened database connection up front; policy disables auto-connect");
    }

    let handler = handler::LookupServer::new(CacheDbLookupManager::new(connection, store, policies));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
