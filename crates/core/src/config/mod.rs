//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DBLOOKUP_*)
//! 2. TOML config file (if DBLOOKUP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

use crate::Error;
use crate::cache::{CacheStore, Expiration, ExpirationMode, MemoryCacheStore, SqliteCacheStore};
use crate::policy::{Policies, PolicyPreset};

/// Which cache store backs the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DBLOOKUP_*)
/// 2. TOML config file (if DBLOOKUP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database the resolver runs lookups against.
    ///
    /// Set via DBLOOKUP_DATABASE_PATH environment variable.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Cache store backend.
    ///
    /// Set via DBLOOKUP_CACHE_BACKEND environment variable (`memory` or `sqlite`).
    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// Path to the SQLite cache store, used when `cache_backend` is `sqlite`.
    ///
    /// Set via DBLOOKUP_CACHE_DB_PATH environment variable.
    #[serde(default = "default_cache_db_path")]
    pub cache_db_path: PathBuf,

    /// Cache expiration mode.
    ///
    /// Set via DBLOOKUP_CACHE_EXPIRATION environment variable (`none`, `absolute`, `sliding`).
    #[serde(default)]
    pub cache_expiration: ExpirationMode,

    /// Time-to-live in seconds for the expiring modes.
    ///
    /// Set via DBLOOKUP_CACHE_TTL_SECS environment variable.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Named policy preset.
    ///
    /// Set via DBLOOKUP_POLICY environment variable.
    #[serde(default)]
    pub policy: PolicyPreset,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./dblookup.sqlite")
}

fn default_cache_db_path() -> PathBuf {
    PathBuf::from("./dblookup-cache.sqlite")
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            cache_backend: CacheBackend::default(),
            cache_db_path: default_cache_db_path(),
            cache_expiration: ExpirationMode::default(),
            cache_ttl_secs: default_cache_ttl_secs(),
            policy: PolicyPreset::default(),
        }
    }
}

impl AppConfig {
    /// Cache TTL as Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn expiration(&self) -> Expiration {
        Expiration { mode: self.cache_expiration, ttl: self.cache_ttl() }
    }

    pub fn policies(&self) -> Policies {
        self.policy.policies()
    }

    /// Open the configured cache store.
    ///
    /// # Errors
    ///
    /// Returns an error if the SQLite cache store cannot be opened or migrated.
    pub fn open_cache_store(&self) -> Result<Arc<dyn CacheStore>, Error> {
        Ok(match self.cache_backend {
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new(self.expiration())),
            CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(&self.cache_db_path, self.expiration())?),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DBLOOKUP_`
    /// 2. TOML file from `DBLOOKUP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("DBLOOKUP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DBLOOKUP_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
