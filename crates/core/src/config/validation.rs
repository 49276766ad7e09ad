//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::cache::ExpirationMode;
use crate::config::{AppConfig, CacheBackend};
use thiserror::Error;

/// Upper bound for cache TTL: 30 days.
const MAX_CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `database_path` is empty, and
    /// `ConfigError::Invalid` if an expiring cache has a TTL of 0 or more than 30 days.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                field: "database_path".into(),
                hint: "set DBLOOKUP_DATABASE_PATH".into(),
            });
        }

        if self.cache_expiration != ExpirationMode::None {
            if self.cache_ttl_secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "cache_ttl_secs".into(),
                    reason: "must be greater than 0 when cache entries expire".into(),
                });
            }
            if self.cache_ttl_secs > MAX_CACHE_TTL_SECS {
                return Err(ConfigError::Invalid {
                    field: "cache_ttl_secs".into(),
                    reason: format!("must not exceed 30 days ({MAX_CACHE_TTL_SECS}s)"),
                });
            }
        }

        if self.cache_backend == CacheBackend::Sqlite {
            if self.cache_db_path.as_os_str().is_empty() {
                return Err(ConfigError::Missing {
                    field: "cache_db_path".into(),
                    hint: "set DBLOOKUP_CACHE_DB_PATH or use the memory cache backend".into(),
                });
            }
            if self.cache_db_path == self.database_path {
                tracing::warn!(
                    path = %self.cache_db_path.display(),
                    "cache_db_path equals database_path; cache tables will share the lookup database"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_database_path() {
        let config = AppConfig { database_path: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "database_path"));
    }

    #[test]
    fn test_validate_zero_ttl_when_expiring() {
        let config = AppConfig { cache_expiration: ExpirationMode::Absolute, cache_ttl_secs: 0, ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_secs"));
    }

    #[test]
    fn test_validate_zero_ttl_without_expiration() {
        let config = AppConfig { cache_expiration: ExpirationMode::None, cache_ttl_secs: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ttl_exceeds_limit() {
        let config = AppConfig {
            cache_expiration: ExpirationMode::Sliding,
            cache_ttl_secs: MAX_CACHE_TTL_SECS + 1,
            ..Default::default()
        };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "cache_ttl_secs"));
    }

    #[test]
    fn test_validate_ttl_bounds() {
        for ttl in [1, MAX_CACHE_TTL_SECS] {
            let config =
                AppConfig { cache_expiration: ExpirationMode::Sliding, cache_ttl_secs: ttl, ..Default::default() };
            assert!(config.validate().is_ok());
        }
    }

    #[test]
    fn test_validate_empty_cache_db_path() {
        let config =
            AppConfig { cache_backend: CacheBackend::Sqlite, cache_db_path: PathBuf::new(), ..Default::default() };
        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::Missing { field, .. }) if field == "cache_db_path"));
    }

    #[test]
    fn test_validate_shared_database_path_is_allowed() {
        let config = AppConfig {
            cache_backend: CacheBackend::Sqlite,
            cache_db_path: PathBuf::from("./dblookup.sqlite"),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
