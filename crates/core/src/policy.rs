//! Lookup, connection and cache policies.
//!
//! Policies are plain values handed to a manager at construction. Named
//! presets cover the common combinations; there is no process-wide default
//! that can change underneath a running manager.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Whether a manager accepts lookups at all.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LookupPolicy: u8 {
        const ALLOW_LOOKUP = 0b0000_0001;
    }
}

bitflags! {
    /// Connection automation around a single database resolution.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ConnectionPolicy: u8 {
        /// Open a disconnected connection before executing.
        const AUTO_CONNECT = 0b0000_0001;
        /// Close the connection after every resolution.
        const AUTO_DISCONNECT_ALL = 0b0000_0010;
        /// Close the connection only if this resolution opened it.
        const AUTO_DISCONNECT_WHEN_AUTOCONNECTED = 0b0000_0100;
        /// Reserved. Resolutions under this flag fail with `NotYetSupported`.
        const AUTO_REFRESH = 0b0000_1000;
    }
}

bitflags! {
    /// Cache ordering and access to the cache-only entry points.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct CachePolicy: u8 {
        /// Consult the cache before the database.
        const PREFER_CACHE = 0b0000_0001;
        /// Allow `insert_cache_only` and friends.
        const ALLOW_CUSTOM_CACHE_INSERT = 0b0000_0010;
        /// Allow `lookup_cache_only` and friends.
        const ALLOW_CUSTOM_CACHE_LOOKUP = 0b0000_0100;
    }
}

impl LookupPolicy {
    pub const DEFAULT: Self = Self::ALLOW_LOOKUP;
}

impl ConnectionPolicy {
    pub const DEFAULT: Self = Self::AUTO_CONNECT.union(Self::AUTO_DISCONNECT_WHEN_AUTOCONNECTED);
}

impl CachePolicy {
    pub const DEFAULT: Self =
        Self::PREFER_CACHE.union(Self::ALLOW_CUSTOM_CACHE_INSERT).union(Self::ALLOW_CUSTOM_CACHE_LOOKUP);
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// The three policy sets a manager is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Policies {
    pub lookup: LookupPolicy,
    pub connection: ConnectionPolicy,
    pub cache: CachePolicy,
}

impl Policies {
    /// Cache-first, auto-connect, disconnect only what was auto-connected.
    pub const fn standard() -> Self {
        Self { lookup: LookupPolicy::DEFAULT, connection: ConnectionPolicy::DEFAULT, cache: CachePolicy::DEFAULT }
    }

    /// Like [`Policies::standard`] but the database is consulted first.
    pub const fn database_first() -> Self {
        Self {
            cache: CachePolicy::ALLOW_CUSTOM_CACHE_INSERT.union(CachePolicy::ALLOW_CUSTOM_CACHE_LOOKUP),
            ..Self::standard()
        }
    }

    /// The caller opens and closes the connection; lookups never auto-connect.
    pub const fn manual_connection() -> Self {
        Self { connection: ConnectionPolicy::empty(), ..Self::standard() }
    }

    /// Connect on demand and close after every resolution.
    pub const fn always_disconnect() -> Self {
        Self {
            connection: ConnectionPolicy::AUTO_CONNECT.union(ConnectionPolicy::AUTO_DISCONNECT_ALL),
            ..Self::standard()
        }
    }

    /// No lookups and no cache-only access.
    pub const fn locked() -> Self {
        Self { lookup: LookupPolicy::empty(), connection: ConnectionPolicy::DEFAULT, cache: CachePolicy::PREFER_CACHE }
    }

    pub fn with_lookup(mut self, lookup: LookupPolicy) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn with_connection(mut self, connection: ConnectionPolicy) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }
}

/// Named policy presets, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyPreset {
    #[default]
    Standard,
    DatabaseFirst,
    ManualConnection,
    AlwaysDisconnect,
    Locked,
}

impl PolicyPreset {
    pub fn policies(self) -> Policies {
        match self {
            PolicyPreset::Standard => Policies::standard(),
            PolicyPreset::DatabaseFirst => Policies::database_first(),
            PolicyPreset::ManualConnection => Policies::manual_connection(),
            PolicyPreset::AlwaysDisconnect => Policies::always_disconnect(),
            PolicyPreset::Locked => Policies::locked(),
        }
    }
}

impl From<PolicyPreset> for Policies {
    fn from(preset: PolicyPreset) -> Self {
        preset.policies()
    }
}
