//! Unified error types for dblookup.
//!
//! Every failure the lookup layer can raise is one variant of [`Error`].
//! Callers match on the tag rather than on a type hierarchy.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

use crate::verify::VerificationFlags;

/// A fault raised by an external collaborator (connection, command, provider).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for the lookup layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A lookup with no key reached an operation that needs one.
    #[error("NULL_KEY: {operation} requires a non-null key")]
    NullKey { operation: &'static str },

    /// The manager's lookup policy prohibits lookups.
    #[error("LOOKUP_NOT_PERMITTED: policy prohibits lookup operation")]
    LookupNotPermitted,

    /// Cache-only reads are disabled by the cache policy.
    #[error("CACHE_LOOKUP_NOT_ALLOWED: policy prohibits custom cache lookups")]
    CacheLookupNotAllowed,

    /// Cache-only inserts are disabled by the cache policy.
    #[error("CACHE_INSERT_NOT_ALLOWED: policy prohibits custom cache inserts")]
    CacheInsertNotAllowed,

    /// An externally defined mutable lookup broke the copy/equality contract.
    #[error("VERIFICATION_FAILED: custom mutable lookup failed integrity checks ({0:?})")]
    CustomTypeFailedVerification(VerificationFlags),

    /// The connection collaborator failed while connecting or disconnecting.
    #[error("DATA_UNREACHABLE: {context}: {source}")]
    DataUnreachable {
        context: &'static str,
        #[source]
        source: CollaboratorError,
    },

    /// The connection collaborator reported a state it cannot be in.
    #[error("UNEXPECTED_BEHAVIOR: {0}")]
    UnexpectedBehavior(String),

    /// A code path that only handles internally defined collaborators was reached.
    #[error("NOT_YET_SUPPORTED: {0}")]
    NotYetSupported(String),

    /// The connection provider failed to produce a connection.
    #[error("INVALID_CONNECTION_PROVIDER: {0}")]
    InvalidConnectionProvider(#[source] CollaboratorError),

    /// A connection swap was requested on a manager built without a provider.
    #[error("MISSING_CONNECTION_PROVIDER: manager was built from a single connection")]
    MissingConnectionProvider,

    /// The command collaborator failed while executing a query.
    #[error("EXECUTION_FAILED: {0}")]
    ExecutionFailed(#[source] CollaboratorError),

    /// The cache store could not be reached.
    #[error("CACHE_UNAVAILABLE: {0}")]
    CacheUnavailable(String),

    /// SQLite operation failed inside a cache store.
    #[error("CACHE_ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A payload could not be encoded or decoded.
    #[error("SERIALIZATION_ERROR: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether the caller can recover by changing policy or call pattern.
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Error::LookupNotPermitted | Error::CacheLookupNotAllowed | Error::CacheInsertNotAllowed)
    }

    /// Verification flags carried by a verification failure.
    pub fn verification_flags(&self) -> Option<VerificationFlags> {
        match self {
            Error::CustomTypeFailedVerification(flags) => Some(*flags),
            _ => None,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::NullKey { .. } => -32602,
            Error::LookupNotPermitted | Error::CacheLookupNotAllowed | Error::CacheInsertNotAllowed => -32001,
            Error::CustomTypeFailedVerification(_) => -32002,
            Error::DataUnreachable { .. } | Error::InvalidConnectionProvider(_) | Error::MissingConnectionProvider => {
                -32003
            }
            Error::UnexpectedBehavior(_) => -32004,
            Error::NotYetSupported(_) => -32005,
            Error::ExecutionFailed(_) => -32006,
            Error::CacheUnavailable(_)
            | Error::Database(_)
            | Error::MigrationFailed(_)
            | Error::Serialization(_) => -32007,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NullKey { operation: "cache get" };
        assert!(err.to_string().contains("NULL_KEY"));
        assert!(err.to_string().contains("cache get"));
    }

    #[test]
    fn test_policy_violation_kinds() {
        assert!(Error::LookupNotPermitted.is_policy_violation());
        assert!(Error::CacheInsertNotAllowed.is_policy_violation());
        assert!(!Error::UnexpectedBehavior("broken".into()).is_policy_violation());
    }

    #[test]
    fn test_verification_flags_carried() {
        let flags = VerificationFlags::TESTED_RTT | VerificationFlags::ERR_COPY_REFERENCEEQUALS_ORIGINAL;
        let err = Error::CustomTypeFailedVerification(flags);
        assert_eq!(err.verification_flags(), Some(flags));
        assert!(Error::LookupNotPermitted.verification_flags().is_none());
    }

    #[test]
    fn test_error_to_mcp_error() {
        let mcp_err: McpError = Error::CacheLookupNotAllowed.into();
        assert_eq!(mcp_err.code.0, -32001);

        let mcp_err: McpError = Error::NotYetSupported("auto-refresh".into()).into();
        assert_eq!(mcp_err.code.0, -32005);
    }

    #[test]
    fn test_data_unreachable_keeps_source() {
        let err = Error::DataUnreachable { context: "auto-connect", source: "socket closed".into() };
        assert!(err.to_string().contains("auto-connect"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
