//! Error types for the resolution engine
//!
//! Loader and initializer failures are carried through unchanged; the engine
//! itself only raises contract and configuration errors.

use std::sync::Arc;
use thiserror::Error;

use crate::schema::TypeKey;

/// Result type alias for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while registering dependencies or resolving a request.
///
/// The type is `Clone` because a pending loader call can be awaited by
/// several fan-out branches at once, and each of them receives the outcome.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// A relation produced filter arguments although the level had no source instances
    #[error("Contract violation on relation '{relation}' of '{type_key}': filter is not empty but the source is absent")]
    ContractViolation { type_key: TypeKey, relation: String },

    /// A loader or initializer failed
    #[error("Upstream failure: {0}")]
    Upstream(Arc<anyhow::Error>),

    /// Invalid relation or registry configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A JSON value used as an entity was not an object
    #[error("Invalid entity: expected a JSON object, got {found}")]
    InvalidEntity { found: String },

    /// A type key that has no registered dependency node
    #[error("Unknown entity type: {0}")]
    UnknownType(TypeKey),
}

impl ResolveError {
    /// Build a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ResolveError::Configuration {
            message: message.into(),
        }
    }

    /// Wrap any upstream error
    pub fn upstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ResolveError::Upstream(Arc::new(anyhow::Error::new(err)))
    }

    /// Whether this error originated in a loader or initializer
    pub fn is_upstream(&self) -> bool {
        matches!(self, ResolveError::Upstream(_))
    }
}

impl From<anyhow::Error> for ResolveError {
    fn from(err: anyhow::Error) -> Self {
        ResolveError::Upstream(Arc::new(err))
    }
}
