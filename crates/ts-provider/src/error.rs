//! Provider error types.

use thiserror::Error;
use ts_model::ResourceKind;

/// Errors reported by a provider while provisioning resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{kind} '{id}' already exists")]
    Conflict { kind: ResourceKind, id: String },

    #[error("{operation} failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },

    #[error("packaging error: {0}")]
    Packaging(String),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for provider results.
pub type ProviderResult<T> = Result<T, ProviderError>;
