//! Error types for job collaborators.

use errand_dispatch::DispatchError;
use thiserror::Error;

/// Result type for collaborator calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure reported by a storage or cache backend.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Backend rejected or failed the operation
    #[error("backend error: {0}")]
    Backend(String),

    /// Value could not be encoded for storage
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Collaborator failures are retryable job failures.
impl From<ServiceError> for DispatchError {
    fn from(err: ServiceError) -> Self {
        DispatchError::failed(err)
    }
}
