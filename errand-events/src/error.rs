//! Error types for publishing.

use thiserror::Error;

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

/// Why a publish was not accepted.
///
/// [`EventBus::publish`](crate::EventBus::publish) collapses these into a
/// `bool`; use [`EventBus::try_publish`](crate::EventBus::try_publish) to
/// inspect them.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Caller context was cancelled or past its deadline
    #[error("caller context is done")]
    ContextDone,

    /// Payload could not be encoded
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Dispatcher refused the job (queue full or stopped)
    #[error("job rejected by dispatcher: {0}")]
    Rejected(String),
}

impl PublishError {
    pub fn is_context_done(&self) -> bool {
        matches!(self, Self::ContextDone)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
