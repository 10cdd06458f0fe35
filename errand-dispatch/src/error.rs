//! Error types for dispatcher operations.

use thiserror::Error;

/// Result type for dispatcher and handler operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Dispatcher-specific errors.
///
/// Handlers return these as well, so the retry procedure can tell a
/// cancellation apart from a deadline or an ordinary failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No handler registered for job type
    #[error("no handler for job type: {0}")]
    NoHandler(String),

    /// Job type registered twice
    #[error("duplicate job handler: {0}")]
    DuplicateJobType(String),

    /// Registration attempted after workers were started
    #[error("job registry is frozen, cannot register: {0}")]
    RegistryFrozen(String),

    /// Workers already started
    #[error("dispatcher already started")]
    AlreadyStarted,

    /// Dispatcher has been stopped
    #[error("dispatcher stopped")]
    Stopped,

    /// Handler panicked
    #[error("handler panic: {0}")]
    HandlerPanic(String),

    /// Scope was cancelled
    #[error("context canceled")]
    Cancelled,

    /// Scope deadline passed
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Handler reported a failure
    #[error("job execution failed: {0}")]
    Failed(String),

    /// Payload could not be decoded
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl DispatchError {
    /// Build a [`DispatchError::Failed`] from anything displayable.
    pub fn failed(err: impl std::fmt::Display) -> Self {
        Self::Failed(err.to_string())
    }

    /// Pure cancellation (not a deadline).
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }

    /// Either form of "context done".
    pub fn is_context_done(&self) -> bool {
        self.is_cancelled() || self.is_deadline_exceeded()
    }

    /// Whether the retry procedure may run another attempt after this error.
    ///
    /// Routing and configuration errors never succeed on a second try, nor
    /// does decoding the same payload again. Cancellation is never retried. Attempt-level deadlines are retryable;
    /// the job-level deadline is checked separately by the caller.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NoHandler(_)
                | Self::DuplicateJobType(_)
                | Self::RegistryFrozen(_)
                | Self::AlreadyStarted
                | Self::Stopped
                | Self::Cancelled
                | Self::Payload(_)
        )
    }
}
