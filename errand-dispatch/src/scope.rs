//! Nested cancellation and deadline scopes.
//!
//! A [`Scope`] pairs a [`CancellationToken`] with an optional deadline. Child
//! scopes inherit both: cancelling a parent cancels every child, and a child's
//! deadline is never later than its parent's. The dispatcher builds three
//! levels per job:
//!
//! ```text
//! root (until Dispatcher::stop)
//!  └─ job scope      (TimeoutPolicy::job_timeout, bounds all retries)
//!      └─ attempt    (TimeoutPolicy::attempt_timeout, one handler call)
//! ```
//!
//! ## Example
//!
//! ```
//! use errand_dispatch::Scope;
//! use std::time::Duration;
//!
//! let root = Scope::new();
//! let job = root.with_timeout(Duration::from_secs(5));
//! let attempt = job.with_timeout(Duration::from_secs(30));
//!
//! // The attempt can never outlive the job.
//! assert_eq!(attempt.deadline(), job.deadline());
//!
//! root.cancel();
//! assert!(attempt.err().unwrap().is_cancelled());
//! ```

use crate::error::DispatchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A cancellable scope with an optional deadline.
#[derive(Debug, Clone)]
pub struct Scope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Scope {
    /// Create a root scope: no deadline, cancelled only explicitly.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a child scope that expires after `timeout` (or at the parent's
    /// deadline, whichever comes first).
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        // An unrepresentable instant means "no deadline of our own".
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a child scope that expires at `deadline` (clamped to the
    /// parent's deadline).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) => parent.min(deadline),
            None => deadline,
        };

        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child scope sharing the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this scope and all of its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The instant at which this scope times out, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the scope is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Why the scope is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<DispatchError> {
        if self.token.is_cancelled() {
            return Some(DispatchError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DispatchError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Wait until the scope is done and return the reason.
    pub async fn done(&self) -> DispatchError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => DispatchError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => DispatchError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                DispatchError::Cancelled
            }
        }
    }

    /// Run `fut` bounded by this scope.
    ///
    /// The future is polled first on every wake-up, so a cooperative future
    /// that watches the scope itself gets to return its own result. A future
    /// that ignores the scope is dropped once the scope is done.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>>,
    {
        tokio::select! {
            biased;
            result = fut => result,
            reason = self.done() => Err(reason),
        }
    }

    /// Underlying token, for passing into APIs that take one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
