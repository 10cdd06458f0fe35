//! Dispatcher counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Jobs accepted into the queue
    pub accepted: u64,
    /// Jobs dropped because the queue was full
    pub rejected_full: u64,
    /// Jobs rejected because the dispatcher was stopped
    pub rejected_stopped: u64,
    /// Jobs whose handler eventually succeeded
    pub succeeded: u64,
    /// Jobs abandoned after failure, timeout, cancellation or panic
    pub failed: u64,
    /// Handler panics contained
    pub panicked: u64,
    /// Retry attempts started
    pub retries: u64,
}

impl DispatcherStats {
    /// Jobs that never reached a worker.
    pub fn rejected(&self) -> u64 {
        self.rejected_full + self.rejected_stopped
    }

    /// Jobs that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    accepted: AtomicU64,
    rejected_full: AtomicU64,
    rejected_stopped: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    retries: AtomicU64,
}

impl Counters {
    pub(crate) fn accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rejected_stopped(&self) {
        self.rejected_stopped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn retried(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            rejected_stopped: self.rejected_stopped.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}
