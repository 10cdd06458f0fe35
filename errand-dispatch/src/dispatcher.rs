//! Bounded queue, registries, and worker pool lifecycle.

use crate::error::{DispatchError, DispatchResult};
use crate::job::Job;
use crate::policy::TimeoutPolicy;
use crate::registry::{JobHandler, Registry, handler_fn};
use crate::scope::Scope;
use crate::stats::{Counters, DispatcherStats};
use crate::worker::{SharedReceiver, Worker};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;
use tracing::{Span, error, info, warn};

/// In-process job dispatcher.
///
/// Lifecycle: [`new`](Self::new) → [`register`](Self::register) for every job
/// type → [`start`](Self::start) → share (usually behind an `Arc`) and
/// [`enqueue`](Self::enqueue) → [`stop`](Self::stop).
///
/// Delivery is best effort: a full queue or a stopped dispatcher drops the job
/// and `enqueue` returns `false`. Jobs still queued at `stop` are never run.
pub struct Dispatcher {
    registry: Arc<Registry>,
    sender: mpsc::Sender<Job>,
    receiver: SharedReceiver,
    capacity: usize,
    root: Scope,
    tracker: TaskTracker,
    started: AtomicBool,
    counters: Arc<Counters>,
    span: Span,
}

impl Dispatcher {
    /// Create a dispatcher whose queue holds up to `capacity` jobs.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            warn!("job queue capacity must be at least 1, using 1");
            1
        } else {
            capacity
        };
        let (sender, receiver) = mpsc::channel(capacity);

        Self {
            registry: Arc::new(Registry::default()),
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            capacity,
            root: Scope::new(),
            tracker: TaskTracker::new(),
            started: AtomicBool::new(false),
            counters: Arc::new(Counters::default()),
            span: Span::current(),
        }
    }

    /// Log through `span` instead of the span current at construction.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Bind a handler and policy to a job type.
    ///
    /// # Panics
    ///
    /// Panics if `job_type` is already registered or the workers have been
    /// started. Both are startup configuration mistakes.
    ///
    /// # Examples
    ///
    /// ```
    /// use errand_dispatch::{Dispatcher, TimeoutPolicy};
    /// use std::time::Duration;
    ///
    /// let mut dispatcher = Dispatcher::new(16);
    /// dispatcher.register(
    ///     "PutVersion",
    ///     |_scope, job, _span| async move {
    ///         println!("refreshing token version: {:?}", job.payload);
    ///         Ok(())
    ///     },
    ///     TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1)),
    /// );
    /// assert!(dispatcher.is_registered("PutVersion"));
    /// ```
    pub fn register<F, Fut>(&mut self, job_type: impl Into<String>, handler: F, policy: TimeoutPolicy)
    where
        F: Fn(Scope, Job, Span) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<()>> + Send + 'static,
    {
        if let Err(err) = self.try_register(job_type, handler_fn(handler), policy) {
            panic!("{err}");
        }
    }

    /// Non-panicking form of [`register`](Self::register).
    pub fn try_register(
        &mut self,
        job_type: impl Into<String>,
        handler: JobHandler,
        policy: TimeoutPolicy,
    ) -> DispatchResult<()> {
        let job_type = job_type.into();
        if self.started.load(Ordering::Acquire) {
            return Err(DispatchError::RegistryFrozen(job_type));
        }
        if !policy.is_consistent() {
            warn!(
                parent: &self.span,
                job_type = %job_type,
                job_timeout = ?policy.job_timeout,
                attempt_timeout = ?policy.attempt_timeout,
                "attempt timeout exceeds job timeout, job timeout dominates"
            );
        }

        let Some(registry) = Arc::get_mut(&mut self.registry) else {
            return Err(DispatchError::RegistryFrozen(job_type));
        };
        registry.insert(job_type, handler, policy)
    }

    /// Launch `workers` worker loops.
    pub fn start(&self, workers: usize) -> DispatchResult<()> {
        if self.root.is_cancelled() {
            return Err(DispatchError::Stopped);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DispatchError::AlreadyStarted);
        }

        info!(
            parent: &self.span,
            workers,
            capacity = self.capacity,
            job_types = self.registry.len(),
            "starting dispatcher"
        );

        for id in 0..workers {
            let worker = Worker {
                id,
                registry: self.registry.clone(),
                receiver: self.receiver.clone(),
                root: self.root.clone(),
                counters: self.counters.clone(),
                span: self.span.clone(),
            };
            self.tracker.spawn(worker.run());
        }

        Ok(())
    }

    /// Offer a job to the queue without blocking.
    ///
    /// Returns `false` if the dispatcher is stopped or the queue is full. The
    /// job is then dropped; the only trace is a log line and the counters.
    pub fn enqueue(&self, job: Job) -> bool {
        if self.root.is_cancelled() {
            self.counters.rejected_stopped();
            error!(
                parent: &self.span,
                job_type = %job.job_type,
                trace_id = %job.trace_id,
                "dispatcher stopped, reject job"
            );
            return false;
        }

        match self.sender.try_send(job) {
            Ok(()) => {
                self.counters.accepted();
                true
            }
            Err(TrySendError::Full(job)) => {
                self.counters.rejected_full();
                error!(
                    parent: &self.span,
                    job_type = %job.job_type,
                    trace_id = %job.trace_id,
                    "job queue full, drop job"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                self.counters.rejected_stopped();
                error!(
                    parent: &self.span,
                    job_type = %job.job_type,
                    trace_id = %job.trace_id,
                    "job queue closed, reject job"
                );
                false
            }
        }
    }

    /// Signal shutdown and wait until every worker has exited.
    ///
    /// In-flight handlers see their scopes cancelled; queued jobs are not
    /// drained. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        if !self.root.is_cancelled() {
            info!(parent: &self.span, workers = self.tracker.len(), "stopping dispatcher");
        }
        self.root.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        info!(parent: &self.span, "dispatcher stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_registered(&self, job_type: &str) -> bool {
        self.registry.route(job_type).is_some()
    }

    /// Policy bound to `job_type`.
    pub fn policy(&self, job_type: &str) -> Option<TimeoutPolicy> {
        self.registry.policy(job_type)
    }

    /// Registered job types, in no particular order.
    pub fn job_types(&self) -> Vec<String> {
        self.registry.job_types().map(str::to_owned).collect()
    }

    /// Queue capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Jobs currently waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    /// Worker loops still running.
    pub fn worker_count(&self) -> usize {
        self.tracker.len()
    }

    /// Counter snapshot.
    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("capacity", &self.capacity)
            .field("job_types", &self.registry.len())
            .field("workers", &self.tracker.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> TimeoutPolicy {
        TimeoutPolicy::new(Duration::from_secs(1), Duration::from_millis(200))
    }

    #[test]
    fn test_dispatcher_creation() {
        let dispatcher = Dispatcher::new(8);

        assert_eq!(dispatcher.capacity(), 8);
        assert_eq!(dispatcher.queue_len(), 0);
        assert!(!dispatcher.is_started());
        assert!(!dispatcher.is_stopped());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let dispatcher = Dispatcher::new(0);
        assert_eq!(dispatcher.capacity(), 1);
    }

    #[test]
    #[should_panic(expected = "duplicate job handler: PutVersion")]
    fn test_duplicate_register_panics() {
        let mut dispatcher = Dispatcher::new(8);
        dispatcher.register("PutVersion", |_s, _j, _l| async { Ok(()) }, policy());
        dispatcher.register("PutVersion", |_s, _j, _l| async { Ok(()) }, policy());
    }

    #[test]
    fn test_try_register_duplicate_keeps_original() {
        let mut dispatcher = Dispatcher::new(8);
        dispatcher.register("PutVersion", |_s, _j, _l| async { Ok(()) }, policy());

        let result = dispatcher.try_register(
            "PutVersion",
            handler_fn(|_s, _j, _l| async { Ok(()) }),
            policy().with_max_retry(7),
        );

        assert!(matches!(result, Err(DispatchError::DuplicateJobType(_))));
        assert_eq!(dispatcher.policy("PutVersion"), Some(policy()));
    }

    #[test]
    fn test_inverted_policy_is_registered_with_warning() {
        let inverted = TimeoutPolicy::new(Duration::from_millis(100), Duration::from_secs(1));
        let mut dispatcher = Dispatcher::new(8).with_span(tracing::info_span!("dispatcher"));

        let result = dispatcher.try_register("Slow", handler_fn(|_s, _j, _l| async { Ok(()) }), inverted);

        assert!(result.is_ok());
        assert_eq!(dispatcher.policy("Slow"), Some(inverted));
    }

    #[tokio::test]
    async fn test_register_after_start_is_rejected() {
        let mut dispatcher = Dispatcher::new(8);
        dispatcher.start(1).unwrap();

        let result =
            dispatcher.try_register("Late", handler_fn(|_s, _j, _l| async { Ok(()) }), policy());
        assert!(matches!(result, Err(DispatchError::RegistryFrozen(_))));

        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice() {
        let dispatcher = Dispatcher::new(8);
        dispatcher.start(2).unwrap();

        assert!(matches!(dispatcher.start(2), Err(DispatchError::AlreadyStarted)));
        assert_eq!(dispatcher.worker_count(), 2);

        dispatcher.stop().await;
        assert_eq!(dispatcher.worker_count(), 0);
        assert!(matches!(dispatcher.start(1), Err(DispatchError::Stopped)));
    }

    #[test]
    fn test_enqueue_full_queue() {
        let dispatcher = Dispatcher::new(1);

        assert!(dispatcher.enqueue(Job::new("X", Vec::new())));
        assert!(!dispatcher.enqueue(Job::new("X", Vec::new())));
        assert_eq!(dispatcher.queue_len(), 1);

        let stats = dispatcher.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected_full, 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_stop() {
        let dispatcher = Dispatcher::new(4);
        dispatcher.start(1).unwrap();
        dispatcher.stop().await;

        assert!(!dispatcher.enqueue(Job::new("X", Vec::new())));
        assert_eq!(dispatcher.stats().rejected_stopped, 1);
        assert_eq!(dispatcher.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let dispatcher = Dispatcher::new(4);
        dispatcher.start(3).unwrap();

        dispatcher.stop().await;
        dispatcher.stop().await;

        assert!(dispatcher.is_stopped());
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let dispatcher = Dispatcher::new(4);
        dispatcher.stop().await;

        assert!(dispatcher.is_stopped());
    }

    #[tokio::test]
    async fn test_workers_exit_when_dispatcher_dropped() {
        let dispatcher = Dispatcher::new(4);
        dispatcher.start(2).unwrap();
        let tracker = dispatcher.tracker.clone();

        drop(dispatcher);
        tracker.close();

        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("workers should exit once the queue closes");
    }
}
