//! Worker loop and the attempt/retry procedure.

use crate::error::{DispatchError, DispatchResult};
use crate::job::Job;
use crate::registry::{Registry, Route};
use crate::scope::Scope;
use crate::stats::Counters;
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{Instrument, Span, debug, error, info, info_span};

/// Shared receiving end of the bounded queue.
pub(crate) type SharedReceiver = Arc<Mutex<mpsc::Receiver<Job>>>;

/// One worker loop: `waiting` -> `running-job` -> `waiting` ... -> `exited`.
pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) registry: Arc<Registry>,
    pub(crate) receiver: SharedReceiver,
    pub(crate) root: Scope,
    pub(crate) counters: Arc<Counters>,
    pub(crate) span: Span,
}

impl Worker {
    pub(crate) async fn run(self) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.root.token().cancelled() => {
                    info!(parent: &self.span, worker_id = self.id, "worker exit");
                    return;
                }
                job = self.recv() => job,
            };

            let Some(job) = next else {
                info!(parent: &self.span, worker_id = self.id, "job queue closed, worker exit");
                return;
            };

            self.process(job).await;
        }
    }

    async fn recv(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }

    async fn process(&self, job: Job) {
        let span = info_span!(
            parent: &self.span,
            "job",
            job_type = %job.job_type,
            trace_id = %job.trace_id,
            worker_id = self.id
        );

        match self.execute(job, &span).await {
            Ok(done) => {
                self.counters.succeeded();
                debug!(parent: &span, retry = done.retry, "job completed");
            }
            Err(err) => {
                self.counters.failed();
                error!(parent: &span, error = %err, "handle failed");
            }
        }
    }

    /// Resolve the route, open the job scope, and run the panic-safe procedure.
    async fn execute(&self, job: Job, span: &Span) -> DispatchResult<Job> {
        let route = self
            .registry
            .route(&job.job_type)
            .ok_or_else(|| DispatchError::NoHandler(job.job_type.clone()))?;

        let scope = self.root.with_timeout(route.policy.job_timeout);
        let result = self.safe_handle(&scope, route, job, span).await;
        scope.cancel();
        result
    }

    async fn safe_handle(
        &self,
        scope: &Scope,
        route: &Route,
        job: Job,
        span: &Span,
    ) -> DispatchResult<Job> {
        let job_type = job.job_type.clone();
        let trace_id = job.trace_id.clone();

        match AssertUnwindSafe(handle(scope, route, job, span, &self.counters))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                let stack = Backtrace::force_capture();
                self.counters.panicked();
                error!(
                    parent: span,
                    panic = %message,
                    stack = %stack,
                    job_type = %job_type,
                    trace_id = %trace_id,
                    worker_id = self.id,
                    "handler panic"
                );
                Err(DispatchError::HandlerPanic(message))
            }
        }
    }
}

/// First attempt plus up to `max_retry` retries, bounded by the job scope.
///
/// Returns the job with its final retry count on success.
pub(crate) async fn handle(
    scope: &Scope,
    route: &Route,
    mut job: Job,
    span: &Span,
    counters: &Counters,
) -> DispatchResult<Job> {
    let policy = route.policy;
    let mut result = attempt(scope, route, &job, span).await;

    loop {
        let err = match &result {
            Ok(()) => break,
            Err(err) => err,
        };
        if job.retry >= policy.max_retry {
            break;
        }
        // Never retry past the job budget or after shutdown.
        if let Some(reason) = scope.err() {
            error!(parent: span, retry = job.retry, error = %reason, last_error = %err, "job context done, stop retrying");
            return Err(reason);
        }
        if !err.is_retryable() {
            error!(parent: span, retry = job.retry, error = %err, "job failed, error not retryable");
            return result.map(|()| job);
        }

        let delay = policy.backoff.delay_for_retry(job.retry);
        debug!(parent: span, retry = job.retry, delay = ?delay, error = %err, "attempt failed, backing off");

        tokio::select! {
            biased;
            reason = scope.done() => {
                error!(parent: span, retry = job.retry, error = %reason, "job context done during backoff");
                return Err(reason);
            }
            _ = tokio::time::sleep(delay) => {}
        }

        job.retry += 1;
        counters.retried();
        result = attempt(scope, route, &job, span).await;
    }

    match result {
        Ok(()) => Ok(job),
        Err(err) => {
            error!(parent: span, retry = job.retry, error = %err, "job exceeded retries");
            Err(err)
        }
    }
}

/// One handler invocation under a fresh attempt scope.
async fn attempt(scope: &Scope, route: &Route, job: &Job, span: &Span) -> DispatchResult<()> {
    let attempt_scope = scope.with_timeout(route.policy.attempt_timeout);
    let attempt_span = info_span!(parent: span, "attempt", retry = job.retry);

    let fut = (route.handler)(attempt_scope.clone(), job.clone(), attempt_span.clone());
    let result = attempt_scope.run(fut.instrument(attempt_span)).await;
    attempt_scope.cancel();
    result
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
