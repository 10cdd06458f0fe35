//! Event Bus implementation

use crate::context::RequestContext;
use crate::error::{PublishError, PublishResult};
use errand_dispatch::{Dispatcher, Job};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Publish facade over a [`Dispatcher`].
///
/// Serializes the payload to JSON, stamps the caller's trace id on the job and
/// offers it to the dispatcher queue. Never blocks and never retries.
#[derive(Clone)]
pub struct EventBus {
    dispatcher: Arc<Dispatcher>,
}

impl EventBus {
    /// Create new event bus
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Publish and report why the job was not accepted.
    pub fn try_publish<T>(&self, ctx: &RequestContext, job_type: &str, payload: &T) -> PublishResult<()>
    where
        T: Serialize + ?Sized,
    {
        if ctx.is_done() {
            return Err(PublishError::ContextDone);
        }

        let bytes = serde_json::to_vec(payload)?;
        let job = Job::new(job_type, bytes).with_trace_id(ctx.trace_id());

        if self.dispatcher.enqueue(job) {
            Ok(())
        } else {
            Err(PublishError::Rejected(job_type.to_string()))
        }
    }

    /// Fire-and-forget publish.
    ///
    /// Returns whether the job was accepted into the queue. A `false` is
    /// best-effort loss; callers should not retry.
    ///
    /// # Examples
    ///
    /// ```
    /// use errand_dispatch::Dispatcher;
    /// use errand_events::{EventBus, RequestContext};
    /// use std::sync::Arc;
    ///
    /// let bus = EventBus::new(Arc::new(Dispatcher::new(8)));
    /// let ctx = RequestContext::new().with_trace_id("req-1");
    ///
    /// assert!(bus.publish(&ctx, "DeleteCOS", &serde_json::json!({ "key": "a.png" })));
    /// ```
    pub fn publish<T>(&self, ctx: &RequestContext, job_type: &str, payload: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        match self.try_publish(ctx, job_type, payload) {
            Ok(()) => true,
            Err(PublishError::ContextDone) => {
                debug!(parent: ctx.span(), job_type, trace_id = ctx.trace_id(), "caller context done, skip publish");
                false
            }
            Err(PublishError::Serialize(err)) => {
                warn!(
                    parent: ctx.span(),
                    job_type,
                    trace_id = ctx.trace_id(),
                    error = %err,
                    "publish payload marshal error"
                );
                false
            }
            // The dispatcher has already logged the drop.
            Err(PublishError::Rejected(_)) => false,
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Publish on a context detached from the caller's cancellation.
///
/// The job keeps the caller's trace id and span but gets its own `timeout`, so
/// a request that is already finishing can still hand off its side effects. On
/// failure logs `bus.publish_failed` with the topic and `fields`.
pub fn publish_with_timeout<T>(
    bus: &EventBus,
    ctx: &RequestContext,
    job_type: &str,
    payload: &T,
    timeout: Duration,
    fields: &[(&'static str, String)],
) -> bool
where
    T: Serialize + ?Sized,
{
    let publish_ctx = ctx.detached(timeout);
    let ok = bus.publish(&publish_ctx, job_type, payload);
    publish_ctx.cancel();

    if !ok {
        warn!(
            parent: ctx.span(),
            topic = job_type,
            trace_id = ctx.trace_id(),
            fields = %Fields(fields),
            "bus.publish_failed"
        );
    }
    ok
}

struct Fields<'a>(&'a [(&'static str, String)]);

impl fmt::Display for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
