//! Bounded in-process job dispatcher for Errand.
//!
//! Decouples request latency from side-effect work (cache population, blob
//! deletion, token-version propagation) with:
//! - 📦 A fixed-capacity FIFO queue with non-blocking, fire-and-forget enqueue
//! - 👷 A fixed worker pool sharing that queue
//! - ⏰ Per job-type budgets: whole job, single attempt, retry cap
//! - 🔄 Exponential backoff between attempts, cut short by the job deadline
//! - 🛡️ Panic containment: a panicking handler never takes a worker down
//! - 🛑 Fast shutdown: `stop` cancels in-flight work and waits for workers
//!
//! Nothing is persisted. Jobs dropped on a full queue, at shutdown, or after
//! exhausting retries are lost; the loss shows up in logs and
//! [`DispatcherStats`], never as an error to the publisher.
//!
//! ## Quick Start
//!
//! ```
//! use errand_dispatch::{Dispatcher, DispatchError, Job, TimeoutPolicy};
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut dispatcher = Dispatcher::new(256);
//!
//! dispatcher.register(
//!     "DeleteCOS",
//!     |scope, job, _span| async move {
//!         let key: String = job.decode()?;
//!         if scope.is_done() {
//!             return Err(DispatchError::Cancelled);
//!         }
//!         println!("deleting {key}");
//!         Ok(())
//!     },
//!     TimeoutPolicy::new(Duration::from_secs(25), Duration::from_secs(5)),
//! );
//!
//! dispatcher.start(4).unwrap();
//!
//! let job = Job::from_json("DeleteCOS", "avatars/old.png").unwrap();
//! assert!(dispatcher.enqueue(job));
//!
//! dispatcher.stop().await;
//! # });
//! ```
//!
//! ## Retry accounting
//!
//! The first execution is retry 0 and does not count toward
//! [`TimeoutPolicy::max_retry`]; a handler runs at most `max_retry + 1` times.
//! Before retry `k + 1` the worker waits `min(max, base * 2^k)`.

pub mod dispatcher;
pub mod error;
pub mod job;
pub mod policy;
pub mod registry;
pub mod scope;
pub mod stats;
mod worker;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use job::{Job, JobType};
pub use policy::{Backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRY, TimeoutPolicy};
pub use registry::{HandlerFuture, JobHandler, handler_fn};
pub use scope::Scope;
pub use stats::DispatcherStats;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{DispatchError, DispatchResult};
    pub use crate::job::Job;
    pub use crate::policy::{Backoff, TimeoutPolicy};
    pub use crate::scope::Scope;
}
