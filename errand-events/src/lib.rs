//! Publish facade for the Errand dispatcher.
//!
//! Request handlers hand side-effect work to the dispatcher through an
//! [`EventBus`]: the payload is serialized to JSON, tagged with the request's
//! trace id, and offered to the queue without blocking.
//!
//! ## Features
//!
//! - **Fire-and-forget** - `publish` returns only whether the job was accepted
//! - **Trace propagation** - the caller's trace id travels with the job
//! - **Fail fast** - a cancelled caller context publishes nothing
//! - **Detached publish** - [`publish_with_timeout`] outlives the caller's
//!   cancellation and logs `bus.publish_failed` on loss
//!
//! ## Quick Start
//!
//! ```
//! use errand_dispatch::{Dispatcher, TimeoutPolicy};
//! use errand_events::{EventBus, RequestContext, publish_with_timeout};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let mut dispatcher = Dispatcher::new(256);
//! dispatcher.register(
//!     "PutVersion",
//!     |_scope, _job, _span| async { Ok(()) },
//!     TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1)),
//! );
//! dispatcher.start(4).unwrap();
//!
//! let dispatcher = Arc::new(dispatcher);
//! let bus = EventBus::new(dispatcher.clone());
//! let ctx = RequestContext::new().with_trace_id("req-1");
//!
//! let payload = serde_json::json!({ "uid": 7, "tokenVersion": 3 });
//! publish_with_timeout(
//!     &bus,
//!     &ctx,
//!     "PutVersion",
//!     &payload,
//!     Duration::from_secs(1),
//!     &[("uid", "7".to_string())],
//! );
//!
//! dispatcher.stop().await;
//! # });
//! ```

pub mod bus;
pub mod context;
pub mod error;

pub use bus::{EventBus, publish_with_timeout};
pub use context::RequestContext;
pub use error::{PublishError, PublishResult};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::bus::{EventBus, publish_with_timeout};
    pub use crate::context::RequestContext;
    pub use crate::error::{PublishError, PublishResult};
}
