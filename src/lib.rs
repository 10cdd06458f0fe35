// Errand - bounded in-process job dispatcher
//
// Request handlers publish side-effect work (cache writes, blob deletion,
// credential refresh) onto the dispatcher and return immediately; a fixed
// worker pool runs it under per-type timeouts and retries.

// Re-export core functionality
pub use errand_dispatch::*;
pub use errand_events::*;

pub mod shutdown;

pub use shutdown::{run_until_shutdown, shutdown_signal};

#[cfg(all(feature = "config", feature = "jobs"))]
pub mod setup;

// Re-export optional crates
#[cfg(feature = "config")]
pub use errand_config;

#[cfg(feature = "log")]
pub use errand_log;

#[cfg(feature = "jobs")]
pub use errand_jobs;

/// Prelude module for convenient imports
pub mod prelude {
    pub use errand_dispatch::prelude::*;
    pub use errand_events::prelude::*;

    pub use crate::shutdown::{run_until_shutdown, shutdown_signal};

    #[cfg(feature = "config")]
    pub use errand_config::{ConfigManager, DispatcherSettings, load_settings};

    #[cfg(feature = "jobs")]
    pub use errand_jobs::{JobPolicies, JobServices, register_jobs, register_jobs_with};

    #[cfg(all(feature = "config", feature = "jobs"))]
    pub use crate::setup::build_dispatcher;

    pub use tokio;
    pub use tracing;
}
