//! Process lifecycle.
//!
//! ```no_run
//! use errand::{Dispatcher, run_until_shutdown, shutdown_signal};
//!
//! # async fn example() -> Result<(), errand::DispatchError> {
//! let dispatcher = Dispatcher::new(256);
//! dispatcher.start(4)?;
//!
//! // Blocks until Ctrl-C or SIGTERM, then stops the workers.
//! run_until_shutdown(&dispatcher, shutdown_signal()).await;
//! # Ok(())
//! # }
//! ```

use errand_dispatch::Dispatcher;
use std::future::Future;
use tracing::{info, warn};

/// Resolve on Ctrl-C, or on SIGTERM on unix.
///
/// A signal that cannot be installed is logged and never fires; if neither
/// can be installed the future stays pending.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown"),
            Err(e) => {
                warn!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, starting graceful shutdown");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Wait for `signal`, then stop `dispatcher` and wait for its workers.
///
/// Jobs still queued when the signal fires are dropped; in-flight handlers
/// have their scopes cancelled.
pub async fn run_until_shutdown<F>(dispatcher: &Dispatcher, signal: F)
where
    F: Future<Output = ()>,
{
    info!(
        workers = dispatcher.worker_count(),
        job_types = ?dispatcher.job_types(),
        "dispatcher running, waiting for shutdown signal"
    );

    signal.await;

    let queued = dispatcher.queue_len();
    if queued > 0 {
        warn!(queued, "shutting down with queued jobs, they will not run");
    }

    dispatcher.stop().await;

    let stats = dispatcher.stats();
    info!(
        accepted = stats.accepted,
        succeeded = stats.succeeded,
        failed = stats.failed,
        rejected = stats.rejected(),
        "shutdown complete"
    );
}
