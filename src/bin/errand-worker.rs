// Standalone dispatcher process backed by the in-memory store.
//
// Usage: errand-worker [config file]

use errand::errand_config::load_settings;
use errand::errand_jobs::{InMemoryBackend, JobServices};
use errand::setup::build_dispatcher;
use errand::{run_until_shutdown, shutdown_signal};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    errand::errand_log::init();

    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let settings = load_settings(path.as_deref())?;

    let backend = Arc::new(InMemoryBackend::new());
    let dispatcher = build_dispatcher(&settings, JobServices::from_backend(backend))?;
    dispatcher.start(settings.workers)?;

    run_until_shutdown(&dispatcher, shutdown_signal()).await;
    Ok(())
}
