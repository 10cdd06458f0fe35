//! Dispatcher assembly from configuration.

use errand_config::DispatcherSettings;
use errand_dispatch::{DispatchResult, Dispatcher};
use errand_jobs::{JobPolicies, JobServices, register_jobs_with};
use tracing::warn;

/// Build a dispatcher with every application job registered.
///
/// Policies configured in `settings` override the built-in ones field by field,
/// so an entry may set only a retry cap.
/// The dispatcher is not started; call `start(settings.workers)` once any
/// extra registrations are done.
pub fn build_dispatcher(settings: &DispatcherSettings, services: JobServices) -> DispatchResult<Dispatcher> {
    for warning in settings.warnings() {
        warn!("{}", warning);
    }

    let builtin = JobPolicies::default();
    let policies = builtin.clone().with_overrides(settings.timeout_policies(builtin.iter()));
    let mut dispatcher = Dispatcher::new(settings.queue_capacity);
    register_jobs_with(&mut dispatcher, services, &policies)?;

    Ok(dispatcher)
}
