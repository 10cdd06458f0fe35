//! Application jobs run by the Errand dispatcher.
//!
//! | Job type                  | Handler                                  | Job / attempt timeout |
//! |---------------------------|------------------------------------------|-----------------------|
//! | `DeleteCOS`               | [`handlers::delete_object`]              | 25 s / 5 s            |
//! | `UpdateAvatar`            | [`handlers::update_avatar_key`]          | 5 s / 1 s             |
//! | `PutAvatar`               | [`handlers::update_avatar_key`]          | 5 s / 1 s             |
//! | `PutVersion`              | [`handlers::put_token_version`]          | 5 s / 1 s             |
//! | `PutProjectsSummaryCache` | [`handlers::put_projects_summary`]       | 5 s / 1 s             |
//!
//! ## Quick Start
//!
//! ```
//! use errand_dispatch::Dispatcher;
//! use errand_jobs::{InMemoryBackend, JobServices, register_jobs};
//! use std::sync::Arc;
//!
//! let mut dispatcher = Dispatcher::new(256);
//! let services = JobServices::from_backend(Arc::new(InMemoryBackend::new()));
//!
//! register_jobs(&mut dispatcher, services).unwrap();
//! assert!(dispatcher.is_registered("PutVersion"));
//! ```

pub mod error;
pub mod handlers;
pub mod memory;
pub mod payloads;
pub mod services;

pub use error::{ServiceError, ServiceResult};
pub use memory::InMemoryBackend;
pub use payloads::*;
pub use services::*;

use errand_dispatch::{DispatchResult, Dispatcher, TimeoutPolicy};
use std::collections::HashMap;
use std::time::Duration;

pub const DELETE_COS: &str = "DeleteCOS";
pub const UPDATE_AVATAR: &str = "UpdateAvatar";
pub const PUT_AVATAR: &str = "PutAvatar";
pub const PUT_VERSION: &str = "PutVersion";
pub const PUT_PROJECTS_SUMMARY_CACHE: &str = "PutProjectsSummaryCache";

/// Every job type this crate registers.
pub const JOB_TYPES: [&str; 5] = [
    DELETE_COS,
    UPDATE_AVATAR,
    PUT_AVATAR,
    PUT_VERSION,
    PUT_PROJECTS_SUMMARY_CACHE,
];

/// Timeout policy per job type.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPolicies {
    policies: HashMap<String, TimeoutPolicy>,
}

impl JobPolicies {
    /// Policy for `job_type`, if it is one of [`JOB_TYPES`] or was set.
    pub fn get(&self, job_type: &str) -> Option<TimeoutPolicy> {
        self.policies.get(job_type).copied()
    }

    pub fn set(&mut self, job_type: impl Into<String>, policy: TimeoutPolicy) {
        self.policies.insert(job_type.into(), policy);
    }

    /// Every job type with its policy, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TimeoutPolicy)> + '_ {
        self.policies
            .iter()
            .map(|(job_type, policy)| (job_type.as_str(), *policy))
    }

    /// Override several policies at once, e.g. from configuration.
    pub fn with_overrides<I, S>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (S, TimeoutPolicy)>,
        S: Into<String>,
    {
        for (job_type, policy) in overrides {
            self.set(job_type, policy);
        }
        self
    }
}

impl Default for JobPolicies {
    fn default() -> Self {
        let short = short_policy();
        let policies = [
            (DELETE_COS, TimeoutPolicy::new(Duration::from_secs(25), Duration::from_secs(5))),
            (UPDATE_AVATAR, short),
            (PUT_AVATAR, short),
            (PUT_VERSION, short),
            (PUT_PROJECTS_SUMMARY_CACHE, short),
        ];

        Self {
            policies: policies
                .into_iter()
                .map(|(job_type, policy)| (job_type.to_string(), policy))
                .collect(),
        }
    }
}

fn short_policy() -> TimeoutPolicy {
    TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1))
}

/// Register every job type with its default policy.
pub fn register_jobs(dispatcher: &mut Dispatcher, services: JobServices) -> DispatchResult<()> {
    register_jobs_with(dispatcher, services, &JobPolicies::default())
}

/// Register every job type, taking policies from `policies`.
pub fn register_jobs_with(
    dispatcher: &mut Dispatcher,
    services: JobServices,
    policies: &JobPolicies,
) -> DispatchResult<()> {
    let policy = |job_type: &str| policies.get(job_type).unwrap_or_else(short_policy);

    let objects = services.objects.clone();
    dispatcher.try_register(
        DELETE_COS,
        errand_dispatch::handler_fn(move |scope, job, span| handlers::delete_object(objects.clone(), scope, job, span)),
        policy(DELETE_COS),
    )?;

    for job_type in [UPDATE_AVATAR, PUT_AVATAR] {
        let avatars = services.avatars.clone();
        dispatcher.try_register(
            job_type,
            errand_dispatch::handler_fn(move |scope, job, span| {
                handlers::update_avatar_key(avatars.clone(), scope, job, span)
            }),
            policy(job_type),
        )?;
    }

    let versions = services.versions.clone();
    dispatcher.try_register(
        PUT_VERSION,
        errand_dispatch::handler_fn(move |scope, job, span| {
            handlers::put_token_version(versions.clone(), scope, job, span)
        }),
        policy(PUT_VERSION),
    )?;

    let JobServices { projects, outcomes, .. } = services;
    dispatcher.try_register(
        PUT_PROJECTS_SUMMARY_CACHE,
        errand_dispatch::handler_fn(move |scope, job, span| {
            handlers::put_projects_summary(projects.clone(), outcomes.clone(), scope, job, span)
        }),
        policy(PUT_PROJECTS_SUMMARY_CACHE),
    )?;

    Ok(())
}
