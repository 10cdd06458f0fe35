//! Handler and policy registry.

use crate::error::{DispatchError, DispatchResult};
use crate::job::Job;
use crate::policy::TimeoutPolicy;
use crate::scope::Scope;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::Span;

/// Future returned by a job handler.
pub type HandlerFuture = BoxFuture<'static, DispatchResult<()>>;

/// Job handler function type.
///
/// Receives the attempt-scoped [`Scope`], the job, and the attempt's span to
/// log through.
pub type JobHandler = Arc<dyn Fn(Scope, Job, Span) -> HandlerFuture + Send + Sync>;

/// Box a closure into a [`JobHandler`].
pub fn handler_fn<F, Fut>(handler: F) -> JobHandler
where
    F: Fn(Scope, Job, Span) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DispatchResult<()>> + Send + 'static,
{
    Arc::new(move |scope: Scope, job: Job, span: Span| -> HandlerFuture {
        Box::pin(handler(scope, job, span))
    })
}

/// Handler and policy bound to one job type.
#[derive(Clone)]
pub(crate) struct Route {
    pub(crate) handler: JobHandler,
    pub(crate) policy: TimeoutPolicy,
}

/// Mapping from job type to its route. Written during setup only.
#[derive(Default, Clone)]
pub(crate) struct Registry {
    routes: HashMap<String, Route>,
}

impl Registry {
    pub(crate) fn insert(
        &mut self,
        job_type: String,
        handler: JobHandler,
        policy: TimeoutPolicy,
    ) -> DispatchResult<()> {
        if self.routes.contains_key(&job_type) {
            return Err(DispatchError::DuplicateJobType(job_type));
        }
        self.routes.insert(job_type, Route { handler, policy });
        Ok(())
    }

    pub(crate) fn route(&self, job_type: &str) -> Option<&Route> {
        self.routes.get(job_type)
    }

    pub(crate) fn policy(&self, job_type: &str) -> Option<TimeoutPolicy> {
        self.routes.get(job_type).map(|route| route.policy)
    }

    pub(crate) fn len(&self) -> usize {
        self.routes.len()
    }

    pub(crate) fn job_types(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
