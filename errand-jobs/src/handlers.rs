//! Job handlers.
//!
//! A payload that cannot be decoded or fails validation is logged and treated
//! as done: retrying would not make it any better. Collaborator errors are
//! returned so the dispatcher retries them.

use crate::payloads::{AvatarKeyPayload, DeleteObjectPayload, ProjectSummaryPayload, TokenVersionPayload};
use crate::services::{
    AVATAR_KEY_TTL, AvatarCache, JOB_OUTCOME_TTL, JobOutcome, JobOutcomeStore, ObjectStore, PROJECT_LIST_TTL,
    ProjectListCache, TOKEN_VERSION_TTL, TokenVersionCache,
};
use errand_dispatch::{DispatchError, DispatchResult, Job, Scope};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Span, debug, error, warn};

/// Budget for a single blob-store or avatar-cache call inside an attempt.
pub const BACKEND_CALL_TIMEOUT: Duration = Duration::from_millis(300);

/// `DeleteCOS`: remove a blob from object storage.
pub async fn delete_object(store: Arc<dyn ObjectStore>, scope: Scope, job: Job, span: Span) -> DispatchResult<()> {
    let Some(payload) = decode::<DeleteObjectPayload>(&job, &span) else {
        return Ok(());
    };
    if let Err(reason) = payload.validate() {
        invalid(&job, &span, reason);
        return Ok(());
    }

    scope
        .with_timeout(BACKEND_CALL_TIMEOUT)
        .run(async { store.delete_object(&payload.key).await.map_err(DispatchError::from) })
        .await?;

    debug!(parent: &span, key = %payload.key, "object deleted");
    Ok(())
}

/// `UpdateAvatar` / `PutAvatar`: cache the user's avatar key.
pub async fn update_avatar_key(cache: Arc<dyn AvatarCache>, scope: Scope, job: Job, span: Span) -> DispatchResult<()> {
    let Some(payload) = decode::<AvatarKeyPayload>(&job, &span) else {
        return Ok(());
    };
    if let Err(reason) = payload.validate() {
        invalid(&job, &span, reason);
        return Ok(());
    }

    scope
        .with_timeout(BACKEND_CALL_TIMEOUT)
        .run(async {
            cache
                .set_avatar_key(payload.uid, &payload.avatar_key, AVATAR_KEY_TTL)
                .await
                .map_err(DispatchError::from)
        })
        .await
}

/// `PutVersion`: cache the user's login token version.
pub async fn put_token_version(
    cache: Arc<dyn TokenVersionCache>,
    _scope: Scope,
    job: Job,
    span: Span,
) -> DispatchResult<()> {
    let Some(payload) = decode::<TokenVersionPayload>(&job, &span) else {
        return Ok(());
    };
    if let Err(reason) = payload.validate() {
        invalid(&job, &span, reason);
        return Ok(());
    }

    cache
        .put_version(payload.uid, payload.token_version, TOKEN_VERSION_TTL)
        .await?;
    Ok(())
}

/// `PutProjectsSummaryCache`: cache one page of a project list, then record
/// whether that worked under the job's trace id.
pub async fn put_projects_summary(
    cache: Arc<dyn ProjectListCache>,
    outcomes: Arc<dyn JobOutcomeStore>,
    _scope: Scope,
    job: Job,
    span: Span,
) -> DispatchResult<()> {
    let Some(payload) = decode::<ProjectSummaryPayload>(&job, &span) else {
        return Ok(());
    };

    let result = cache
        .put_summary(&payload.cache_key(), &payload.cache_entry(), PROJECT_LIST_TTL)
        .await;

    let outcome = if result.is_ok() {
        JobOutcome::Ok
    } else {
        JobOutcome::Fail
    };
    let key = JobOutcome::key(&job.job_type, &job.trace_id);
    if let Err(err) = outcomes.record(&key, outcome, JOB_OUTCOME_TTL).await {
        warn!(parent: &span, key = %key, error = %err, "record job outcome failed");
    }

    result.map_err(DispatchError::from)
}

fn decode<T: DeserializeOwned>(job: &Job, span: &Span) -> Option<T> {
    match job.decode() {
        Ok(payload) => Some(payload),
        Err(err) => {
            error!(
                parent: span,
                job_type = %job.job_type,
                trace_id = %job.trace_id,
                error = %err,
                "payload unmarshal error"
            );
            None
        }
    }
}

fn invalid(job: &Job, span: &Span, reason: &str) {
    error!(
        parent: span,
        job_type = %job.job_type,
        trace_id = %job.trace_id,
        reason,
        "invalid payload, drop job"
    );
}
