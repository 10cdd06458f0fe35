//! Collaborators the job handlers write to.

use crate::error::ServiceResult;
use crate::payloads::ProjectListEntry;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime of a cached avatar key.
pub const AVATAR_KEY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetime of a cached token version.
pub const TOKEN_VERSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetime of a cached project list page.
pub const PROJECT_LIST_TTL: Duration = Duration::from_secs(30);

/// Lifetime of a recorded job outcome.
pub const JOB_OUTCOME_TTL: Duration = Duration::from_secs(30 * 60);

/// Blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete the object stored under `key`. Deleting a missing object succeeds.
    async fn delete_object(&self, key: &str) -> ServiceResult<()>;
}

/// Cache of each user's current avatar key.
#[async_trait]
pub trait AvatarCache: Send + Sync {
    async fn set_avatar_key(&self, uid: i64, avatar_key: &str, ttl: Duration) -> ServiceResult<()>;
}

/// Cache of each user's current login token version.
#[async_trait]
pub trait TokenVersionCache: Send + Sync {
    async fn put_version(&self, uid: i64, token_version: i64, ttl: Duration) -> ServiceResult<()>;
}

/// Cache of project list pages.
#[async_trait]
pub trait ProjectListCache: Send + Sync {
    async fn put_summary(&self, key: &str, entry: &ProjectListEntry, ttl: Duration) -> ServiceResult<()>;
}

/// Final outcome of a job, as recorded for later lookup by trace id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Ok,
    Fail,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fail => "fail",
        }
    }

    /// `job_done:{job_type}:{trace_id}`
    pub fn key(job_type: &str, trace_id: &str) -> String {
        format!("job_done:{job_type}:{trace_id}")
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store of job outcomes keyed by [`JobOutcome::key`].
#[async_trait]
pub trait JobOutcomeStore: Send + Sync {
    async fn record(&self, key: &str, outcome: JobOutcome, ttl: Duration) -> ServiceResult<()>;
}

/// Everything the handlers need, shared across workers.
#[derive(Clone)]
pub struct JobServices {
    pub objects: Arc<dyn ObjectStore>,
    pub avatars: Arc<dyn AvatarCache>,
    pub versions: Arc<dyn TokenVersionCache>,
    pub projects: Arc<dyn ProjectListCache>,
    pub outcomes: Arc<dyn JobOutcomeStore>,
}

impl JobServices {
    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ObjectStore + AvatarCache + TokenVersionCache + ProjectListCache + JobOutcomeStore + 'static,
    {
        Self {
            objects: backend.clone(),
            avatars: backend.clone(),
            versions: backend.clone(),
            projects: backend.clone(),
            outcomes: backend,
        }
    }
}

impl fmt::Debug for JobServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobServices").finish_non_exhaustive()
    }
}
