//! In-memory backend for every job collaborator.
//!
//! Useful for tests and single-process setups. Entries never expire; the TTL
//! handed in by the handlers is recorded but not enforced.

use crate::error::ServiceResult;
use crate::payloads::ProjectListEntry;
use crate::services::{AvatarCache, JobOutcome, JobOutcomeStore, ObjectStore, ProjectListCache, TokenVersionCache};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    objects: DashSet<String>,
    avatars: DashMap<i64, String>,
    versions: DashMap<i64, i64>,
    summaries: DashMap<String, (ProjectListEntry, Duration)>,
    outcomes: DashMap<String, JobOutcome>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_object(&self, key: impl Into<String>) {
        self.objects.insert(key.into());
    }

    pub fn has_object(&self, key: &str) -> bool {
        self.objects.contains(key)
    }

    pub fn avatar_key(&self, uid: i64) -> Option<String> {
        self.avatars.get(&uid).map(|entry| entry.value().clone())
    }

    pub fn token_version(&self, uid: i64) -> Option<i64> {
        self.versions.get(&uid).map(|entry| *entry.value())
    }

    pub fn summary(&self, key: &str) -> Option<ProjectListEntry> {
        self.summaries.get(key).map(|entry| entry.value().0.clone())
    }

    pub fn outcome(&self, job_type: &str, trace_id: &str) -> Option<JobOutcome> {
        self.outcomes
            .get(&JobOutcome::key(job_type, trace_id))
            .map(|entry| *entry.value())
    }
}

#[async_trait]
impl ObjectStore for InMemoryBackend {
    async fn delete_object(&self, key: &str) -> ServiceResult<()> {
        self.objects.remove(key);
        Ok(())
    }
}

#[async_trait]
impl AvatarCache for InMemoryBackend {
    async fn set_avatar_key(&self, uid: i64, avatar_key: &str, _ttl: Duration) -> ServiceResult<()> {
        self.avatars.insert(uid, avatar_key.to_string());
        Ok(())
    }
}

#[async_trait]
impl TokenVersionCache for InMemoryBackend {
    async fn put_version(&self, uid: i64, token_version: i64, _ttl: Duration) -> ServiceResult<()> {
        self.versions.insert(uid, token_version);
        Ok(())
    }
}

#[async_trait]
impl ProjectListCache for InMemoryBackend {
    async fn put_summary(&self, key: &str, entry: &ProjectListEntry, ttl: Duration) -> ServiceResult<()> {
        self.summaries.insert(key.to_string(), (entry.clone(), ttl));
        Ok(())
    }
}

#[async_trait]
impl JobOutcomeStore for InMemoryBackend {
    async fn record(&self, key: &str, outcome: JobOutcome, _ttl: Duration) -> ServiceResult<()> {
        self.outcomes.insert(key.to_string(), outcome);
        Ok(())
    }
}
