//! Job payloads.
//!
//! The same structs are used on both sides: services serialize them when
//! publishing and handlers decode them from [`Job::payload`](errand_dispatch::Job).

use chrono::{DateTime, Utc};
use fnv::FnvHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;

/// Payload of `DeleteCOS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteObjectPayload {
    pub key: String,
}

impl DeleteObjectPayload {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.key.is_empty() {
            return Err("object key is empty");
        }
        Ok(())
    }
}

/// Payload of `UpdateAvatar` and `PutAvatar`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarKeyPayload {
    pub uid: i64,
    #[serde(rename = "avatarKey")]
    pub avatar_key: String,
}

impl AvatarKeyPayload {
    pub fn new(uid: i64, avatar_key: impl Into<String>) -> Self {
        Self {
            uid,
            avatar_key: avatar_key.into(),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.uid <= 0 {
            return Err("uid must be positive");
        }
        if self.avatar_key.is_empty() {
            return Err("avatar key is empty");
        }
        Ok(())
    }
}

/// Payload of `PutVersion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenVersionPayload {
    pub uid: i64,
    #[serde(rename = "tokenVersion")]
    pub token_version: i64,
}

impl TokenVersionPayload {
    pub fn new(uid: i64, token_version: i64) -> Self {
        Self { uid, token_version }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.uid <= 0 {
            return Err("uid must be positive");
        }
        if self.token_version <= 0 {
            return Err("token version must be positive");
        }
        Ok(())
    }
}

/// One row of a user's project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub updated_at: DateTime<Utc>,
}

/// Payload of `PutProjectsSummaryCache`: one page of a project list query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummaryPayload {
    pub items: Vec<ProjectSummary>,
    pub total: i64,
    pub uid: i64,
    /// Cache generation of the user's project list
    pub ver: i64,
    /// Name filter of the query, possibly empty
    pub name: String,
    pub page: u32,
    pub size: u32,
}

impl ProjectSummaryPayload {
    /// Cache key this page is stored under.
    pub fn cache_key(&self) -> String {
        project_list_key(self.uid, self.ver, &self.name, self.page, self.size)
    }

    /// Value stored under [`cache_key`](Self::cache_key).
    pub fn cache_entry(&self) -> ProjectListEntry {
        ProjectListEntry {
            items: self.items.clone(),
            total: self.total,
        }
    }
}

/// Cached page of a project list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectListEntry {
    pub items: Vec<ProjectSummary>,
    pub total: i64,
}

/// Key of a cached project list page.
///
/// `u:{uid}:projects:list:v{ver}:n{fnv64a(name)}:p{page}:s{size}`, where a
/// blank name filter hashes as `-`.
pub fn project_list_key(uid: i64, ver: i64, name: &str, page: u32, size: u32) -> String {
    let name = match name.trim() {
        "" => "-",
        trimmed => trimmed,
    };
    format!(
        "u:{uid}:projects:list:v{ver}:n{:016x}:p{page}:s{size}",
        fnv1a_64(name.as_bytes())
    )
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(bytes);
    hasher.finish()
}
