// Dispatcher settings

use crate::validation::{ConfigValidator, Validate};
use crate::Result;
use errand_dispatch::{Backoff, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_RETRY, TimeoutPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Queue, worker pool and per job type policies.
///
/// ```toml
/// queue_capacity = 256
/// workers = 4
///
/// [policies.DeleteCOS]
/// job_timeout_ms = 25000
/// attempt_timeout_ms = 5000
/// max_retry = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    pub queue_capacity: usize,
    pub workers: usize,
    /// Retry cap for policies that do not set their own
    pub default_max_retry: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub policies: BTreeMap<String, PolicySettings>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            workers: 4,
            default_max_retry: DEFAULT_MAX_RETRY,
            backoff_base_ms: millis(DEFAULT_BACKOFF_BASE),
            backoff_max_ms: millis(DEFAULT_BACKOFF_MAX),
            policies: BTreeMap::new(),
        }
    }
}

impl DispatcherSettings {
    /// Backoff for policies that do not set their own.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: Duration::from_millis(self.backoff_base_ms),
            max: Duration::from_millis(self.backoff_max_ms),
        }
    }

    /// Configured policy for `job_type`, if it names both timeouts.
    pub fn policy(&self, job_type: &str) -> Option<TimeoutPolicy> {
        self.resolve(job_type, None)
    }

    /// Policy for `job_type` starting from `builtin`.
    ///
    /// The retry cap and backoff defaults apply first, then whatever the job
    /// type's own entry sets. Without a `builtin`, the entry must name both
    /// timeouts.
    pub fn resolve(&self, job_type: &str, builtin: Option<TimeoutPolicy>) -> Option<TimeoutPolicy> {
        let configured = self.policies.get(job_type);
        let job_timeout = configured
            .and_then(|policy| policy.job_timeout_ms)
            .map(Duration::from_millis)
            .or(builtin.map(|policy| policy.job_timeout))?;
        let attempt_timeout = configured
            .and_then(|policy| policy.attempt_timeout_ms)
            .map(Duration::from_millis)
            .or(builtin.map(|policy| policy.attempt_timeout))?;

        let defaults = TimeoutPolicy::new(job_timeout, attempt_timeout)
            .with_max_retry(self.default_max_retry)
            .with_backoff(self.backoff());

        Some(match configured {
            Some(policy) => policy.apply(defaults),
            None => defaults,
        })
    }

    /// Resolve `builtins` plus every configured job type.
    ///
    /// Configured job types that have no builtin and miss a timeout are left
    /// out; [`warnings`](Self::warnings) reports them.
    pub fn timeout_policies<'a, I>(&self, builtins: I) -> Vec<(String, TimeoutPolicy)>
    where
        I: IntoIterator<Item = (&'a str, TimeoutPolicy)>,
    {
        let mut resolved: BTreeMap<String, TimeoutPolicy> = builtins
            .into_iter()
            .filter_map(|(job_type, builtin)| {
                self.resolve(job_type, Some(builtin))
                    .map(|policy| (job_type.to_string(), policy))
            })
            .collect();

        for job_type in self.policies.keys() {
            if resolved.contains_key(job_type) {
                continue;
            }
            if let Some(policy) = self.policy(job_type) {
                resolved.insert(job_type.clone(), policy);
            }
        }

        resolved.into_iter().collect()
    }

    /// Settings that are accepted but probably not what was meant.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (job_type, policy) in &self.policies {
            match (policy.job_timeout_ms, policy.attempt_timeout_ms) {
                (Some(job), Some(attempt)) if attempt > job => warnings.push(format!(
                    "policies.{}: attempt_timeout_ms ({}) exceeds job_timeout_ms ({}), the job timeout dominates",
                    job_type, attempt, job
                )),
                (Some(_), Some(_)) => {}
                _ => warnings.push(format!(
                    "policies.{}: timeouts not set, ignored unless the job type has built-in timeouts",
                    job_type
                )),
            }
        }
        warnings
    }
}

impl Validate for DispatcherSettings {
    fn validate(&self) -> Result<()> {
        ConfigValidator::positive(self.queue_capacity as u64, "queue_capacity")?;
        ConfigValidator::positive(self.workers as u64, "workers")?;
        ConfigValidator::positive(self.backoff_base_ms, "backoff_base_ms")?;
        ConfigValidator::at_most(self.backoff_base_ms, self.backoff_max_ms, "backoff_base_ms")?;

        for (job_type, policy) in &self.policies {
            ConfigValidator::not_empty(job_type, "policies key")?;
            policy.validate_as(job_type)?;
        }
        Ok(())
    }
}

/// Per job type overrides. Unset fields fall back to the built-in policy of
/// the job type and the dispatcher-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_base_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_max_ms: Option<u64>,
}

impl PolicySettings {
    pub fn new(job_timeout_ms: u64, attempt_timeout_ms: u64) -> Self {
        Self {
            job_timeout_ms: Some(job_timeout_ms),
            attempt_timeout_ms: Some(attempt_timeout_ms),
            ..Default::default()
        }
    }

    /// `policy` with every field set here replacing its counterpart.
    pub fn apply(&self, policy: TimeoutPolicy) -> TimeoutPolicy {
        let job_timeout = self.job_timeout_ms.map(Duration::from_millis).unwrap_or(policy.job_timeout);
        let attempt_timeout = self
            .attempt_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(policy.attempt_timeout);

        let base = self.backoff_base_ms.map(Duration::from_millis).unwrap_or(policy.backoff.base);
        let max = self
            .backoff_max_ms
            .map(Duration::from_millis)
            .unwrap_or(policy.backoff.max)
            .max(base);

        TimeoutPolicy::new(job_timeout, attempt_timeout)
            .with_max_retry(self.max_retry.unwrap_or(policy.max_retry))
            .with_backoff(Backoff { base, max })
    }

    fn validate_as(&self, job_type: &str) -> Result<()> {
        if let Some(job_timeout) = self.job_timeout_ms {
            ConfigValidator::positive(job_timeout, &format!("policies.{job_type}.job_timeout_ms"))?;
        }
        if let Some(attempt_timeout) = self.attempt_timeout_ms {
            ConfigValidator::positive(attempt_timeout, &format!("policies.{job_type}.attempt_timeout_ms"))?;
        }
        if let Some(base) = self.backoff_base_ms {
            ConfigValidator::positive(base, &format!("policies.{job_type}.backoff_base_ms"))?;
            if let Some(max) = self.backoff_max_ms {
                ConfigValidator::at_most(base, max, &format!("policies.{job_type}.backoff_base_ms"))?;
            }
        }
        Ok(())
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
