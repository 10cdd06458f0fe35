// Environment variable loading

use serde_json::{Map, Value};
use std::env;

/// Default prefix of Errand environment variables.
pub const DEFAULT_PREFIX: &str = "ERRAND";

/// Environment variable loader
///
/// Maps `{PREFIX}_QUEUE_CAPACITY=512` to `queue_capacity = 512` and
/// `{PREFIX}_POLICIES__DeleteCOS__JOB_TIMEOUT_MS=30000` to
/// `policies.DeleteCOS.job_timeout_ms = 30000`. Job type names keep their case.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load prefixed variables from the process environment
    pub fn load(&self) -> Value {
        self.load_from(env::vars())
    }

    /// Load prefixed variables from `vars`; other variables are ignored.
    pub fn load_from<I, K, V>(&self, vars: I) -> Value
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut root = Map::new();
        for (key, value) in vars {
            if let Some(key) = self.strip_prefix(key.as_ref()) {
                insert_var(&mut root, key, value.as_ref());
            }
        }
        Value::Object(root)
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())?
            .strip_prefix('_')
            .filter(|rest| !rest.is_empty())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn insert_var(root: &mut Map<String, Value>, key: &str, value: &str) {
    let mut parts = key.split("__");
    let head = parts.next().unwrap_or_default().to_lowercase();

    if head != "policies" {
        root.insert(head, scalar(value));
        return;
    }

    let (Some(job_type), Some(field), None) = (parts.next(), parts.next(), parts.next()) else {
        return;
    };
    let policies = root
        .entry("policies")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(policies) = policies {
        let policy = policies
            .entry(job_type)
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(policy) = policy {
            policy.insert(field.to_lowercase(), scalar(value));
        }
    }
}

/// Environment values are untyped; numbers and booleans are recognised so they
/// deserialize into numeric and boolean settings.
pub(crate) fn scalar(value: &str) -> Value {
    if let Ok(n) = value.parse::<u64>() {
        Value::from(n)
    } else if let Ok(b) = value.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // std::env::set_var is unsafe in edition 2024, so these tests feed
    // variables through load_from instead of the process environment.

    #[test]
    fn test_load_from_filters_prefix() {
        let loader = EnvLoader::default();
        let vars = [
            ("ERRAND_QUEUE_CAPACITY", "512"),
            ("ERRAND_WORKERS", "8"),
            ("ERRANDX_WORKERS", "99"),
            ("ERRAND_", "ignored"),
            ("PATH", "/usr/bin"),
        ];

        assert_eq!(
            loader.load_from(vars),
            json!({ "queue_capacity": 512, "workers": 8 })
        );
    }

    #[test]
    fn test_policy_vars_keep_job_type_case() {
        let loader = EnvLoader::default();
        let vars = [
            ("ERRAND_POLICIES__DeleteCOS__JOB_TIMEOUT_MS", "30000"),
            ("ERRAND_POLICIES__DeleteCOS__MAX_RETRY", "1"),
            ("ERRAND_POLICIES__Broken", "1"),
        ];

        assert_eq!(
            loader.load_from(vars),
            json!({ "policies": { "DeleteCOS": { "job_timeout_ms": 30000, "max_retry": 1 } } })
        );
    }

    #[test]
    fn test_scalar() {
        assert_eq!(scalar("42"), json!(42));
        assert_eq!(scalar("true"), json!(true));
        assert_eq!(scalar("-1"), json!("-1"));
        assert_eq!(scalar("pretty"), json!("pretty"));
    }
}
