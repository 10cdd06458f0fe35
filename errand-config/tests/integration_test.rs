//! Integration tests for errand-config

use errand_config::*;
use std::path::PathBuf;
use std::time::Duration;

fn write_temp(name: &str, content: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("errand-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_toml_file_to_policies() {
    let path = write_temp(
        "errand.toml",
        r#"
        queue_capacity = 128
        workers = 2
        default_max_retry = 1

        [policies.DeleteCOS]
        job_timeout_ms = 25000
        attempt_timeout_ms = 5000

        [policies.PutVersion]
        job_timeout_ms = 5000
        attempt_timeout_ms = 1000
        max_retry = 3
        backoff_base_ms = 50
        backoff_max_ms = 400
        "#,
    );

    let mut manager = ConfigManager::new();
    manager.load_file(&path).unwrap();
    let settings: DispatcherSettings = manager.load_validated().unwrap();

    assert_eq!(settings.queue_capacity, 128);

    let delete = settings.policy("DeleteCOS").unwrap();
    assert_eq!(delete.job_timeout, Duration::from_secs(25));
    assert_eq!(delete.max_retry, 1);

    let version = settings.policy("PutVersion").unwrap();
    assert_eq!(version.max_retry, 3);
    assert_eq!(version.backoff.delay_for_retry(0), Duration::from_millis(50));
    assert_eq!(version.backoff.delay_for_retry(10), Duration::from_millis(400));

    assert_eq!(settings.timeout_policies(std::iter::empty()).len(), 2);
}

#[test]
fn test_json_file_and_env_layers() {
    let path = write_temp("errand.json", r#"{ "queue_capacity": 32, "workers": 1 }"#);

    let mut manager = ConfigManager::new();
    manager.load_file(&path).unwrap();
    manager.load_vars([("ERRAND_WORKERS", "3")]).unwrap();

    let settings: DispatcherSettings = manager.load_validated().unwrap();
    assert_eq!(settings.queue_capacity, 32);
    assert_eq!(settings.workers, 3);
}

#[test]
fn test_dotenv_file() {
    let path = write_temp("errand.env", "ERRAND_QUEUE_CAPACITY=16\nERRAND_BACKOFF_BASE_MS=100\n");

    let mut manager = ConfigManager::new();
    manager.load_dotenv(Some(&path)).unwrap();

    let settings: DispatcherSettings = manager.load_validated().unwrap();
    assert_eq!(settings.queue_capacity, 16);
    assert_eq!(settings.backoff_base_ms, 100);
}

#[test]
fn test_env_override_of_builtin_job_type() {
    let mut manager = ConfigManager::new();
    manager
        .load_vars([("ERRAND_POLICIES__PutVersion__MAX_RETRY", "4")])
        .unwrap();

    // A retry cap alone is enough for a job type that has built-in timeouts.
    let settings: DispatcherSettings = manager.load_validated().unwrap();
    let builtin = errand_dispatch::TimeoutPolicy::new(Duration::from_secs(5), Duration::from_secs(1));
    let resolved = settings.timeout_policies([("PutVersion", builtin)]);

    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].1.max_retry, 4);
    assert_eq!(resolved[0].1.attempt_timeout, Duration::from_secs(1));
}

#[test]
fn test_missing_file_is_error() {
    let mut manager = ConfigManager::new();
    let result = manager.load_file("/nonexistent/errand.toml");

    assert!(matches!(result, Err(ConfigError::IoError(_))));
}
