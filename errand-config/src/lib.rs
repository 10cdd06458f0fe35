// Configuration loading for the Errand dispatcher

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::{DEFAULT_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{DispatcherSettings, PolicySettings};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

/// Layered configuration: every load overrides what earlier loads set.
///
/// Nested tables such as `policies` are merged key by key, so an environment
/// variable can override one field of a policy defined in a file.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Map<String, Value>,
    env: EnvLoader,
}

impl ConfigManager {
    /// Create a new configuration manager reading `ERRAND_*` variables
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Map::new(),
            env: EnvLoader::new(prefix),
        }
    }

    /// Load configuration from file, detecting the format from its name
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let loader = ConfigLoader::auto(path)?.with_env(self.env.clone());
        let data = loader.load_file(path)?;
        self.merge_value(data)
    }

    /// Load configuration from a string in `format`
    pub fn load_str(&mut self, content: &str, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format)
            .with_env(self.env.clone())
            .parse(content)?;
        self.merge_value(data)
    }

    /// Load configuration from environment variables
    pub fn load_env(&mut self) -> Result<()> {
        let data = self.env.load();
        self.merge_value(data)
    }

    /// Load configuration from explicit variables, as if from the environment
    pub fn load_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let data = self.env.load_from(vars);
        self.merge_value(data)
    }

    /// Load prefixed variables from a `.env` file without touching the
    /// process environment. With no path, a missing `./.env` is not an error.
    pub fn load_dotenv(&mut self, path: Option<&Path>) -> Result<()> {
        let iter = match path {
            Some(path) => dotenvy::from_path_iter(path).map_err(|e| ConfigError::LoadError(e.to_string()))?,
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => iter,
                Err(_) => return Ok(()),
            },
        };

        let vars = iter
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ParseError(format!("dotenv parse error: {}", e)))?;
        self.load_vars(vars)
    }

    /// Deserialize and validate the merged configuration
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let validated: T = serde_json::from_value(Value::Object(self.config.clone()))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))?;

        validated.validate()?;

        Ok(validated)
    }

    fn merge_value(&mut self, data: Value) -> Result<()> {
        let Value::Object(map) = data else {
            return Err(ConfigError::ParseError(
                "configuration root must be a table".to_string(),
            ));
        };
        for (key, value) in map {
            match self.config.get_mut(&key) {
                Some(existing) => merge(existing, value),
                None => {
                    self.config.insert(key, value);
                }
            }
        }
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

fn merge(into: &mut Value, from: Value) {
    match (into, from) {
        (Value::Object(into), Value::Object(from)) => {
            for (key, value) in from {
                match into.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        into.insert(key, value);
                    }
                }
            }
        }
        (into, from) => *into = from,
    }
}

/// Load [`DispatcherSettings`]: defaults, then `path` if given, then `./.env`,
/// then `ERRAND_*` environment variables.
pub fn load_settings(path: Option<&Path>) -> Result<DispatcherSettings> {
    let mut manager = ConfigManager::new();
    if let Some(path) = path {
        manager.load_file(path)?;
    }
    manager.load_dotenv(None)?;
    manager.load_env()?;
    manager.load_validated()
}
