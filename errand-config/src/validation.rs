// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Validation rules shared by settings types
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a count or duration is not zero
    pub fn positive(value: u64, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than zero",
                field
            )));
        }
        Ok(())
    }

    /// Validate that `value` does not exceed `max`
    pub fn at_most<T: PartialOrd + std::fmt::Display>(value: T, max: T, field: &str) -> Result<()> {
        if value > max {
            return Err(ConfigError::ValidationError(format!(
                "{} must be at most {}, got {}",
                field, max, value
            )));
        }
        Ok(())
    }

    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }
}
