//! Configuration validation support

use config::ConfigError;
use serde::{Deserialize, Serialize};

/// Trait for validating configuration values after they are loaded
pub trait ValidateConfig: Serialize + for<'de> Deserialize<'de> {
    /// Returns Ok(()) if valid, or an error describing what's wrong
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Common validation helpers
pub mod validators {
    use config::ConfigError;
    use std::collections::HashSet;
    use std::hash::Hash;

    /// Validate that a port number is valid (1-65535)
    pub fn validate_port(port: u16, field: &str) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::Message(format!(
                "{field}: port must be between 1 and 65535"
            )));
        }
        Ok(())
    }

    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::Message(format!("{field}: cannot be empty")));
        }
        Ok(())
    }

    /// Validate that a value is within range
    pub fn validate_range<T: PartialOrd + std::fmt::Display>(
        value: T,
        min: T,
        max: T,
        field: &str,
    ) -> Result<(), ConfigError> {
        if value < min || value > max {
            return Err(ConfigError::Message(format!(
                "{field}: must be between {min} and {max}"
            )));
        }
        Ok(())
    }

    /// Validate a DNS host name as used for SNI and Host matching
    pub fn validate_domain(domain: &str, field: &str) -> Result<(), ConfigError> {
        validate_not_empty(domain, field)?;
        let valid = domain.len() <= 253
            && domain.split('.').all(|label| {
                !label.is_empty()
                    && label.len() <= 63
                    && label
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '*')
            });
        if !valid {
            return Err(ConfigError::Message(format!(
                "{field}: '{domain}' is not a valid domain name"
            )));
        }
        Ok(())
    }

    /// Validate that no value appears twice
    pub fn validate_unique<'a, T, I>(values: I, field: &str) -> Result<(), ConfigError>
    where
        T: Eq + Hash + std::fmt::Display + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let mut seen = HashSet::new();
        for value in values {
            if !seen.insert(value) {
                return Err(ConfigError::Message(format!(
                    "{field}: duplicate entry '{value}'"
                )));
            }
        }
        Ok(())
    }
}
