//! Configuration traits for validation and environment overrides.

use crate::error::ConfigError;

/// Trait for types that can be validated.
///
/// # Example
///
/// ```rust
/// use decibel_core::config::Validatable;
/// use decibel_core::error::ConfigError;
///
/// struct StreamConfig {
///     url: String,
/// }
///
/// impl Validatable for StreamConfig {
///     fn validate(&self) -> Result<(), ConfigError> {
///         if self.url.is_empty() {
///             return Err(ConfigError::missing_field("url"));
///         }
///         Ok(())
///     }
/// }
///
/// assert!(StreamConfig { url: String::new() }.validate().is_err());
/// ```
pub trait Validatable {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// Trait for types that support environment variable overrides.
pub trait Configurable: Sized {
    /// Applies environment variable overrides to the configuration.
    ///
    /// * `prefix` - The environment variable prefix (e.g., "DECIBEL")
    fn apply_env_overrides(&mut self, prefix: &str);

    /// Returns the environment variable names that can override this configuration.
    fn env_var_names(prefix: &str) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestConfig {
        delay_ms: i64,
    }

    impl Validatable for TestConfig {
        fn validate(&self) -> Result<(), ConfigError> {
            if self.delay_ms < 0 {
                return Err(ConfigError::invalid_value(
                    "delay_ms",
                    "Value must be non-negative",
                ));
            }
            Ok(())
        }
    }

    #[test]
    fn test_validatable() {
        assert!(TestConfig { delay_ms: 10 }.validate().is_ok());
        let err = TestConfig { delay_ms: -1 }.validate().unwrap_err();
        assert!(err.to_string().contains("delay_ms"));
    }
}
