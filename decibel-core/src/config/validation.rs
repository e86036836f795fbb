//! Configuration validation utilities.

use crate::error::ConfigError;

/// Result type for validation operations.
pub type ValidationResult = Result<(), ConfigError>;

/// Tracks the current section path and collects errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    path: Vec<String>,
    errors: Vec<ConfigError>,
}

impl ValidationContext {
    /// Creates a new validation context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters a new section.
    pub fn enter(&mut self, section: impl Into<String>) {
        self.path.push(section.into());
    }

    /// Exits the current section.
    pub fn exit(&mut self) {
        self.path.pop();
    }

    /// Returns the current path as a dot-separated string.
    #[must_use]
    pub fn current_path(&self) -> String {
        self.path.join(".")
    }

    /// Adds a validation error.
    pub fn add_error(&mut self, error: ConfigError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the collected validation errors.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Consumes the context and returns the first error, if any.
    pub fn into_result(self) -> ValidationResult {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }

    /// Creates a missing field error with the current path context.
    #[must_use]
    pub fn missing_field(&self, field: impl Into<String>) -> ConfigError {
        let section = if self.path.is_empty() {
            None
        } else {
            Some(self.current_path())
        };
        ConfigError::MissingField {
            field: field.into(),
            section,
        }
    }

    /// Creates an invalid value error with the current path context.
    #[must_use]
    pub fn invalid_value(&self, field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
        let field = field.into();
        let field = if self.path.is_empty() {
            field
        } else {
            format!("{}.{field}", self.current_path())
        };
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Fluent field validator writing into a [`ValidationContext`].
#[derive(Debug)]
pub struct Validator<'a> {
    ctx: &'a mut ValidationContext,
}

impl<'a> Validator<'a> {
    /// Creates a new validator with the given context.
    pub fn new(ctx: &'a mut ValidationContext) -> Self {
        Self { ctx }
    }

    /// Validates that a string field is not empty.
    pub fn require_non_empty(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            self.ctx.add_error(self.ctx.missing_field(field));
        }
        self
    }

    /// Validates that a numeric value is within a range.
    pub fn in_range<T: PartialOrd + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
        min: &T,
        max: &T,
    ) -> &mut Self {
        if value < min || value > max {
            self.ctx.add_error(self.ctx.invalid_value(
                field,
                format!("Value {value} must be between {min} and {max}"),
            ));
        }
        self
    }

    /// Validates that a numeric value is positive.
    pub fn positive<T: PartialOrd + Default + std::fmt::Display>(
        &mut self,
        field: &str,
        value: &T,
    ) -> &mut Self {
        if *value <= T::default() {
            self.ctx.add_error(
                self.ctx
                    .invalid_value(field, format!("Value {value} must be positive")),
            );
        }
        self
    }

    /// Validates using a custom predicate.
    pub fn custom<F>(&mut self, field: &str, predicate: F, error_msg: &str) -> &mut Self
    where
        F: FnOnce() -> bool,
    {
        if !predicate() {
            self.ctx.add_error(self.ctx.invalid_value(field, error_msg));
        }
        self
    }

    /// Validates that a non-empty value has an http(s) scheme.
    pub fn http_url(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.is_empty() && !value.starts_with("http://") && !value.starts_with("https://") {
            self.ctx
                .add_error(self.ctx.invalid_value(field, "Must be an http:// or https:// URL"));
        }
        self
    }

    /// Validates that a non-empty value has a ws(s) scheme.
    pub fn ws_url(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.is_empty() && !value.starts_with("ws://") && !value.starts_with("wss://") {
            self.ctx
                .add_error(self.ctx.invalid_value(field, "Must be a ws:// or wss:// URL"));
        }
        self
    }

    /// Returns the first collected error, if any.
    pub fn result(&self) -> ValidationResult {
        self.ctx.errors().first().cloned().map_or(Ok(()), Err)
    }
}

/// Environment variable helper for applying overrides.
///
/// # Example
///
/// ```rust
/// use decibel_core::config::validation::EnvOverride;
///
/// let mut url = "ws://localhost:8083".to_string();
/// EnvOverride::apply_string("DECIBEL_DOC_UNSET_VAR", &mut url);
/// assert_eq!(url, "ws://localhost:8083");
/// ```
pub struct EnvOverride;

impl EnvOverride {
    /// Applies an environment variable override to a string value.
    pub fn apply_string(var_name: &str, target: &mut String) {
        if let Ok(value) = std::env::var(var_name) {
            *target = value;
        }
    }

    /// Applies an environment variable override to an optional string value.
    pub fn apply_optional_string(var_name: &str, target: &mut Option<String>) {
        if let Ok(value) = std::env::var(var_name) {
            *target = Some(value);
        }
    }

    /// Applies an environment variable override to a parseable value.
    ///
    /// Unparseable values are ignored.
    pub fn apply_number<T: std::str::FromStr>(var_name: &str, target: &mut T) {
        if let Ok(value) = std::env::var(var_name)
            && let Ok(parsed) = value.parse()
        {
            *target = parsed;
        }
    }

    /// Applies an environment variable override to a boolean value.
    pub fn apply_bool(var_name: &str, target: &mut bool) {
        if let Ok(value) = std::env::var(var_name) {
            match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => *target = true,
                "false" | "0" | "no" | "off" => *target = false,
                _ => {}
            }
        }
    }
}
