//! Configuration loader supporting YAML, TOML and JSON.

use crate::error::ConfigError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

const SUPPORTED_EXTENSIONS: &str = "Unrecognized file extension. Supported: .yaml, .yml, .toml, .json";

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// YAML format (.yaml, .yml)
    #[default]
    Yaml,
    /// TOML format (.toml)
    Toml,
    /// JSON format (.json)
    Json,
}

impl ConfigFormat {
    /// Detects the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| match ext.to_lowercase().as_str() {
                "yaml" | "yml" => Some(Self::Yaml),
                "toml" => Some(Self::Toml),
                "json" => Some(Self::Json),
                _ => None,
            })
    }

    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Configuration loader.
///
/// # Example
///
/// ```rust
/// use decibel_core::config::{ConfigFormat, ConfigLoader};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Stream {
///     url: String,
/// }
///
/// let stream: Stream = ConfigLoader::new()
///     .load_str("url: ws://localhost:8083", ConfigFormat::Yaml)
///     .unwrap();
/// assert_eq!(stream.url, "ws://localhost:8083");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment variable prefix used by [`ConfigLoader::load_file_with_env`].
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Returns the environment variable prefix, if set.
    #[must_use]
    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Loads configuration from a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized, the file cannot
    /// be read, or the content cannot be parsed.
    pub fn load_file<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: SUPPORTED_EXTENSIONS.to_string(),
        })?;

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        self.load_str(&content, format)
            .map_err(|e| match e {
                ConfigError::InvalidFormat { reason, .. } => ConfigError::InvalidFormat {
                    path: path.display().to_string(),
                    reason,
                },
                other => other,
            })
    }

    /// Loads a file and then applies environment overrides under the
    /// configured prefix (`DECIBEL` when none is set).
    pub fn load_file_with_env<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + super::Configurable,
        P: AsRef<Path>,
    {
        let mut config: T = self.load_file(path)?;
        config.apply_env_overrides(self.env_prefix().unwrap_or("DECIBEL"));
        Ok(config)
    }

    /// Loads configuration from a string with the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be parsed.
    pub fn load_str<T>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        let parsed = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| format!("YAML parse error: {e}")),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| format!("TOML parse error: {e}")),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| format!("JSON parse error: {e}")),
        };

        parsed.map_err(|reason| ConfigError::InvalidFormat {
            path: "<string>".to_string(),
            reason,
        })
    }

    /// Serializes a configuration to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize<T>(config: &T, format: ConfigFormat) -> Result<String, ConfigError>
    where
        T: Serialize,
    {
        let serialized = match format {
            ConfigFormat::Yaml => {
                serde_yaml::to_string(config).map_err(|e| format!("YAML serialization error: {e}"))
            }
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).map_err(|e| format!("TOML serialization error: {e}"))
            }
            ConfigFormat::Json => serde_json::to_string_pretty(config)
                .map_err(|e| format!("JSON serialization error: {e}")),
        };

        serialized.map_err(|reason| ConfigError::InvalidFormat {
            path: "<serialize>".to_string(),
            reason,
        })
    }

    /// Saves a configuration to a file, detecting the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized, serialization
    /// fails, or the file cannot be written.
    pub fn save_file<T, P>(config: &T, path: P) -> Result<(), ConfigError>
    where
        T: Serialize,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidFormat {
            path: path.display().to_string(),
            reason: SUPPORTED_EXTENSIONS.to_string(),
        })?;

        let content = Self::serialize(config, format)?;

        std::fs::write(path, content).map_err(|e| ConfigError::FileWriteError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}
