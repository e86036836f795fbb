//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Configuration for the logging system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive (e.g., "info", "decibel_gateway=debug").
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Output targets
    #[serde(default = "default_outputs")]
    pub outputs: Vec<LogOutput>,

    /// Include thread IDs in log output
    #[serde(default)]
    pub include_thread_id: bool,

    /// Include file and line information
    #[serde(default)]
    pub include_file_info: bool,

    /// Include span enter/exit events
    #[serde(default)]
    pub include_span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            outputs: default_outputs(),
            include_thread_id: false,
            include_file_info: false,
            include_span_events: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_outputs() -> Vec<LogOutput> {
    vec![LogOutput::Stdout]
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for log aggregation systems
    #[default]
    Json,
    /// Human-readable format for development
    Pretty,
}

/// Log output target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file in `path`, with optional rotation
    File {
        /// Directory for log files
        path: String,
        /// File name prefix
        #[serde(default = "default_file_name")]
        file_name: String,
        /// Rotation configuration
        rotation: Option<RotationConfig>,
    },
}

fn default_file_name() -> String {
    "decibel.log".to_string()
}

/// Log rotation configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationConfig {
    /// Rotate logs hourly
    Hourly,
    /// Rotate logs daily
    Daily,
    /// Never rotate (single file)
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.outputs, vec![LogOutput::Stdout]);
    }

    #[test]
    fn test_config_serialization() {
        let config = LogConfig {
            level: "decibel_gateway=debug".to_string(),
            format: LogFormat::Pretty,
            outputs: vec![
                LogOutput::Stdout,
                LogOutput::File {
                    path: "/var/log/decibel".to_string(),
                    file_name: "stream.log".to_string(),
                    rotation: Some(RotationConfig::Daily),
                },
            ],
            include_thread_id: true,
            include_file_info: true,
            include_span_events: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: LogConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.level, "decibel_gateway=debug");
        assert_eq!(parsed.format, LogFormat::Pretty);
        assert_eq!(parsed.outputs, config.outputs);
    }

    #[test]
    fn test_file_name_default() {
        let json = r#"{"outputs":[{"type":"file","path":"/tmp/logs","rotation":"hourly"}]}"#;
        let parsed: LogConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.outputs,
            vec![LogOutput::File {
                path: "/tmp/logs".to_string(),
                file_name: "decibel.log".to_string(),
                rotation: Some(RotationConfig::Hourly),
            }]
        );
    }
}
