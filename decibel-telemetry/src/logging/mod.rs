//! Structured logging.
//!
//! - JSON and pretty formats
//! - stdout and rolling file outputs
//! - `RUST_LOG` overrides the configured level

mod config;

pub use config::{LogConfig, LogFormat, LogOutput, RotationConfig};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global subscriber with the given configuration.
///
/// Returns guards that must be kept alive for file output to be flushed.
///
/// # Errors
///
/// Returns `LoggingError::AlreadyInitialized` if a global subscriber is
/// already installed, or `LoggingError::DirectoryCreation` if a log
/// directory cannot be created.
///
/// # Example
///
/// ```no_run
/// use decibel_telemetry::logging::{LogConfig, init_logging};
///
/// let _guards = init_logging(&LogConfig::default()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>, LoggingError> {
    let (layers, guards) = build_layers(config)?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guards)
}

fn build_layers(config: &LogConfig) -> Result<(Vec<BoxedLayer>, Vec<WorkerGuard>), LoggingError> {
    let mut layers = Vec::with_capacity(config.outputs.len());
    let mut guards = Vec::new();

    for output in &config.outputs {
        match output {
            LogOutput::Stdout => layers.push(stdout_layer(config)),
            LogOutput::File {
                path,
                file_name,
                rotation,
            } => {
                let (layer, guard) = file_layer(config, path, file_name, *rotation)?;
                layers.push(layer);
                guards.push(guard);
            }
        }
    }

    Ok((layers, guards))
}

fn span_events(config: &LogConfig) -> FmtSpan {
    if config.include_span_events {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    }
}

fn stdout_layer(config: &LogConfig) -> BoxedLayer {
    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_span_events(span_events(config));

    match config.format {
        LogFormat::Json => base.json().flatten_event(true).boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
    }
}

fn file_layer(
    config: &LogConfig,
    path: &str,
    file_name: &str,
    rotation: Option<RotationConfig>,
) -> Result<(BoxedLayer, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(path)?;

    let appender = match rotation.unwrap_or(RotationConfig::Daily) {
        RotationConfig::Hourly => tracing_appender::rolling::hourly(path, file_name),
        RotationConfig::Daily => tracing_appender::rolling::daily(path, file_name),
        RotationConfig::Never => tracing_appender::rolling::never(path, file_name),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(config.include_thread_id)
        .with_file(config.include_file_info)
        .with_line_number(config.include_file_info)
        .with_span_events(span_events(config))
        .json()
        .flatten_event(true)
        .boxed();

    Ok((layer, guard))
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create log directory
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}
