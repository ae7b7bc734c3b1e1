//! Console and rolling-file logging setup
//!
//! [`init_logging`] installs a `tracing` subscriber with a stderr console
//! layer and, when a log directory is configured, a daily-rolling file layer
//! written through a non-blocking worker. Noisy HTTP and AWS SDK targets are
//! capped at `warn` on both layers.

use crate::error::AgentCoreError;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::FmtSpan, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// File name prefix for rolled log files
pub const LOG_FILE_PREFIX: &str = "agentcore-mcp.log";

const NOISE_DIRECTIVES: &str =
    "tokio=warn,hyper=warn,h2=warn,rustls=warn,reqwest=warn,aws_smithy=warn,aws_smithy_runtime=warn,aws_config=warn,aws_credential_types=warn";

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files; no file logging when unset
    pub log_dir: Option<PathBuf>,
    /// Log level for file output
    pub file_log_level: String,
    /// Log level for console output
    pub console_log_level: String,
    pub console_enabled: bool,
    /// Write the log file as JSON lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            file_log_level: "debug".to_string(),
            console_log_level: "info".to_string(),
            console_enabled: true,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(log_dir) = std::env::var("AGENTCORE_LOG_DIR") {
            config.log_dir = Some(PathBuf::from(log_dir));
        }

        if let Ok(level) = std::env::var("AGENTCORE_FILE_LOG_LEVEL") {
            config.file_log_level = level;
        }

        if let Ok(level) = std::env::var("AGENTCORE_CONSOLE_LOG_LEVEL") {
            config.console_log_level = level;
        }

        if let Ok(enabled) = std::env::var("AGENTCORE_CONSOLE_LOGGING") {
            config.console_enabled = enabled.parse().unwrap_or(true);
        }

        if let Ok(json) = std::env::var("AGENTCORE_JSON_LOGS") {
            config.json_format = json.parse().unwrap_or(false);
        }

        config
    }
}

/// Guard that must be kept alive for the duration of the application
/// to ensure proper log flushing
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Level filter with the noisy dependency targets capped at `warn`
///
/// Falls back to `fallback` when `level` is not a valid filter.
pub fn build_filter(level: &str, fallback: &str) -> EnvFilter {
    EnvFilter::try_new(format!("{},{}", level, NOISE_DIRECTIVES))
        .or_else(|_| EnvFilter::try_new(format!("{},{}", fallback, NOISE_DIRECTIVES)))
        .unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Initialize the global subscriber
///
/// Fails if the log directory cannot be created or a subscriber is already
/// installed.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, AgentCoreError> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guard = None;

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir).map_err(|e| {
            AgentCoreError::logging(format!(
                "Failed to create log directory {}: {}",
                log_dir.display(),
                e
            ))
        })?;

        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_filter = build_filter(&config.file_log_level, "info");
        let timer = ChronoUtc::new("%Y-%m-%d %H:%M:%S%.3f UTC".to_string());
        let file_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_timer(timer)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .json()
                .with_current_span(true)
                .with_filter(file_filter)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_timer(timer)
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_filter(file_filter)
                .boxed()
        };
        layers.push(file_layer);
    }

    if config.console_enabled {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .with_filter(build_filter(&config.console_log_level, "info"))
            .boxed();
        layers.push(console_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| AgentCoreError::logging(format!("Failed to install subscriber: {}", e)))?;

    info!(
        log_dir = ?config.log_dir,
        json_format = config.json_format,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert!(config.log_dir.is_none());
        assert!(config.console_enabled);
        assert!(!config.json_format);
        assert_eq!(config.console_log_level, "info");
    }

    #[test]
    fn test_build_filter_caps_noisy_targets() {
        let filter = build_filter("debug", "info");
        assert!(filter.to_string().contains("hyper=warn"));

        let filter = build_filter("trace", "warn");
        let rendered = filter.to_string();
        assert!(rendered.contains("trace"));
        assert!(rendered.contains("aws_config=warn"));
    }

    #[test]
    fn test_file_logging_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            log_dir: Some(log_dir.clone()),
            console_enabled: false,
            ..LoggingConfig::default()
        };

        // Another test may already own the global subscriber; the directory
        // is created before installation either way.
        let _ = init_logging(config);
        assert!(log_dir.is_dir());
    }
}
