//! Optional tracing setup for applications embedding the client
//!
//! The library itself only emits `tracing` events; nothing is printed unless a
//! subscriber is installed, either by the host application or by `init_logging`.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    pub json_format: bool,
    /// Logs also go to a daily-rotated file here when set
    pub log_dir: Option<PathBuf>,
    pub colorize: bool,
    pub log_file_name: String,
    /// Targets the level applies to; `None` means every target
    pub log_targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "sgl-client".to_string(),
            log_targets: Some(vec!["sgl_client_rs".to_string()]),
        }
    }
}

impl LoggingConfig {
    /// Set the level from a name such as "debug" or "WARNING"; unknown names keep the current level
    pub fn with_level_name(mut self, name: &str) -> Self {
        if let Some(level) = parse_level(name) {
            self.level = level;
        }
        self
    }

    fn filter_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        match &self.log_targets {
            Some(targets) if !targets.is_empty() => targets
                .iter()
                .map(|target| format!("{}={}", target, level))
                .collect::<Vec<_>>()
                .join(","),
            _ => level,
        }
    }
}

pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" | "critical" => Some(Level::ERROR),
        _ => None,
    }
}

/// Keeps the file writer thread alive; hold it for the life of the program
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install a global subscriber.
///
/// `RUST_LOG` overrides the configured level when set. Calling this more than
/// once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let mut layers = Vec::new();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()));
    let stdout_layer = if config.json_format {
        stdout_layer.json().flatten_event(true).boxed()
    } else {
        stdout_layer.boxed()
    };
    layers.push(stdout_layer);

    let mut file_guard = None;
    if let Some(log_dir) = &config.log_dir {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!("Failed to create log directory {}: {}", log_dir.display(), e);
        } else {
            let file_appender =
                RollingFileAppender::new(Rotation::DAILY, log_dir, &config.log_file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_timer(ChronoUtc::new(TIME_FORMAT.to_string()))
                .with_writer(non_blocking);
            let file_layer = if config.json_format {
                file_layer.json().flatten_event(true).boxed()
            } else {
                file_layer.boxed()
            };
            layers.push(file_layer);
        }
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}
