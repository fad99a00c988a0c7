use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use chrono::Local;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer, Registry};

/// Directory name used for run logs, both under the temp dir and locally.
pub const LOG_DIR_NAME: &str = "ShowSetupLogs";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    LogDir { path: PathBuf, source: io::Error },

    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("Logging already initialized: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// How the run's logging should be wired up.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Level for the console output. The log file always captures DEBUG.
    pub console_level: LevelFilter,
    /// Directory for the per-run log file; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
    /// Prefix of the log file name, followed by a timestamp.
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_level: LevelFilter::INFO,
            log_dir: Some(default_log_dir(false)),
            file_prefix: "p4_show_setup".to_string(),
        }
    }
}

/// Keeps the background log writer alive; drop it last in `main`.
pub struct LogHandle {
    _guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LogHandle {
    /// Path of the log file written for this run, if file logging is on.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Where run logs go: the user's temp dir, or the working directory when
/// `local` is set.
pub fn default_log_dir(local: bool) -> PathBuf {
    if local {
        PathBuf::from(LOG_DIR_NAME)
    } else {
        env::temp_dir().join(LOG_DIR_NAME)
    }
}

/// Timestamped log file name for a run started now.
pub fn log_file_name(prefix: &str) -> String {
    format!("{}_{}.log", prefix, Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

fn console_filter(level: LevelFilter) -> Result<EnvFilter, LoggingError> {
    // LOG_LEVEL wins over RUST_LOG, which wins over the command line.
    if let Ok(filter) = env::var("LOG_LEVEL") {
        return EnvFilter::try_new(&filter).map_err(|e| LoggingError::InvalidFilter {
            filter,
            message: e.to_string(),
        });
    }
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string())))
}

/// Initializes the global tracing subscriber.
///
/// Console output goes to stderr at the requested level, as JSON when
/// `LOG_FORMAT=json`. When a log directory is configured, a second layer
/// writes everything at DEBUG to a timestamped file in that directory.
pub fn init_subscriber(settings: &LogSettings) -> Result<LogHandle, LoggingError> {
    let is_json = env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = fmt::layer().with_writer(io::stderr).with_target(false);
    let filter = console_filter(settings.console_level)?;
    if is_json {
        layers.push(console.json().with_filter(filter).boxed());
    } else {
        layers.push(console.with_filter(filter).boxed());
    }

    let mut guard = None;
    let mut log_file = None;
    if let Some(dir) = &settings.log_dir {
        fs::create_dir_all(dir).map_err(|source| LoggingError::LogDir {
            path: dir.clone(),
            source,
        })?;

        let file_name = log_file_name(&settings.file_prefix);
        let appender = tracing_appender::rolling::never(dir, &file_name);
        let (writer, worker_guard) = tracing_appender::non_blocking(appender);
        guard = Some(worker_guard);
        log_file = Some(dir.join(file_name));

        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG)
                .boxed(),
        );
    }

    registry().with(layers).try_init()?;

    Ok(LogHandle {
        _guard: guard,
        log_file,
    })
}
