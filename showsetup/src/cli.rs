// CLI argument parsing and definitions

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use showsetup_logging::default_log_dir;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Parser)]
#[command(name = "p4-showsetup")]
#[command(about = "Create a show's depot, protections, groups and streams in Perforce")]
#[command(version)]
pub struct Args {
    /// Show code to provision (2-8 characters, e.g. FOO)
    #[arg(short, long)]
    pub show: Option<String>,

    /// Division whose templates to use; the first configured one wins
    #[arg(short, long, num_args = 1..)]
    pub division: Vec<String>,

    /// Path to show_setup_configs.{json,yaml}
    #[arg(short, long)]
    pub config: Option<String>,

    /// Perforce server (defaults to P4PORT)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Perforce user (defaults to P4USER)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Perforce client workspace (defaults to P4CLIENT)
    #[arg(long)]
    pub client: Option<String>,

    /// Path or name of the p4 executable
    #[arg(long, default_value = "p4")]
    pub p4: String,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Read from the server but only log changes
    #[arg(long)]
    pub dry_run: bool,

    /// Console log level
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Write the run log to ./ShowSetupLogs instead of the temp directory
    #[arg(long)]
    pub local_log: bool,

    /// Directory for the run log (overrides --local-log)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Open the folder holding run logs in a file manager and exit
    #[arg(long)]
    pub open_logs_folder: bool,

    /// Directory holding per-server run locks
    #[arg(long)]
    pub lock_dir: Option<PathBuf>,

    /// Skip the per-server run lock
    #[arg(long)]
    pub no_lock: bool,

    /// Save the protection table here before changing it
    #[arg(long)]
    pub backup_dir: Option<PathBuf>,
}

impl Args {
    /// Where this run writes its log.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| default_log_dir(self.local_log))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            // tracing has no level above ERROR
            LogLevel::Error | LogLevel::Fatal => LevelFilter::ERROR,
        }
    }
}
