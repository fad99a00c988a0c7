// Standard library
use std::process;

// External crates
use clap::Parser;
use tracing::{debug, info_span};
use uuid::Uuid;

// Internal imports
use showsetup_core::{show_error, show_warning};
use showsetup_logging::{init_subscriber, LogSettings};

// Local modules
mod cli;
mod lock;
mod run;

use cli::Args;
use run::{execute, open_logs_folder, Reported};

fn main() {
    let args = Args::parse();

    if args.open_logs_folder {
        if let Err(e) = open_logs_folder(&args.log_dir()) {
            show_error!("{:#}", e);
            process::exit(1);
        }
        return;
    }

    let settings = LogSettings {
        console_level: args.loglevel.into(),
        log_dir: Some(args.log_dir()),
        ..LogSettings::default()
    };
    let log_handle = match init_subscriber(&settings) {
        Ok(handle) => Some(handle),
        Err(e) => {
            show_warning!("Failed to initialize logging: {}", e);
            None
        }
    };

    // Every log line of this run carries the same id.
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("run", run_id = %run_id);
    let entered = span.enter();
    if let Some(log_file) = log_handle.as_ref().and_then(|handle| handle.log_file()) {
        debug!("Logging to {}", log_file.display());
    }

    if let Err(e) = execute(args) {
        if !e.is::<Reported>() {
            show_error!("{:#}", e);
        }
        drop(entered);
        drop(log_handle);
        process::exit(1);
    }
}
