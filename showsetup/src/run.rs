//! One show setup run, from argument checks to the final summary.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Input, Select};
use tracing::{debug, info};

use showsetup_backend::{get_backend, ConnectionSettings};
use showsetup_config::{ConfigLoader, DivisionConfigs, ProvisioningConfig};
use showsetup_core::{
    show_error, show_error_hint, show_error_with_details, show_info, show_println, show_progress,
    show_success, show_warning, validate_show_code,
};
use showsetup_orchestrator::{
    LedgerEntry, ProvisionOptions, Provisioner, ProvisioningFailure, ProvisioningReport,
};

use crate::cli::Args;
use crate::lock::{default_lock_dir, RunLock};

const DEFAULT_DIVISION: &str = "VFX";

/// The run failed and the details were already printed.
#[derive(Debug)]
pub struct Reported;

impl std::fmt::Display for Reported {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("show setup failed")
    }
}

impl std::error::Error for Reported {}

pub fn execute(args: Args) -> Result<()> {
    let show = resolve_show(&args)?;

    let (path, configs) = ConfigLoader::new()
        .with_path(args.config.as_deref())?
        .load()?;
    info!("Using config {}", path.display());

    let (division, config) = resolve_division(&args, &configs)?;
    info!("Division {}", division);

    if !args.yes {
        show_info!("Setting up {show} for division {division}");
        let typed = Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Please confirm the show code")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read show code confirmation")?;
        if !show_code_confirmed(&show, &typed) {
            show_warning!("Show code confirmation failed: {typed:?} does not match {show}");
            show_info!("Cancelled");
            return Ok(());
        }
    }

    let settings = ConnectionSettings {
        binary: args.p4.clone(),
        port: args.port.clone().or_else(|| env::var("P4PORT").ok()),
        user: args.user.clone(),
        client: args.client.clone(),
    };
    let backend = get_backend(&settings, args.dry_run)?;
    if args.dry_run {
        show_warning!("Dry run: changes are logged but not applied");
    }

    let _lock = if args.no_lock {
        None
    } else {
        let dir = args.lock_dir.clone().unwrap_or_else(default_lock_dir);
        Some(RunLock::acquire(&dir, settings.port.as_deref())?)
    };

    let user = resolve_user(&args);
    debug!("Provisioning as {}", user);

    let options = ProvisionOptions {
        date: None,
        backup_dir: args.backup_dir.clone(),
    };
    show_progress!("Setting up {show} for {division} as {user}");
    let mut provisioner = Provisioner::new(&*backend, config, user).with_options(options);
    match provisioner.run(&show) {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(failure) => {
            print_failure(&failure);
            Err(Reported.into())
        }
    }
}

/// File manager launcher for this platform.
fn file_manager() -> &'static str {
    if cfg!(target_os = "windows") {
        "explorer"
    } else if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Show `dir` in the platform file manager, creating it first.
pub fn open_logs_folder(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    show_info!("Opening {}", dir.display());
    // explorer exits non-zero even when the window opens
    duct::cmd(file_manager(), [dir])
        .unchecked()
        .start()
        .with_context(|| format!("Failed to run {}", file_manager()))?;
    Ok(())
}

/// The show code from `--show`, or asked for interactively.
fn resolve_show(args: &Args) -> Result<String> {
    let show = match &args.show {
        Some(show) => show.clone(),
        None if args.yes => bail!("--show is required with --yes"),
        None => Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Show code")
            .interact_text()
            .context("Failed to read show code")?,
    };

    let errors = validate_show_code(&show);
    if !errors.is_empty() {
        show_error_with_details!(format!("Invalid show code '{show}'"), &errors);
        return Err(Reported.into());
    }
    Ok(show)
}

/// The operator retyped the show code exactly.
fn show_code_confirmed(show: &str, typed: &str) -> bool {
    typed == show
}

fn resolve_division<'c>(
    args: &Args,
    configs: &'c DivisionConfigs,
) -> Result<(String, &'c ProvisioningConfig)> {
    if let Some((division, config)) = configs.find(args.division.as_slice()) {
        return Ok((division.to_string(), config));
    }
    if args.yes || configs.is_empty() {
        let (division, config) = configs.select(args.division.as_slice())?;
        return Ok((division.to_string(), config));
    }

    if !args.division.is_empty() {
        show_warning!("Division {} is not configured", args.division.join(", "));
    }
    let names: Vec<&str> = configs.divisions().collect();
    let default = names
        .iter()
        .position(|name| *name == DEFAULT_DIVISION)
        .unwrap_or(0);
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Division")
        .items(&names)
        .default(default)
        .interact()
        .context("Failed to read division")?;

    let division = names[choice];
    let config = configs
        .get(division)
        .ok_or_else(|| anyhow!("Division {division} disappeared from the config"))?;
    Ok((division.to_string(), config))
}

/// `--user`, then the usual environment variables.
fn resolve_user(args: &Args) -> String {
    args.user
        .clone()
        .or_else(|| {
            ["P4USER", "USER", "USERNAME"]
                .iter()
                .find_map(|var| env::var(var).ok().filter(|value| !value.is_empty()))
        })
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_report(report: &ProvisioningReport) {
    show_success!("Show {} set up", report.show);
    for entry in report.ledger.entries() {
        match entry {
            LedgerEntry::Namespace(name) => show_println!("  depot      //{name}"),
            LedgerEntry::Permissions(lines) => {
                show_println!("  protections {} line(s)", lines.len())
            }
            LedgerEntry::Groups(groups) => {
                for group in groups {
                    show_println!("  group      {} ({:?})", group.name, group.outcome);
                }
            }
            LedgerEntry::Streams(streams) => {
                for stream in streams {
                    show_println!("  stream     {} ({:?})", stream.name, stream.outcome);
                }
            }
        }
    }
    if let Some(backup) = &report.backup {
        show_info!("Protection table backup: {}", backup.display());
    }
}

fn print_failure(failure: &ProvisioningFailure) {
    show_error!("{}", failure);
    let Some(rollback) = &failure.rollback else {
        if failure.error.is_precondition() {
            show_error_hint!("Nothing was changed on the server");
        }
        return;
    };

    if rollback.is_complete() {
        show_info!("Rolled back: {}", join(&rollback.reversed));
    } else {
        show_error_with_details!(
            "Rollback incomplete, clean up by hand:",
            &rollback.failures
        );
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
