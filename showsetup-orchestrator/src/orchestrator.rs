//! The provisioning run.
//!
//! A run moves through a fixed sequence of states, each performing one
//! category of server mutation and recording it in the ledger. Any failure
//! after the first recorded mutation rolls back exactly what the ledger
//! holds; failures before it only abort.

use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use showsetup_backend::Backend;
use showsetup_config::ProvisioningConfig;
use showsetup_core::ShowIdentifier;
use tracing::{error, info, instrument, warn};

use crate::context::ProvisioningContext;
use crate::error::ProvisionError;
use crate::groups::ensure_group;
use crate::ledger::{Ledger, LedgerEntry};
use crate::protections::{apply_entries, check_entries};
use crate::rollback::{roll_back, RollbackReport};
use crate::streams::create_stream;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisioningState {
    Idle,
    Validating,
    CreatingNamespace,
    WritingPermissions,
    MergingGroups,
    ProvisioningStreams,
    Done,
    RollingBack,
    Failed,
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningState::Idle => "idle",
            ProvisioningState::Validating => "validating",
            ProvisioningState::CreatingNamespace => "creating namespace",
            ProvisioningState::WritingPermissions => "writing permissions",
            ProvisioningState::MergingGroups => "merging groups",
            ProvisioningState::ProvisioningStreams => "provisioning streams",
            ProvisioningState::Done => "done",
            ProvisioningState::RollingBack => "rolling back",
            ProvisioningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Date used for `{mdy_str}`; today when unset.
    pub date: Option<NaiveDate>,
    /// Save the protection table here before changing it.
    pub backup_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ProvisioningReport {
    pub show: String,
    pub state: ProvisioningState,
    pub ledger: Ledger,
    pub backup: Option<PathBuf>,
}

/// A run that did not finish. `rollback` is `None` when nothing had been
/// changed on the server.
#[derive(Debug)]
pub struct ProvisioningFailure {
    pub error: ProvisionError,
    pub failed_in: ProvisioningState,
    pub state: ProvisioningState,
    pub ledger: Ledger,
    pub rollback: Option<RollbackReport>,
}

impl fmt::Display for ProvisioningFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provisioning failed while {}: {}", self.failed_in, self.error)
    }
}

impl std::error::Error for ProvisioningFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

pub struct Provisioner<'a> {
    backend: &'a dyn Backend,
    config: &'a ProvisioningConfig,
    user: String,
    options: ProvisionOptions,
    state: ProvisioningState,
    history: Vec<ProvisioningState>,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        backend: &'a dyn Backend,
        config: &'a ProvisioningConfig,
        user: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            config,
            user: user.into(),
            options: ProvisionOptions::default(),
            state: ProvisioningState::Idle,
            history: vec![ProvisioningState::Idle],
        }
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[ProvisioningState] {
        &self.history
    }

    fn transition(&mut self, next: ProvisioningState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    /// Stop before any mutation.
    fn abort(&mut self, error: ProvisionError) -> ProvisioningFailure {
        let failed_in = self.state;
        warn!("Aborting: {}", error);
        self.transition(ProvisioningState::Failed);
        ProvisioningFailure {
            error,
            failed_in,
            state: self.state,
            ledger: Ledger::new(),
            rollback: None,
        }
    }

    /// Provision `show` with this provisioner's configuration.
    #[instrument(skip(self), fields(backend = self.backend.name(), user = %self.user))]
    pub fn run(&mut self, show: &str) -> Result<ProvisioningReport, ProvisioningFailure> {
        self.transition(ProvisioningState::Validating);
        let show = ShowIdentifier::parse(show)
            .map_err(|errors| self.abort(ProvisionError::Validation(errors)))?;

        let date = self
            .options
            .date
            .unwrap_or_else(|| Local::now().date_naive());
        let ctx = ProvisioningContext::new(show, self.user.clone(), date);
        let lines: Vec<String> = self
            .config
            .permissions
            .iter()
            .map(|template| ctx.resolve(template))
            .collect();

        if let Err(error) = self.preflight(&ctx, &lines) {
            return Err(self.abort(error));
        }

        let mut ledger = Ledger::new();
        match self.forward(&ctx, &lines, &mut ledger) {
            Ok(backup) => {
                self.transition(ProvisioningState::Done);
                info!("Show {} provisioned", ctx.show());
                Ok(ProvisioningReport {
                    show: ctx.show().to_string(),
                    state: self.state,
                    ledger,
                    backup,
                })
            }
            Err(error) => Err(self.fail(error, ledger)),
        }
    }

    /// Checks against the live server that mutate nothing.
    fn preflight(&self, ctx: &ProvisioningContext, lines: &[String]) -> Result<(), ProvisionError> {
        if self.backend.namespace_exists(ctx.show())? {
            return Err(ProvisionError::NamespaceExists(ctx.show().to_string()));
        }
        if !lines.is_empty() {
            check_entries(self.backend, ctx.show(), lines)?;
        }
        Ok(())
    }

    fn forward(
        &mut self,
        ctx: &ProvisioningContext,
        lines: &[String],
        ledger: &mut Ledger,
    ) -> Result<Option<PathBuf>, ProvisionError> {
        let backend = self.backend;
        let config = self.config;
        let show = ctx.show();

        self.transition(ProvisioningState::CreatingNamespace);
        backend.create_namespace(show)?;
        ledger.record(LedgerEntry::Namespace(show.to_string()));

        self.transition(ProvisioningState::WritingPermissions);
        let backup = if lines.is_empty() {
            info!("No protection lines configured");
            None
        } else {
            apply_entries(backend, show, lines, self.options.backup_dir.as_deref())?
        };
        ledger.record(LedgerEntry::Permissions(lines.to_vec()));

        self.transition(ProvisioningState::MergingGroups);
        let mut groups = Vec::with_capacity(config.groups.len());
        for (template, spec) in &config.groups {
            match ensure_group(backend, template, spec, ctx) {
                Ok(record) => groups.push(record),
                Err(fault) => {
                    ledger.record(LedgerEntry::Groups(groups));
                    return Err(fault.into());
                }
            }
        }
        ledger.record(LedgerEntry::Groups(groups));

        self.transition(ProvisioningState::ProvisioningStreams);
        let mut streams = Vec::with_capacity(config.streams.len());
        for (template, spec) in &config.streams {
            match create_stream(backend, template, spec, ctx) {
                Ok(record) => streams.push(record),
                Err(failure) => {
                    streams.extend(failure.written);
                    ledger.record(LedgerEntry::Streams(streams));
                    return Err(failure.fault.into());
                }
            }
        }
        ledger.record(LedgerEntry::Streams(streams));

        Ok(backup)
    }

    /// Roll back whatever `ledger` holds and build the failure.
    fn fail(&mut self, error: ProvisionError, ledger: Ledger) -> ProvisioningFailure {
        let failed_in = self.state;
        error!("Provisioning failed while {}: {}", failed_in, error);

        let rollback = if ledger.is_empty() {
            None
        } else {
            self.transition(ProvisioningState::RollingBack);
            let report = roll_back(self.backend, &ledger);
            if report.is_complete() {
                info!("Rollback complete");
            } else {
                for failure in &report.failures {
                    error!("Rollback incomplete: {}", failure);
                }
            }
            Some(report)
        };

        self.transition(ProvisioningState::Failed);
        ProvisioningFailure {
            error,
            failed_in,
            state: self.state,
            ledger,
            rollback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use showsetup_backend::mock::{sample_protections, MockBackend};
    use showsetup_backend::ops;

    fn config() -> ProvisioningConfig {
        serde_json::from_str(
            r#"{
                "permissions": ["write group {show} * //{show}/...## {user} {mdy_str}"],
                "groups": {"{show}": "empty"},
                "streams": {"//{show}/{show}-main": {"type": "mainline"}}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_history_on_success() {
        let backend = MockBackend::new().with_protections(sample_protections());
        let config = config();
        let mut provisioner = Provisioner::new(&backend, &config, "tjen");
        provisioner.run("FOO").unwrap();
        assert_eq!(
            provisioner.history(),
            [
                ProvisioningState::Idle,
                ProvisioningState::Validating,
                ProvisioningState::CreatingNamespace,
                ProvisioningState::WritingPermissions,
                ProvisioningState::MergingGroups,
                ProvisioningState::ProvisioningStreams,
                ProvisioningState::Done,
            ]
        );
    }

    #[test]
    fn test_history_on_rollback() {
        let backend = MockBackend::new().with_protections(sample_protections());
        backend.fail_on(ops::WRITE_GROUP);
        let config = config();
        let mut provisioner = Provisioner::new(&backend, &config, "tjen");
        let failure = provisioner.run("FOO").unwrap_err();

        assert_eq!(failure.failed_in, ProvisioningState::MergingGroups);
        assert_eq!(
            &provisioner.history()[4..],
            [
                ProvisioningState::MergingGroups,
                ProvisioningState::RollingBack,
                ProvisioningState::Failed,
            ]
        );
    }

    #[test]
    fn test_create_namespace_fault_has_nothing_to_roll_back() {
        let backend = MockBackend::new().with_protections(sample_protections());
        backend.fail_on(ops::CREATE_NAMESPACE);
        let config = config();
        let failure = Provisioner::new(&backend, &config, "tjen")
            .run("FOO")
            .unwrap_err();

        assert_eq!(failure.failed_in, ProvisioningState::CreatingNamespace);
        assert!(failure.ledger.is_empty());
        assert!(failure.rollback.is_none());
        assert_eq!(failure.state, ProvisioningState::Failed);
    }

    #[test]
    fn test_failure_display_names_the_step() {
        let backend = MockBackend::new().with_protections(sample_protections());
        backend.fail_on(ops::WRITE_STREAM);
        let config = config();
        let failure = Provisioner::new(&backend, &config, "tjen")
            .run("FOO")
            .unwrap_err();
        assert_eq!(
            failure.to_string(),
            "Provisioning failed while provisioning streams: write_stream failed: injected fault on //FOO/FOO-main"
        );
    }
}
