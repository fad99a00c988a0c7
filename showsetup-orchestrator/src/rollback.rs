//! Compensation for a partially provisioned show.
//!
//! Ledger entries are reversed in a fixed order regardless of the order they
//! were recorded in: streams, groups, permissions, then the namespace. Every
//! category is attempted even if an earlier one fails.

use std::fmt;

use showsetup_backend::{Backend, BackendFault};
use tracing::{info, warn};

use crate::ledger::{Ledger, LedgerCategory};
use crate::protections::remove_entries;

pub const ROLLBACK_ORDER: [LedgerCategory; 4] = [
    LedgerCategory::Streams,
    LedgerCategory::Groups,
    LedgerCategory::Permissions,
    LedgerCategory::Namespace,
];

/// One compensating action that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackFailure {
    pub category: LedgerCategory,
    pub target: String,
    pub message: String,
}

impl RollbackFailure {
    fn from_fault(category: LedgerCategory, target: &str, fault: BackendFault) -> Self {
        Self {
            category,
            target: target.to_string(),
            message: fault.to_string(),
        }
    }
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.category, self.target, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Categories fully reversed, in reversal order.
    pub reversed: Vec<LedgerCategory>,
    pub failures: Vec<RollbackFailure>,
}

impl RollbackReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures_in(&self, category: LedgerCategory) -> impl Iterator<Item = &RollbackFailure> {
        self.failures
            .iter()
            .filter(move |failure| failure.category == category)
    }
}

/// Collects the failures of one category.
struct Attempt<'a> {
    category: LedgerCategory,
    failures: &'a mut Vec<RollbackFailure>,
    failed: bool,
}

impl Attempt<'_> {
    fn check(&mut self, target: &str, result: showsetup_backend::Result<()>) {
        if let Err(fault) = result {
            warn!("Rollback of {} {} failed: {}", self.category, target, fault);
            self.failures
                .push(RollbackFailure::from_fault(self.category, target, fault));
            self.failed = true;
        }
    }

    fn fail(&mut self, target: &str, message: String) {
        warn!("Rollback of {} {} failed: {}", self.category, target, message);
        self.failures.push(RollbackFailure {
            category: self.category,
            target: target.to_string(),
            message,
        });
        self.failed = true;
    }
}

/// Undo what `ledger` records. Never fails; problems are in the report.
pub fn roll_back(backend: &dyn Backend, ledger: &Ledger) -> RollbackReport {
    let mut report = RollbackReport::default();

    for category in ROLLBACK_ORDER {
        if ledger.entry(category).is_none() {
            continue;
        }
        info!("Rolling back {}", category);

        let mut attempt = Attempt {
            category,
            failures: &mut report.failures,
            failed: false,
        };
        match category {
            LedgerCategory::Streams => reverse_streams(backend, ledger, &mut attempt),
            LedgerCategory::Groups => reverse_groups(backend, ledger, &mut attempt),
            LedgerCategory::Permissions => reverse_permissions(backend, ledger, &mut attempt),
            LedgerCategory::Namespace => reverse_namespace(backend, ledger, &mut attempt),
        }

        if !attempt.failed {
            report.reversed.push(category);
        }
    }

    report
}

fn reverse_streams(backend: &dyn Backend, ledger: &Ledger, attempt: &mut Attempt<'_>) {
    // Children before the parents they were branched from.
    for record in ledger.streams().iter().rev() {
        if !record.outcome.is_created() {
            continue;
        }
        attempt.check(&record.name, backend.bulk_delete(&format!("{}/...", record.name)));
        attempt.check(&record.name, backend.delete_stream(&record.name));
    }
}

fn reverse_groups(backend: &dyn Backend, ledger: &Ledger, attempt: &mut Attempt<'_>) {
    for record in ledger.groups().iter().rev() {
        if record.outcome.is_created() {
            attempt.check(&record.name, backend.delete_group(&record.name));
        }
    }
}

fn reverse_permissions(backend: &dyn Backend, ledger: &Ledger, attempt: &mut Attempt<'_>) {
    let inserted = ledger.permissions();
    if inserted.is_empty() {
        return;
    }

    let table = match backend.read_protection_table() {
        Ok(table) => table,
        Err(fault) => {
            attempt.check("protection table", Err(fault));
            return;
        }
    };

    let removal = remove_entries(&table, inserted);
    for line in &removal.missing {
        attempt.fail(line, "line no longer in the protection table".to_string());
    }
    if removal.table.len() != table.len() {
        attempt.check(
            "protection table",
            backend.write_protection_table(&removal.table),
        );
    }
}

fn reverse_namespace(backend: &dyn Backend, ledger: &Ledger, attempt: &mut Attempt<'_>) {
    let Some(name) = ledger.namespace() else {
        return;
    };
    attempt.check(name, backend.bulk_delete(&format!("//{name}/...")));
    attempt.check(name, backend.delete_namespace(name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{GroupRecord, LedgerEntry, StreamRecord};
    use showsetup_backend::mock::{sample_protections, MockBackend};
    use showsetup_backend::{ops, GroupObject, WriteOutcome};

    fn created(name: &str) -> GroupRecord {
        GroupRecord {
            name: name.to_string(),
            outcome: WriteOutcome::Created,
        }
    }

    #[test]
    fn test_empty_ledger_does_nothing() {
        let backend = MockBackend::new();
        let report = roll_back(&backend, &Ledger::new());
        assert!(report.is_complete());
        assert!(report.reversed.is_empty());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_only_created_groups_are_deleted() {
        let backend = MockBackend::new();
        backend.seed_group(GroupObject::blank("FOO"));
        backend.seed_group(GroupObject::blank("shared"));

        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Groups(vec![
            created("FOO"),
            GroupRecord {
                name: "shared".to_string(),
                outcome: WriteOutcome::Updated,
            },
        ]));

        let report = roll_back(&backend, &ledger);
        assert_eq!(report.reversed, [LedgerCategory::Groups]);
        assert!(backend.group("FOO").is_none());
        assert!(backend.group("shared").is_some());
    }

    #[test]
    fn test_categories_are_reversed_in_fixed_order() {
        let backend = MockBackend::new().with_protections(sample_protections());
        backend.seed_namespace("FOO");
        backend.seed_group(GroupObject::blank("FOO"));

        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Namespace("FOO".to_string()));
        ledger.record(LedgerEntry::Permissions(Vec::new()));
        ledger.record(LedgerEntry::Groups(vec![created("FOO")]));
        ledger.record(LedgerEntry::Streams(Vec::new()));

        let report = roll_back(&backend, &ledger);
        assert_eq!(report.reversed, ROLLBACK_ORDER);
        assert_eq!(
            backend.mutations(),
            ["delete_group FOO", "bulk_delete //FOO/...", "delete_namespace FOO"]
        );
    }

    #[test]
    fn test_streams_are_deleted_children_first() {
        let backend = MockBackend::new();
        backend.seed_namespace("FOO");
        for name in ["//FOO/FOO-main", "//FOO/FOO-dev"] {
            backend.seed_stream(showsetup_backend::StreamObject::blank(name));
        }
        backend.seed_file("//FOO/FOO-dev/a.txt");

        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Streams(vec![
            StreamRecord {
                name: "//FOO/FOO-main".to_string(),
                outcome: WriteOutcome::Created,
            },
            StreamRecord {
                name: "//FOO/FOO-dev".to_string(),
                outcome: WriteOutcome::Created,
            },
        ]));

        let report = roll_back(&backend, &ledger);
        assert!(report.is_complete());
        assert_eq!(
            backend.mutations(),
            [
                "bulk_delete //FOO/FOO-dev/...",
                "delete_stream //FOO/FOO-dev",
                "bulk_delete //FOO/FOO-main/...",
                "delete_stream //FOO/FOO-main",
            ]
        );
        assert!(backend.files_under("//FOO").is_empty());
    }

    #[test]
    fn test_permissions_reread_and_remove_inserted_lines() {
        let line = "write group FOO * //FOO/...".to_string();
        let mut table = sample_protections();
        table.insert(4, line.clone());
        let backend = MockBackend::new().with_protections(table);

        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Permissions(vec![line]));

        let report = roll_back(&backend, &ledger);
        assert_eq!(report.reversed, [LedgerCategory::Permissions]);
        assert_eq!(backend.protections(), sample_protections());
    }

    #[test]
    fn test_missing_permission_line_is_reported() {
        let backend = MockBackend::new().with_protections(sample_protections());
        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Permissions(vec![
            "write group FOO * //FOO/...".to_string(),
        ]));

        let report = roll_back(&backend, &ledger);
        assert!(report.reversed.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].category, LedgerCategory::Permissions);
        // Nothing was removed, so nothing is written.
        assert!(backend.mutations().is_empty());
    }

    #[test]
    fn test_failures_do_not_stop_later_categories() {
        let backend = MockBackend::new();
        backend.seed_namespace("FOO");
        backend.seed_group(GroupObject::blank("FOO"));
        backend.seed_group(GroupObject::blank("FOO-Art"));
        backend.fail_on_target(ops::DELETE_GROUP, "FOO");

        let mut ledger = Ledger::new();
        ledger.record(LedgerEntry::Namespace("FOO".to_string()));
        ledger.record(LedgerEntry::Groups(vec![created("FOO"), created("FOO-Art")]));

        let report = roll_back(&backend, &ledger);
        assert_eq!(report.reversed, [LedgerCategory::Namespace]);
        assert_eq!(report.failures_in(LedgerCategory::Groups).count(), 1);
        assert_eq!(report.failures[0].target, "FOO");
        assert!(backend.group("FOO-Art").is_none());
        assert!(!backend.namespace_exists("FOO").unwrap());
    }
}
