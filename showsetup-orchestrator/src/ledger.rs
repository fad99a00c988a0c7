//! Record of the mutations a run has completed.
//!
//! Entries are appended only after the server confirmed the mutation and are
//! consumed once by [`crate::rollback::roll_back`].

use std::fmt;

use showsetup_backend::WriteOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCategory {
    Namespace,
    Permissions,
    Groups,
    Streams,
}

impl fmt::Display for LedgerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LedgerCategory::Namespace => "namespace",
            LedgerCategory::Permissions => "permissions",
            LedgerCategory::Groups => "groups",
            LedgerCategory::Streams => "streams",
        };
        f.write_str(name)
    }
}

/// A group that was written during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    pub outcome: WriteOutcome,
}

/// A stream that was written during the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRecord {
    pub name: String,
    pub outcome: WriteOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Depot created.
    Namespace(String),
    /// Protection lines inserted, in table order.
    Permissions(Vec<String>),
    /// Groups written, in write order.
    Groups(Vec<GroupRecord>),
    /// Streams written, in write order.
    Streams(Vec<StreamRecord>),
}

impl LedgerEntry {
    pub fn category(&self) -> LedgerCategory {
        match self {
            LedgerEntry::Namespace(_) => LedgerCategory::Namespace,
            LedgerEntry::Permissions(_) => LedgerCategory::Permissions,
            LedgerEntry::Groups(_) => LedgerCategory::Groups,
            LedgerEntry::Streams(_) => LedgerCategory::Streams,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: Vec<LedgerEntry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Categories in the order they were recorded.
    pub fn categories(&self) -> Vec<LedgerCategory> {
        self.entries.iter().map(LedgerEntry::category).collect()
    }

    pub fn entry(&self, category: LedgerCategory) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.category() == category)
    }

    pub fn namespace(&self) -> Option<&str> {
        match self.entry(LedgerCategory::Namespace)? {
            LedgerEntry::Namespace(name) => Some(name),
            _ => None,
        }
    }

    pub fn permissions(&self) -> &[String] {
        match self.entry(LedgerCategory::Permissions) {
            Some(LedgerEntry::Permissions(lines)) => lines,
            _ => &[],
        }
    }

    pub fn groups(&self) -> &[GroupRecord] {
        match self.entry(LedgerCategory::Groups) {
            Some(LedgerEntry::Groups(records)) => records,
            _ => &[],
        }
    }

    pub fn streams(&self) -> &[StreamRecord] {
        match self.entry(LedgerCategory::Streams) {
            Some(LedgerEntry::Streams(records)) => records,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_follow_recorded_entries() {
        let mut ledger = Ledger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.namespace(), None);
        assert!(ledger.groups().is_empty());

        ledger.record(LedgerEntry::Namespace("FOO".to_string()));
        ledger.record(LedgerEntry::Permissions(vec!["write group FOO * //FOO/...".to_string()]));
        ledger.record(LedgerEntry::Groups(vec![GroupRecord {
            name: "FOO".to_string(),
            outcome: WriteOutcome::Created,
        }]));

        assert_eq!(ledger.len(), 3);
        assert_eq!(
            ledger.categories(),
            [
                LedgerCategory::Namespace,
                LedgerCategory::Permissions,
                LedgerCategory::Groups
            ]
        );
        assert_eq!(ledger.namespace(), Some("FOO"));
        assert_eq!(ledger.permissions().len(), 1);
        assert_eq!(ledger.groups()[0].name, "FOO");
        assert!(ledger.streams().is_empty());
    }
}
