//! In-memory gateway for tests.
//!
//! Holds depots, the protection table, groups, streams and depot files, and
//! records every call. Faults can be injected per operation, per target or on
//! the n-th call of an operation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::objects::{GroupObject, StreamObject, WriteOutcome};
use crate::{ops, path_root, Backend, BackendFault, Result};

/// Operations that change server state.
pub const MUTATING_OPS: &[&str] = &[
    ops::CREATE_NAMESPACE,
    ops::WRITE_PROTECTION_TABLE,
    ops::WRITE_GROUP,
    ops::WRITE_STREAM,
    ops::BULK_COPY,
    ops::DELETE_NAMESPACE,
    ops::BULK_DELETE,
    ops::DELETE_GROUP,
    ops::DELETE_STREAM,
];

/// A protection table with the depot specific region in place.
pub fn sample_protections() -> Vec<String> {
    [
        "super user admin * //...",
        "write group everyone * //depot/...",
        "## START OF DEPOT SPECIFIC PERMISSIONS",
        "write group ALPHA * //ALPHA/...## Created by admin 1/1/2024",
        "write group ZULU * //ZULU/...## Created by admin 1/1/2024",
        "## END OF DEPOT SPECIFIC PERMISSIONS",
        "list user * * -//spec/...",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}

/// Server state held by the mock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockState {
    pub namespaces: BTreeSet<String>,
    pub protections: Vec<String>,
    pub groups: BTreeMap<String, GroupObject>,
    pub streams: BTreeMap<String, StreamObject>,
    pub files: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct FaultRule {
    operation: String,
    target: Option<String>,
    nth: Option<usize>,
}

impl FaultRule {
    fn matches(&self, operation: &str, target: &str, count: usize) -> bool {
        self.operation == operation
            && self.target.as_deref().map_or(true, |wanted| wanted == target)
            && self.nth.map_or(true, |nth| nth == count)
    }
}

#[derive(Debug, Default)]
struct Inner {
    state: MockState,
    calls: Vec<String>,
    faults: Vec<FaultRule>,
    counts: HashMap<String, usize>,
}

impl Inner {
    /// Journal the call and apply any injected fault.
    fn enter(&mut self, operation: &str, target: &str) -> Result<()> {
        self.calls.push(format!("{operation} {target}").trim_end().to_string());
        let count = self.counts.entry(operation.to_string()).or_insert(0);
        *count += 1;
        let count = *count;

        if self
            .faults
            .iter()
            .any(|rule| rule.matches(operation, target, count))
        {
            return Err(BackendFault::new(
                operation,
                format!("injected fault on {target}"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Mutex<Inner>,
}

fn depot_of(path: &str) -> Option<&str> {
    path.split('/').nth(2).filter(|depot| !depot.is_empty())
}

fn under(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_protections(self, lines: Vec<String>) -> Self {
        self.lock().state.protections = lines;
        self
    }

    pub fn seed_namespace(&self, name: &str) {
        self.lock().state.namespaces.insert(name.to_string());
    }

    pub fn seed_group(&self, group: GroupObject) {
        self.lock()
            .state
            .groups
            .insert(group.name().to_string(), group);
    }

    pub fn seed_stream(&self, stream: StreamObject) {
        self.lock().state.streams.insert(stream.name.clone(), stream);
    }

    pub fn seed_file(&self, path: &str) {
        self.lock().state.files.insert(path.to_string());
    }

    /// Fail every call of `operation`.
    pub fn fail_on(&self, operation: &str) {
        self.lock().faults.push(FaultRule {
            operation: operation.to_string(),
            target: None,
            nth: None,
        });
    }

    /// Fail calls of `operation` whose target (name or path) is `target`.
    pub fn fail_on_target(&self, operation: &str, target: &str) {
        self.lock().faults.push(FaultRule {
            operation: operation.to_string(),
            target: Some(target.to_string()),
            nth: None,
        });
    }

    /// Fail the `nth` call (1-based) of `operation`.
    pub fn fail_on_nth(&self, operation: &str, nth: usize) {
        self.lock().faults.push(FaultRule {
            operation: operation.to_string(),
            target: None,
            nth: Some(nth),
        });
    }

    pub fn snapshot(&self) -> MockState {
        self.lock().state.clone()
    }

    /// Every call made so far, as `"<operation> <target>"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Calls that change server state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                let operation = call.split(' ').next().unwrap_or_default();
                MUTATING_OPS.contains(&operation)
            })
            .collect()
    }

    pub fn protections(&self) -> Vec<String> {
        self.lock().state.protections.clone()
    }

    pub fn group(&self, name: &str) -> Option<GroupObject> {
        self.lock().state.groups.get(name).cloned()
    }

    pub fn stream(&self, name: &str) -> Option<StreamObject> {
        self.lock().state.streams.get(name).cloned()
    }

    /// Files below the depot path `root` (a trailing `/...` is ignored).
    pub fn files_under(&self, root: &str) -> Vec<String> {
        let root = path_root(root);
        self.lock()
            .state
            .files
            .iter()
            .filter(|file| under(file, root))
            .cloned()
            .collect()
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn create_namespace(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::CREATE_NAMESPACE, name)?;
        if !inner.state.namespaces.insert(name.to_string()) {
            return Err(BackendFault::new(
                ops::CREATE_NAMESPACE,
                format!("Depot {name} already exists."),
            ));
        }
        Ok(())
    }

    fn namespace_exists(&self, name: &str) -> Result<bool> {
        let mut inner = self.lock();
        inner.enter(ops::NAMESPACE_EXISTS, name)?;
        Ok(inner
            .state
            .namespaces
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(name)))
    }

    fn read_protection_table(&self) -> Result<Vec<String>> {
        let mut inner = self.lock();
        inner.enter(ops::READ_PROTECTION_TABLE, "")?;
        Ok(inner.state.protections.clone())
    }

    fn write_protection_table(&self, lines: &[String]) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::WRITE_PROTECTION_TABLE, "")?;
        inner.state.protections = lines.to_vec();
        Ok(())
    }

    fn read_group(&self, name: &str) -> Result<GroupObject> {
        let mut inner = self.lock();
        inner.enter(ops::READ_GROUP, name)?;
        Ok(inner
            .state
            .groups
            .get(name)
            .cloned()
            .unwrap_or_else(|| GroupObject::blank(name)))
    }

    fn write_group(&self, group: &GroupObject) -> Result<WriteOutcome> {
        let mut inner = self.lock();
        inner.enter(ops::WRITE_GROUP, group.name())?;
        let previous = inner
            .state
            .groups
            .insert(group.name().to_string(), group.clone());
        Ok(if previous.is_some() {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        })
    }

    fn read_stream(&self, name: &str) -> Result<StreamObject> {
        let mut inner = self.lock();
        inner.enter(ops::READ_STREAM, name)?;
        Ok(inner
            .state
            .streams
            .get(name)
            .cloned()
            .unwrap_or_else(|| StreamObject::blank(name)))
    }

    fn write_stream(&self, stream: &StreamObject) -> Result<WriteOutcome> {
        let mut inner = self.lock();
        inner.enter(ops::WRITE_STREAM, &stream.name)?;

        let depot = depot_of(&stream.name).unwrap_or_default();
        if !inner.state.namespaces.contains(depot) {
            return Err(BackendFault::new(
                ops::WRITE_STREAM,
                format!("Stream depot {depot} does not exist."),
            ));
        }
        if let Some(parent) = &stream.parent {
            if !inner.state.streams.contains_key(parent) {
                return Err(BackendFault::new(
                    ops::WRITE_STREAM,
                    format!("Parent stream {parent} does not exist."),
                ));
            }
        }

        let previous = inner
            .state
            .streams
            .insert(stream.name.clone(), stream.clone());
        Ok(if previous.is_some() {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Created
        })
    }

    fn bulk_copy(&self, source: &str, target: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::BULK_COPY, &format!("{source} {target}"))?;

        let source_root = path_root(source);
        let target_root = path_root(target);
        if !inner.state.streams.contains_key(target_root) {
            return Err(BackendFault::new(
                ops::BULK_COPY,
                format!("{target_root} is not a stream."),
            ));
        }

        let copies: Vec<String> = inner
            .state
            .files
            .iter()
            .filter_map(|file| {
                file.strip_prefix(source_root)
                    .filter(|rest| rest.starts_with('/'))
                    .map(|rest| format!("{target_root}{rest}"))
            })
            .collect();
        if copies.is_empty() {
            return Err(BackendFault::new(
                ops::BULK_COPY,
                format!("{source} - no such file(s)."),
            ));
        }
        inner.state.files.extend(copies);
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::DELETE_NAMESPACE, name)?;

        let root = format!("//{name}");
        if inner.state.files.iter().any(|file| under(file, &root)) {
            return Err(BackendFault::new(
                ops::DELETE_NAMESPACE,
                format!("Depot {name} isn't empty of files."),
            ));
        }
        if !inner.state.namespaces.remove(name) {
            return Err(BackendFault::new(
                ops::DELETE_NAMESPACE,
                format!("Depot {name} doesn't exist."),
            ));
        }
        inner.state.streams.retain(|stream, _| !under(stream, &root));
        Ok(())
    }

    fn bulk_delete(&self, pattern: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::BULK_DELETE, pattern)?;
        let root = path_root(pattern).to_string();
        inner.state.files.retain(|file| !under(file, &root));
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::DELETE_GROUP, name)?;
        if inner.state.groups.remove(name).is_none() {
            return Err(BackendFault::new(
                ops::DELETE_GROUP,
                format!("Group {name} doesn't exist."),
            ));
        }
        Ok(())
    }

    fn delete_stream(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.enter(ops::DELETE_STREAM, name)?;
        if inner.state.streams.remove(name).is_none() {
            return Err(BackendFault::new(
                ops::DELETE_STREAM,
                format!("Stream {name} doesn't exist."),
            ));
        }
        Ok(())
    }
}
