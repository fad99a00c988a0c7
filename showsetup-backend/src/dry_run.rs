//! Gateway decorator that reads from the wrapped gateway and only logs
//! mutations.

use tracing::info;

use crate::objects::{GroupObject, StreamObject, WriteOutcome};
use crate::{Backend, Result};

#[derive(Debug)]
pub struct DryRunBackend<B> {
    inner: B,
}

impl<B: Backend> DryRunBackend<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Backend> Backend for DryRunBackend<B> {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn create_namespace(&self, name: &str) -> Result<()> {
        info!("[dry-run] Would create stream depot {}", name);
        Ok(())
    }

    fn namespace_exists(&self, name: &str) -> Result<bool> {
        self.inner.namespace_exists(name)
    }

    fn read_protection_table(&self) -> Result<Vec<String>> {
        self.inner.read_protection_table()
    }

    fn write_protection_table(&self, lines: &[String]) -> Result<()> {
        info!("[dry-run] Would write protection table ({} lines)", lines.len());
        Ok(())
    }

    fn read_group(&self, name: &str) -> Result<GroupObject> {
        self.inner.read_group(name)
    }

    fn write_group(&self, group: &GroupObject) -> Result<WriteOutcome> {
        let outcome = if self.inner.read_group(group.name())?.is_blank() {
            WriteOutcome::Created
        } else {
            WriteOutcome::Updated
        };
        info!("[dry-run] Would save group {} ({:?})", group.name(), outcome);
        Ok(outcome)
    }

    fn read_stream(&self, name: &str) -> Result<StreamObject> {
        self.inner.read_stream(name)
    }

    fn write_stream(&self, stream: &StreamObject) -> Result<WriteOutcome> {
        let outcome = if self.inner.read_stream(&stream.name)?.stream_type.is_none() {
            WriteOutcome::Created
        } else {
            WriteOutcome::Updated
        };
        info!("[dry-run] Would save stream {} ({:?})", stream.name, outcome);
        Ok(outcome)
    }

    fn bulk_copy(&self, source: &str, target: &str) -> Result<()> {
        info!("[dry-run] Would populate {} from {}", target, source);
        Ok(())
    }

    fn delete_namespace(&self, name: &str) -> Result<()> {
        info!("[dry-run] Would delete depot {}", name);
        Ok(())
    }

    fn bulk_delete(&self, pattern: &str) -> Result<()> {
        info!("[dry-run] Would obliterate {}", pattern);
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<()> {
        info!("[dry-run] Would delete group {}", name);
        Ok(())
    }

    fn delete_stream(&self, name: &str) -> Result<()> {
        info!("[dry-run] Would delete stream {}", name);
        Ok(())
    }
}
