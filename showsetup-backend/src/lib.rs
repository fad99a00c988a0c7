//! Perforce backend gateway.
//!
//! The orchestrator talks to Perforce only through the [`Backend`] trait: a
//! fixed set of remote operations, each of which either succeeds atomically
//! or fails with a [`BackendFault`]. Nothing here retries or spans several
//! operations; sequencing and compensation live in the orchestrator.

use thiserror::Error;

pub mod command;
pub mod dry_run;
pub mod form;
pub mod objects;
pub mod p4;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use command::ConnectionSettings;
pub use dry_run::DryRunBackend;
pub use form::SpecForm;
pub use objects::{GroupObject, StreamObject, WriteOutcome};
pub use p4::P4Backend;

/// Names of the gateway operations, used in faults and for fault injection.
pub mod ops {
    pub const CREATE_NAMESPACE: &str = "create_namespace";
    pub const NAMESPACE_EXISTS: &str = "namespace_exists";
    pub const READ_PROTECTION_TABLE: &str = "read_protection_table";
    pub const WRITE_PROTECTION_TABLE: &str = "write_protection_table";
    pub const READ_GROUP: &str = "read_group";
    pub const WRITE_GROUP: &str = "write_group";
    pub const READ_STREAM: &str = "read_stream";
    pub const WRITE_STREAM: &str = "write_stream";
    pub const BULK_COPY: &str = "bulk_copy";
    pub const DELETE_NAMESPACE: &str = "delete_namespace";
    pub const BULK_DELETE: &str = "bulk_delete";
    pub const DELETE_GROUP: &str = "delete_group";
    pub const DELETE_STREAM: &str = "delete_stream";
    pub const CONNECT: &str = "connect";
}

/// A remote operation failed: transport, protocol or server-side error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct BackendFault {
    pub operation: String,
    pub message: String,
}

impl BackendFault {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendFault>;

/// The remote operations show provisioning needs from Perforce.
///
/// Paths passed to [`Backend::bulk_copy`] and [`Backend::bulk_delete`] are
/// depot path patterns such as `//FOO/FOO-main/...`.
pub trait Backend {
    /// Short name of the gateway (e.g. "p4", "mock").
    fn name(&self) -> &'static str;

    /// Create a stream depot named `name`.
    fn create_namespace(&self, name: &str) -> Result<()>;

    /// Whether a depot named `name` exists.
    fn namespace_exists(&self, name: &str) -> Result<bool>;

    /// Current protection table lines, in order.
    fn read_protection_table(&self) -> Result<Vec<String>>;

    /// Replace the protection table with `lines`.
    fn write_protection_table(&self, lines: &[String]) -> Result<()>;

    /// The named group, or a blank group if it does not exist.
    fn read_group(&self, name: &str) -> Result<GroupObject>;

    /// Save `group`, reporting whether it was newly created.
    fn write_group(&self, group: &GroupObject) -> Result<WriteOutcome>;

    /// The named stream, or a blank stream if it does not exist.
    fn read_stream(&self, name: &str) -> Result<StreamObject>;

    /// Save `stream`, reporting whether it was newly created.
    fn write_stream(&self, stream: &StreamObject) -> Result<WriteOutcome>;

    /// Branch every file under `source` into `target`.
    fn bulk_copy(&self, source: &str, target: &str) -> Result<()>;

    /// Delete the depot spec `name`.
    fn delete_namespace(&self, name: &str) -> Result<()>;

    /// Permanently remove every file matching `pattern`.
    fn bulk_delete(&self, pattern: &str) -> Result<()>;

    /// Delete the group `name`.
    fn delete_group(&self, name: &str) -> Result<()>;

    /// Delete the stream spec `name`.
    fn delete_stream(&self, name: &str) -> Result<()>;
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }
    fn create_namespace(&self, name: &str) -> Result<()> {
        (**self).create_namespace(name)
    }
    fn namespace_exists(&self, name: &str) -> Result<bool> {
        (**self).namespace_exists(name)
    }
    fn read_protection_table(&self) -> Result<Vec<String>> {
        (**self).read_protection_table()
    }
    fn write_protection_table(&self, lines: &[String]) -> Result<()> {
        (**self).write_protection_table(lines)
    }
    fn read_group(&self, name: &str) -> Result<GroupObject> {
        (**self).read_group(name)
    }
    fn write_group(&self, group: &GroupObject) -> Result<WriteOutcome> {
        (**self).write_group(group)
    }
    fn read_stream(&self, name: &str) -> Result<StreamObject> {
        (**self).read_stream(name)
    }
    fn write_stream(&self, stream: &StreamObject) -> Result<WriteOutcome> {
        (**self).write_stream(stream)
    }
    fn bulk_copy(&self, source: &str, target: &str) -> Result<()> {
        (**self).bulk_copy(source, target)
    }
    fn delete_namespace(&self, name: &str) -> Result<()> {
        (**self).delete_namespace(name)
    }
    fn bulk_delete(&self, pattern: &str) -> Result<()> {
        (**self).bulk_delete(pattern)
    }
    fn delete_group(&self, name: &str) -> Result<()> {
        (**self).delete_group(name)
    }
    fn delete_stream(&self, name: &str) -> Result<()> {
        (**self).delete_stream(name)
    }
}

/// Creates the gateway for `settings`.
///
/// `dry_run` wraps the Perforce gateway so reads go to the server and
/// mutations are only logged. The `mock` gateway name is available with the
/// `test-helpers` feature.
pub fn get_backend(settings: &ConnectionSettings, dry_run: bool) -> Result<Box<dyn Backend>> {
    #[cfg(feature = "test-helpers")]
    if settings.binary == "mock" {
        return Ok(Box::new(
            mock::MockBackend::new().with_protections(mock::sample_protections()),
        ));
    }

    let backend = P4Backend::new(settings.clone())?;
    if dry_run {
        Ok(Box::new(DryRunBackend::new(backend)))
    } else {
        Ok(Box::new(backend))
    }
}

/// Strip a trailing `/...` wildcard from a depot path pattern.
pub fn path_root(pattern: &str) -> &str {
    pattern.strip_suffix("/...").unwrap_or(pattern)
}
