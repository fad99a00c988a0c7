//! Stream creation and population.

use std::fmt;

use showsetup_backend::{Backend, BackendFault};
use showsetup_config::StreamTemplate;
use tracing::info;

use crate::context::ProvisioningContext;
use crate::ledger::StreamRecord;

/// A stream step that failed. `written` is set when the stream spec was
/// saved before the failure, so it can still be rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFailure {
    pub written: Option<StreamRecord>,
    pub fault: BackendFault,
}

impl From<BackendFault> for StreamFailure {
    fn from(fault: BackendFault) -> Self {
        Self {
            written: None,
            fault,
        }
    }
}

impl fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.fault, f)
    }
}

impl std::error::Error for StreamFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.fault)
    }
}

/// Where the new stream's files come from: the branch source if given,
/// otherwise the parent.
pub fn population_source(spec: &StreamTemplate, ctx: &ProvisioningContext) -> Option<String> {
    spec.branch
        .as_deref()
        .or(spec.parent.as_deref())
        .map(|source| ctx.resolve(source))
}

/// Save the stream named by `template` and populate it.
pub fn create_stream(
    backend: &dyn Backend,
    template: &str,
    spec: &StreamTemplate,
    ctx: &ProvisioningContext,
) -> Result<StreamRecord, StreamFailure> {
    let name = ctx.resolve(template);
    let mut stream = backend.read_stream(&name)?;
    stream.stream_type = Some(spec.stream_type);
    stream.description = ctx.created_by();
    if let Some(parent) = &spec.parent {
        stream.parent = Some(ctx.resolve(parent));
    }

    let outcome = backend.write_stream(&stream)?;
    info!("Stream {} {:?} ({})", name, outcome, spec.stream_type);
    let record = StreamRecord { name, outcome };

    if let Some(source) = population_source(spec, ctx) {
        let from = format!("{source}/...");
        let to = format!("{}/...", record.name);
        if let Err(fault) = backend.bulk_copy(&from, &to) {
            return Err(StreamFailure {
                written: Some(record),
                fault,
            });
        }
        info!("Populated {} from {}", to, from);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use showsetup_backend::mock::MockBackend;
    use showsetup_backend::{ops, StreamObject, WriteOutcome};
    use showsetup_config::StreamType;
    use showsetup_core::ShowIdentifier;

    fn ctx() -> ProvisioningContext {
        ProvisioningContext::new(
            ShowIdentifier::parse("FOO").unwrap(),
            "tjen",
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
    }

    fn spec(stream_type: StreamType, parent: Option<&str>, branch: Option<&str>) -> StreamTemplate {
        StreamTemplate {
            stream_type,
            parent: parent.map(str::to_string),
            branch: branch.map(str::to_string),
        }
    }

    fn seeded() -> MockBackend {
        let backend = MockBackend::new();
        backend.seed_namespace("FOO");
        backend.seed_namespace("template");
        backend.seed_stream(StreamObject {
            name: "//template/main".to_string(),
            stream_type: Some(StreamType::Mainline),
            parent: None,
            description: String::new(),
        });
        backend.seed_file("//template/main/Content/a.uasset");
        backend
    }

    #[test]
    fn test_mainline_without_source_is_empty() {
        let backend = seeded();
        let record = create_stream(
            &backend,
            "//{show}/{show}-main",
            &spec(StreamType::Mainline, None, None),
            &ctx(),
        )
        .unwrap();

        assert_eq!(record.name, "//FOO/FOO-main");
        assert_eq!(record.outcome, WriteOutcome::Created);
        let stream = backend.stream("//FOO/FOO-main").unwrap();
        assert_eq!(stream.stream_type, Some(StreamType::Mainline));
        assert_eq!(stream.description, "Created by tjen 1/2/2024");
        assert!(backend.files_under("//FOO/FOO-main").is_empty());
    }

    #[test]
    fn test_branch_takes_precedence_over_parent() {
        let backend = seeded();
        create_stream(&backend, "//{show}/{show}-main", &spec(StreamType::Mainline, None, None), &ctx())
            .unwrap();
        create_stream(
            &backend,
            "//{show}/{show}-dev",
            &spec(StreamType::Development, Some("//{show}/{show}-main"), Some("//template/main")),
            &ctx(),
        )
        .unwrap();

        let stream = backend.stream("//FOO/FOO-dev").unwrap();
        assert_eq!(stream.parent.as_deref(), Some("//FOO/FOO-main"));
        assert_eq!(
            backend.files_under("//FOO/FOO-dev"),
            ["//FOO/FOO-dev/Content/a.uasset"]
        );
    }

    #[test]
    fn test_parent_only_copies_parent() {
        let backend = seeded();
        backend.seed_stream(StreamObject {
            name: "//FOO/FOO-main".to_string(),
            stream_type: Some(StreamType::Mainline),
            parent: None,
            description: String::new(),
        });
        backend.seed_file("//FOO/FOO-main/readme.txt");

        create_stream(
            &backend,
            "//{show}/{show}-dev",
            &spec(StreamType::Development, Some("//{show}/{show}-main"), None),
            &ctx(),
        )
        .unwrap();
        assert!(backend
            .calls()
            .contains(&"bulk_copy //FOO/FOO-main/... //FOO/FOO-dev/...".to_string()));
        assert_eq!(backend.files_under("//FOO/FOO-dev"), ["//FOO/FOO-dev/readme.txt"]);
    }

    #[test]
    fn test_missing_parent_is_fault_before_write() {
        let backend = seeded();
        let failure = create_stream(
            &backend,
            "//{show}/{show}-dev",
            &spec(StreamType::Development, Some("//{show}/{show}-main"), None),
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(failure.written, None);
        assert_eq!(failure.fault.operation, ops::WRITE_STREAM);
    }

    #[test]
    fn test_copy_fault_reports_written_stream() {
        let backend = seeded();
        backend.fail_on(ops::BULK_COPY);
        let failure = create_stream(
            &backend,
            "//{show}/{show}-main",
            &spec(StreamType::Mainline, None, Some("//template/main")),
            &ctx(),
        )
        .unwrap_err();
        assert_eq!(
            failure.written,
            Some(StreamRecord {
                name: "//FOO/FOO-main".to_string(),
                outcome: WriteOutcome::Created,
            })
        );
        assert_eq!(failure.fault.operation, ops::BULK_COPY);
    }
}
