use std::io;
use std::path::PathBuf;

use showsetup_backend::BackendFault;
use showsetup_core::ValidationError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid show code: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Depot {0} already exists")]
    NamespaceExists(String),

    #[error("Permissions for {show} already exist: {}", .lines.join(" | "))]
    DuplicateEntry { show: String, lines: Vec<String> },

    #[error("Protection table has no '{0}' marker")]
    MissingMarker(&'static str),

    #[error("Failed to back up protection table to {path}: {source}")]
    Backup { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Backend(#[from] BackendFault),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProvisionError {
    /// Errors raised by local checks rather than by the server.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProvisionError::Validation(_)
                | ProvisionError::NamespaceExists(_)
                | ProvisionError::DuplicateEntry { .. }
                | ProvisionError::MissingMarker(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_every_error() {
        let err = ProvisionError::Validation(vec![
            ValidationError::LeadingDigit,
            ValidationError::TooShort,
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid show code: Show code can not start with a number; \
             Show code length must be at least 2 characters"
        );
    }

    #[test]
    fn test_backend_fault_is_transparent() {
        let err = ProvisionError::from(BackendFault::new("write_group", "boom"));
        assert_eq!(err.to_string(), "write_group failed: boom");
        assert!(!err.is_precondition());
    }
}
