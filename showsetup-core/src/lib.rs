//! Shared building blocks for show provisioning: show code validation,
//! configuration template rendering and terminal output macros.

pub mod output_macros;
pub mod template;
pub mod validation;

pub use template::Template;
pub use validation::{validate_show_code, ShowIdentifier, ValidationError};
