//! Show code validation.
//!
//! A show code becomes the depot name, the prefix of every protection line,
//! group name and stream path, and a directory on artist workstations. The
//! rules here reject codes that would collide with any of those uses.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fmt;

use once_cell::sync::Lazy;
use thiserror::Error;

/// Shortest accepted show code.
pub const MIN_SHOW_CODE_LEN: usize = 2;
/// Longest accepted show code.
pub const MAX_SHOW_CODE_LEN: usize = 8;

/// Names that can never be used as a show code.
///
/// Pipeline directory names, common environment variables and a handful of
/// site tools all share the namespace show codes live in.
pub const PRECIOUS_NAMES: &[&str] = &[
    // pipeline directories
    "CG", "ELEMENT", "ENV", "OUT", "REF", "REI", "SCAN", "SIM", "TEST",
    // environment variables
    "HOME", "HOST", "LANG", "PATH", "PWD", "SHELL", "TEMP", "TERM", "TMP", "USER",
    // pipeline scopes
    "SHOW", "SITE", "SHOT",
    // internal tool
    "WEED",
];

static WINDOWS_RESERVED_NAMES: Lazy<HashSet<String>> = Lazy::new(|| {
    let mut names: HashSet<String> = ["CON", "PRN", "AUX", "NUL", "CONIN$", "CONOUT$"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    for suffix in ['1', '2', '3', '4', '5', '6', '7', '8', '9', '¹', '²', '³'] {
        names.insert(format!("COM{suffix}"));
        names.insert(format!("LPT{suffix}"));
    }
    names
});

/// A single broken naming rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Show code data type invalid: {0}")]
    InvalidType(String),

    #[error("Show code can not be empty")]
    Empty,

    #[error("Show code can not start with a number")]
    LeadingDigit,

    #[error("Show code length must be at least 2 characters")]
    TooShort,

    #[error("Show code length must be at most 8 characters")]
    TooLong,

    #[error("{0} is a precious name and can not be used as a show code")]
    PreciousName(String),

    #[error("Show code causes error when creating a directory on Windows")]
    WindowsReserved,
}

/// Validate a proposed show code against the naming rules.
///
/// Returns every rule the candidate breaks; an empty list means the code is
/// usable. Undecodable and empty input stop the checks early since no other
/// rule can be evaluated meaningfully.
pub fn validate_show_code<S: AsRef<OsStr>>(candidate: S) -> Vec<ValidationError> {
    let Some(show) = candidate.as_ref().to_str() else {
        return vec![ValidationError::InvalidType(
            "not valid UTF-8".to_string(),
        )];
    };

    if show.is_empty() {
        return vec![ValidationError::Empty];
    }

    let mut errors = Vec::new();

    if show.chars().next().is_some_and(is_digit) {
        errors.push(ValidationError::LeadingDigit);
    }

    let len = show.chars().count();
    if len < MIN_SHOW_CODE_LEN {
        errors.push(ValidationError::TooShort);
    }
    if len > MAX_SHOW_CODE_LEN {
        errors.push(ValidationError::TooLong);
    }

    if PRECIOUS_NAMES.contains(&show) {
        errors.push(ValidationError::PreciousName(show.to_string()));
    }

    if is_windows_reserved(show) {
        errors.push(ValidationError::WindowsReserved);
    }

    errors
}

/// Decimal digits, including their superscript and subscript forms.
/// Fractions and roman numerals do not count.
fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '¹' | '²' | '³' | '⁰' | '⁴'..='⁹' | '₀'..='₉')
}

/// Whether `name` maps onto a reserved device name under Windows path rules.
///
/// Only the last path component counts; anything after the first `.` or `:`
/// and trailing spaces are ignored, matching how Windows resolves `CON.txt`.
pub fn is_windows_reserved(name: &str) -> bool {
    let tail = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let stem = tail.split('.').next().unwrap_or(tail);
    let stem = stem.split(':').next().unwrap_or(stem).trim_end_matches(' ');
    WINDOWS_RESERVED_NAMES.contains(&stem.to_uppercase())
}

/// A show code that passed [`validate_show_code`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShowIdentifier(String);

impl ShowIdentifier {
    /// Validate `candidate` and wrap it, or return every broken rule.
    pub fn parse<S: AsRef<OsStr>>(candidate: S) -> Result<Self, Vec<ValidationError>> {
        let errors = validate_show_code(candidate.as_ref());
        if !errors.is_empty() {
            return Err(errors);
        }
        // validate_show_code rejects non UTF-8 input above
        let show = candidate.as_ref().to_string_lossy().into_owned();
        Ok(Self(show))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ShowIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShowIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
