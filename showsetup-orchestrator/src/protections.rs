//! Protection table editing.
//!
//! New shows get their lines inside the depot specific region, kept in
//! case-insensitive order of the depot name. Lines outside the region are
//! never touched.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use showsetup_backend::Backend;
use tracing::{debug, info};

use crate::error::{ProvisionError, Result};

pub const START_MARKER: &str = "START OF DEPOT SPECIFIC PERMISSIONS";
pub const END_MARKER: &str = "END OF DEPOT SPECIFIC PERMISSIONS";

/// Depot name of a protection line: the second `/` separated path segment.
fn depot_token(line: &str) -> Option<&str> {
    line.split('/').nth(2)
}

/// Lines already granting access below `//{show}/`.
pub fn find_duplicates(table: &[String], show: &str) -> Vec<String> {
    let prefix = format!("//{show}/");
    table
        .iter()
        .filter(|line| line.contains(&prefix))
        .cloned()
        .collect()
}

/// Position at which lines for `show` belong.
fn insertion_index(table: &[String], show: &str) -> Result<usize> {
    let wanted = show.to_uppercase();
    let mut inside = false;
    let mut seen_start = false;

    for (index, line) in table.iter().enumerate() {
        if line.contains(START_MARKER) {
            inside = true;
            seen_start = true;
            continue;
        }
        if !inside {
            continue;
        }
        if line.contains(END_MARKER) {
            return Ok(index);
        }
        let Some(token) = depot_token(line) else {
            continue;
        };
        if token.to_uppercase() > wanted {
            return Ok(index);
        }
    }

    if seen_start {
        Err(ProvisionError::MissingMarker(END_MARKER))
    } else {
        Err(ProvisionError::MissingMarker(START_MARKER))
    }
}

/// Insert `new_lines` for `show` into a copy of `table`.
///
/// Fails without changing anything if any line already mentions
/// `//{show}/` or if the region markers are missing.
pub fn insert_entries(table: &[String], show: &str, new_lines: &[String]) -> Result<Vec<String>> {
    let duplicates = find_duplicates(table, show);
    if !duplicates.is_empty() {
        return Err(ProvisionError::DuplicateEntry {
            show: show.to_string(),
            lines: duplicates,
        });
    }

    let index = insertion_index(table, show)?;
    debug!("Inserting {} protection lines at {}", new_lines.len(), index);

    let mut updated = Vec::with_capacity(table.len() + new_lines.len());
    updated.extend_from_slice(&table[..index]);
    updated.extend_from_slice(new_lines);
    updated.extend_from_slice(&table[index..]);
    Ok(updated)
}

/// Lines left after removing one occurrence of each of `lines`, and the
/// lines that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub table: Vec<String>,
    pub missing: Vec<String>,
}

/// Range of lines between the region markers, or the whole table when the
/// start marker is missing.
fn region_bounds(table: &[String]) -> (usize, usize) {
    let Some(start) = table.iter().position(|line| line.contains(START_MARKER)) else {
        return (0, table.len());
    };
    let end = table[start + 1..]
        .iter()
        .position(|line| line.contains(END_MARKER))
        .map_or(table.len(), |offset| start + 1 + offset);
    (start + 1, end)
}

/// Remove one occurrence of each of `lines`, looking only inside the depot
/// specific region so identical lines elsewhere survive.
pub fn remove_entries(table: &[String], lines: &[String]) -> Removal {
    let mut remaining = table.to_vec();
    let mut missing = Vec::new();
    for line in lines {
        let (start, end) = region_bounds(&remaining);
        match remaining[start..end].iter().position(|existing| existing == line) {
            Some(offset) => {
                remaining.remove(start + offset);
            }
            None => missing.push(line.clone()),
        }
    }
    Removal {
        table: remaining,
        missing,
    }
}

/// Run the insertion against a fresh read of the live table without writing.
pub fn check_entries(backend: &dyn Backend, show: &str, new_lines: &[String]) -> Result<()> {
    let table = backend.read_protection_table()?;
    insert_entries(&table, show, new_lines)?;
    Ok(())
}

/// Read the live table, insert the lines and write it back. When
/// `backup_dir` is set, the table as read is saved there first and the
/// backup path is returned.
pub fn apply_entries(
    backend: &dyn Backend,
    show: &str,
    new_lines: &[String],
    backup_dir: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let table = backend.read_protection_table()?;
    let updated = insert_entries(&table, show, new_lines)?;

    let backup = match backup_dir {
        Some(dir) => Some(write_backup(dir, show, &table)?),
        None => None,
    };

    backend.write_protection_table(&updated)?;
    info!("Added {} protection lines for {}", new_lines.len(), show);
    Ok(backup)
}

/// Save `table` as `protections-{show}-{timestamp}.txt` in `dir`.
pub fn write_backup(dir: &Path, show: &str, table: &[String]) -> Result<PathBuf> {
    let path = dir.join(format!(
        "protections-{}-{}.txt",
        show,
        Local::now().format("%Y%m%d-%H%M%S")
    ));
    let backup_error = |source| ProvisionError::Backup {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(backup_error)?;

    let mut contents = table.join("\n");
    contents.push('\n');

    let mut temp_file = tempfile::Builder::new()
        .prefix("protections-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(backup_error)?;
    temp_file
        .write_all(contents.as_bytes())
        .map_err(backup_error)?;
    temp_file
        .persist(&path)
        .map_err(|e| backup_error(e.error))?;

    info!("Protection table backed up to {}", path.display());
    Ok(path)
}
