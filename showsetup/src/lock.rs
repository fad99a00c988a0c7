//! Per-server run lock.
//!
//! Two runs editing the same protection table would race on the
//! read-modify-write, so only one run per server may hold the lock.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use tracing::debug;

/// Held for the duration of a run; released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock for `port` in `dir` without waiting.
    pub fn acquire(dir: &Path, port: Option<&str>) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create lock directory {}", dir.display()))?;

        let path = dir.join(lock_file_name(port));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            bail!(
                "Another show setup run holds {}. Wait for it to finish or pass --no-lock.",
                path.display()
            );
        }
        debug!("Acquired run lock {}", path.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Closing the file releases the lock as well.
        let _ = self.file.unlock();
    }
}

/// `p4-showsetup-<port>.lock`, with the port reduced to filename-safe
/// characters. Unset ports share one lock.
pub fn lock_file_name(port: Option<&str>) -> String {
    let port = port.unwrap_or("default");
    let sanitized: String = port
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("p4-showsetup-{sanitized}.lock")
}

/// Platform state directory, falling back to the temp dir.
pub fn default_lock_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("p4-showsetup")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_file_name() {
        assert_eq!(lock_file_name(None), "p4-showsetup-default.lock");
        assert_eq!(
            lock_file_name(Some("ssl:perforce.example.com:1666")),
            "p4-showsetup-ssl_perforce.example.com_1666.lock"
        );
    }

    #[test]
    fn test_second_acquire_fails_until_released() {
        let temp = tempfile::tempdir().unwrap();
        let first = RunLock::acquire(temp.path(), Some("1666")).unwrap();
        assert!(first.path().is_file());

        let err = RunLock::acquire(temp.path(), Some("1666")).unwrap_err();
        assert!(err.to_string().contains("Another show setup run"));

        // Different servers do not contend.
        RunLock::acquire(temp.path(), Some("1667")).unwrap();

        drop(first);
        RunLock::acquire(temp.path(), Some("1666")).unwrap();
    }
}
