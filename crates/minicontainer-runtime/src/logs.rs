//! Container log files.
//!
//! Detached containers get their stdout and stderr wired straight into a
//! per-container log file at spawn time; attached containers write to the
//! supervisor's terminal instead, so their log is empty.

use std::path::{Path, PathBuf};

use minicontainer_common::error::{MinicontainerError, Result};

/// File name of the log inside the container directory.
const LOG_FILE: &str = "container.log";

/// Returns the log file path for a container directory.
#[must_use]
pub fn log_path(container_dir: &Path) -> PathBuf {
    container_dir.join(LOG_FILE)
}

/// Reads a container's log.
///
/// Returns an empty string if the container never wrote anything (or ran
/// attached).
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(container_dir: &Path) -> Result<String> {
    let path = log_path(container_dir);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(MinicontainerError::Io { path, source: e }),
    }
}
