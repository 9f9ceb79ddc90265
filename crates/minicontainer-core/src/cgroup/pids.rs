//! Process-count control via cgroups v2.

use std::path::Path;

use minicontainer_common::error::{MinicontainerError, Result};

/// Sets the maximum number of processes for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `pids.max` fails.
pub fn set_pids_max(cgroup_path: &Path, max: u64) -> Result<()> {
    let file = cgroup_path.join("pids.max");
    std::fs::write(&file, max.to_string()).map_err(|e| MinicontainerError::Io {
        path: file,
        source: e,
    })?;
    tracing::debug!(max, "pids max limit set");
    Ok(())
}
