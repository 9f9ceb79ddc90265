//! CPU resource control via cgroups v2.
//!
//! Translates fractional cores into the `cpu.max` quota/period form.

use std::path::Path;

use minicontainer_common::error::{MinicontainerError, Result};

/// Scheduling period in microseconds used for all containers.
const CPU_PERIOD_US: u64 = 100_000;

/// Formats a fractional-core limit as a `cpu.max` value.
///
/// The quota is `round(cores * period)` against the fixed 100000 µs period,
/// so `0.5` cores becomes `50000 100000`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_cpu_max(cores: f64) -> String {
    let quota = (cores * CPU_PERIOD_US as f64).round() as u64;
    format!("{quota} {CPU_PERIOD_US}")
}

/// Sets the CPU bandwidth limit for a cgroup.
///
/// # Errors
///
/// Returns an error if writing to `cpu.max` fails.
pub fn set_cpu_max(cgroup_path: &Path, cores: f64) -> Result<()> {
    let file = cgroup_path.join("cpu.max");
    let value = format_cpu_max(cores);
    std::fs::write(&file, &value).map_err(|e| MinicontainerError::Io {
        path: file,
        source: e,
    })?;
    tracing::debug!(cores, value, "cpu max limit set");
    Ok(())
}
