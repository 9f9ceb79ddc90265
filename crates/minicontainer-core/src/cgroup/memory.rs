//! Memory resource control via cgroups v2.
//!
//! Parses human-readable limits and manages `memory.max`.

use std::path::Path;

use minicontainer_common::error::{MinicontainerError, Result};

/// Parses a human-readable memory limit into bytes.
///
/// Suffixes `k`/`K`, `m`/`M`, `g`/`G` are base-1024; a bare number is bytes.
/// The empty string parses to 0, meaning no limit.
///
/// # Errors
///
/// Returns an error if the numeric part is not a valid integer.
pub fn parse_memory(spec: &str) -> Result<u64> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(0);
    }
    let (number, multiplier) = match spec.as_bytes()[spec.len() - 1] {
        b'k' | b'K' => (&spec[..spec.len() - 1], 1024),
        b'm' | b'M' => (&spec[..spec.len() - 1], 1024 * 1024),
        b'g' | b'G' => (&spec[..spec.len() - 1], 1024 * 1024 * 1024),
        _ => (spec, 1),
    };
    let value: u64 = number.parse().map_err(|_| MinicontainerError::Config {
        message: format!("invalid memory limit: {spec}"),
    })?;
    Ok(value * multiplier)
}

/// Sets the hard memory limit for a cgroup.
///
/// Processes exceeding this limit are subject to the OOM killer.
///
/// # Errors
///
/// Returns an error if writing to `memory.max` fails.
pub fn set_memory_max(cgroup_path: &Path, bytes: u64) -> Result<()> {
    let file = cgroup_path.join("memory.max");
    std::fs::write(&file, bytes.to_string()).map_err(|e| MinicontainerError::Io {
        path: file,
        source: e,
    })?;
    tracing::debug!(bytes, "memory max limit set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_megabyte_suffix() {
        assert_eq!(parse_memory("256m").unwrap(), 256 * 1024 * 1024);
        assert_eq!(parse_memory("256M").unwrap(), 256 * 1024 * 1024);
    }

    #[test]
    fn parse_gigabyte_suffix() {
        assert_eq!(parse_memory("1g").unwrap(), 1_073_741_824);
    }

    #[test]
    fn parse_kilobyte_suffix() {
        assert_eq!(parse_memory("4k").unwrap(), 4096);
    }

    #[test]
    fn parse_bare_number_is_bytes() {
        assert_eq!(parse_memory("500").unwrap(), 500);
    }

    #[test]
    fn parse_empty_is_zero() {
        assert_eq!(parse_memory("").unwrap(), 0);
    }

    #[test]
    fn parse_garbage_is_rejected() {
        assert!(parse_memory("lots").is_err());
        assert!(parse_memory("12q").is_err());
    }
}
