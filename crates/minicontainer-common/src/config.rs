//! Build-time container configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{MinicontainerError, Result};

/// Configuration for a single container launch.
///
/// Assembled from CLI flags by the `run` command and consumed by the launch
/// supervisor. Not persisted; the durable record is the container state.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference to resolve into a rootfs, if any.
    pub image: Option<String>,
    /// Caller-provided root filesystem path, if any.
    pub rootfs_path: Option<PathBuf>,
    /// Hostname inside the UTS namespace.
    pub hostname: Option<String>,
    /// Container name; defaults to the short ID.
    pub name: Option<String>,
    /// User environment variables in `KEY=VALUE` form.
    pub env: Vec<String>,
    /// Volume mounts in `host:container[:ro]` form.
    pub volumes: Vec<String>,
    /// Human-readable memory limit (e.g. `256m`, `1g`).
    pub memory_limit: Option<String>,
    /// CPU limit in fractional cores.
    pub cpu_limit: Option<f64>,
    /// Maximum number of processes.
    pub pids_limit: Option<u64>,
    /// Run in the background without waiting.
    pub detached: bool,
    /// Keep stdin attached.
    pub interactive: bool,
    /// Allocate a pseudo-terminal.
    pub allocate_tty: bool,
    /// Remove the container record when it exits.
    pub auto_remove: bool,
}

impl ContainerConfig {
    /// Validates the configuration before any resource is acquired.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed `env` or `volume` entries, or for a
    /// non-positive CPU limit.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.env {
            let Some((key, _)) = entry.split_once('=') else {
                return Err(MinicontainerError::Config {
                    message: format!("environment entry must be KEY=VALUE: {entry}"),
                });
            };
            if key.is_empty() {
                return Err(MinicontainerError::Config {
                    message: format!("environment entry has empty key: {entry}"),
                });
            }
        }
        for spec in &self.volumes {
            let parts: Vec<&str> = spec.split(':').collect();
            if !(2..=3).contains(&parts.len()) || parts[0].is_empty() || parts[1].is_empty() {
                return Err(MinicontainerError::Config {
                    message: format!("volume must be host:container[:ro]: {spec}"),
                });
            }
            if parts.len() == 3 && parts[2] != "ro" {
                return Err(MinicontainerError::Config {
                    message: format!("unknown volume option {}: {spec}", parts[2]),
                });
            }
        }
        if let Some(cpus) = self.cpu_limit {
            if cpus <= 0.0 {
                return Err(MinicontainerError::Config {
                    message: format!("cpu limit must be positive: {cpus}"),
                });
            }
        }
        Ok(())
    }
}
