//! Cgroups v2 resource management.
//!
//! Container cgroups live under `/sys/fs/cgroup/minicontainer/<id>` on the
//! unified hierarchy. The parent cgroup must have the `cpu`, `memory`, and
//! `pids` controllers delegated before any child is created.

pub mod cpu;
pub mod memory;
pub mod pids;

use std::path::{Path, PathBuf};

use minicontainer_common::constants::{CGROUP_PARENT, CGROUP_V2_PATH};
use minicontainer_common::error::{MinicontainerError, Result};

/// Controllers enabled for container cgroups.
const SUBTREE_CONTROLLERS: &str = "+cpu +memory +pids";

/// Handle to the cgroup of a specific container.
#[derive(Debug)]
pub struct CgroupManager {
    /// Path to this container's cgroup directory.
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    path: PathBuf,
}

/// Returns the parent cgroup path all container cgroups live under.
#[must_use]
pub fn parent_path() -> PathBuf {
    PathBuf::from(CGROUP_V2_PATH).join(CGROUP_PARENT)
}

#[cfg(target_os = "linux")]
impl CgroupManager {
    /// Creates (or re-creates) the cgroup for the given container ID.
    ///
    /// Ensures the parent cgroup exists with the required controllers
    /// delegated first. Re-creating an existing cgroup is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a cgroup directory cannot be created or the
    /// controller delegation write fails.
    pub fn create(container_id: &str) -> Result<Self> {
        ensure_parent()?;
        let path = parent_path().join(container_id);
        std::fs::create_dir_all(&path).map_err(|e| MinicontainerError::Io {
            path: path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "cgroup created");
        Ok(Self { path })
    }

    /// Returns a handle to an existing container cgroup without creating it.
    #[must_use]
    pub fn from_id(container_id: &str) -> Self {
        Self {
            path: parent_path().join(container_id),
        }
    }

    /// Returns the absolute path of this cgroup directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies resource limits to this cgroup.
    ///
    /// Absent limits leave the corresponding controller unlimited. A memory
    /// limit that parses to zero bytes is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if a limit cannot be parsed or a control file
    /// cannot be written.
    pub fn apply(
        &self,
        memory_limit: Option<&str>,
        cpu_limit: Option<f64>,
        pids_limit: Option<u64>,
    ) -> Result<()> {
        if let Some(spec) = memory_limit {
            let bytes = memory::parse_memory(spec)?;
            if bytes > 0 {
                memory::set_memory_max(&self.path, bytes)?;
            }
        }
        if let Some(cores) = cpu_limit {
            cpu::set_cpu_max(&self.path, cores)?;
        }
        if let Some(max) = pids_limit {
            pids::set_pids_max(&self.path, max)?;
        }
        Ok(())
    }

    /// Attaches a process to this cgroup by writing its PID.
    ///
    /// Must happen after the child has entered its namespaces and before it
    /// execs user code, so accounting covers the user process from its
    /// first instruction.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `cgroup.procs` fails.
    pub fn attach(&self, pid: i32) -> Result<()> {
        let procs = self.path.join("cgroup.procs");
        std::fs::write(&procs, pid.to_string()).map_err(|e| MinicontainerError::Io {
            path: procs,
            source: e,
        })?;
        tracing::debug!(pid, path = %self.path.display(), "process attached to cgroup");
        Ok(())
    }

    /// Removes the cgroup directory.
    ///
    /// Valid only once the supervised process has exited. A cgroup that is
    /// already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be removed.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_dir(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "cgroup removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MinicontainerError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// Creates the parent cgroup and delegates the controllers to its children.
///
/// Idempotent; concurrent supervisors may race this safely.
///
/// # Errors
///
/// Returns an error if the directory or the `cgroup.subtree_control` write
/// fails.
#[cfg(target_os = "linux")]
pub fn ensure_parent() -> Result<()> {
    let parent = parent_path();
    std::fs::create_dir_all(&parent).map_err(|e| MinicontainerError::Io {
        path: parent.clone(),
        source: e,
    })?;
    let control = parent.join("cgroup.subtree_control");
    std::fs::write(&control, SUBTREE_CONTROLLERS).map_err(|e| MinicontainerError::Io {
        path: control,
        source: e,
    })?;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
impl CgroupManager {
    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — cgroup management requires Linux.
    pub fn create(_container_id: &str) -> Result<Self> {
        Err(unsupported())
    }

    /// Stub for non-Linux platforms.
    #[must_use]
    pub fn from_id(container_id: &str) -> Self {
        Self {
            path: parent_path().join(container_id),
        }
    }

    /// Returns the absolute path of this cgroup directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — cgroup management requires Linux.
    pub fn apply(
        &self,
        _memory_limit: Option<&str>,
        _cpu_limit: Option<f64>,
        _pids_limit: Option<u64>,
    ) -> Result<()> {
        Err(unsupported())
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — cgroup management requires Linux.
    pub fn attach(&self, _pid: i32) -> Result<()> {
        Err(unsupported())
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — cgroup management requires Linux.
    pub fn remove(&self) -> Result<()> {
        Err(unsupported())
    }
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — cgroup management requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn ensure_parent() -> Result<()> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> MinicontainerError {
    MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    }
}
