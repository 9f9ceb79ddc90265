//! Mount primitives for container filesystem setup.
//!
//! Bind mounts plus the `/proc` and `/sys` pseudo-filesystems mounted by
//! container init after `pivot_root`.

use std::path::Path;

use minicontainer_common::error::{MinicontainerError, Result};

/// Recursively marks the mount at `/` private.
///
/// Later mounts in this namespace then stop propagating to the host.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn make_root_private() -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_PRIVATE | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(/, MS_PRIVATE)",
        source: e.into(),
    })?;
    tracing::debug!("root mount marked private");
    Ok(())
}

/// Creates a recursive bind mount from `source` onto `target`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn bind_mount(source: &Path, target: &Path) -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(bind)",
        source: e.into(),
    })?;
    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        "bind mount created"
    );
    Ok(())
}

/// Remounts an existing bind mount read-only.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn remount_readonly(target: &Path) -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        None::<&str>,
        target,
        None::<&str>,
        MsFlags::MS_REMOUNT | MsFlags::MS_BIND | MsFlags::MS_RDONLY | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(remount,ro)",
        source: e.into(),
    })
}

/// Mounts a fresh `proc` on `/proc` for the new PID namespace.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_proc() -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::empty(),
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(/proc)",
        source: e.into(),
    })
}

/// Mounts `sysfs` read-only on `/sys`.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_sysfs_readonly() -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        Some("sysfs"),
        "/sys",
        Some("sysfs"),
        MsFlags::MS_RDONLY,
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(/sys)",
        source: e.into(),
    })
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount operations require Linux.
#[cfg(not(target_os = "linux"))]
pub fn make_root_private() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount operations require Linux.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount(_source: &Path, _target: &Path) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount operations require Linux.
#[cfg(not(target_os = "linux"))]
pub fn remount_readonly(_target: &Path) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount operations require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_proc() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — mount operations require Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_sysfs_readonly() -> Result<()> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> MinicontainerError {
    MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    }
}
