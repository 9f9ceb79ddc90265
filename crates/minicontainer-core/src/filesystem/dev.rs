//! Container `/dev` population.
//!
//! A tmpfs is mounted over `/dev` after `pivot_root`, then the essential
//! character devices are created with `mknod(2)`.

use minicontainer_common::error::{MinicontainerError, Result};

/// The device nodes every container gets: name, major, minor.
const DEVICE_NODES: &[(&str, u64, u64)] = &[
    ("/dev/null", 1, 3),
    ("/dev/zero", 1, 5),
    ("/dev/random", 1, 8),
    ("/dev/urandom", 1, 9),
    ("/dev/tty", 5, 0),
];

/// Mounts a tmpfs on `/dev` with `mode=755`.
///
/// Must be called after `pivot_root`, when `/` is the container's root.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_dev_tmpfs() -> Result<()> {
    use nix::mount::{mount, MsFlags};

    mount(
        Some("tmpfs"),
        "/dev",
        Some("tmpfs"),
        MsFlags::empty(),
        Some("mode=755"),
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(/dev)",
        source: e.into(),
    })
}

/// Creates the essential character device nodes in `/dev`, each mode 0666.
///
/// Must be called after [`mount_dev_tmpfs`].
///
/// # Errors
///
/// Returns an error if any `mknod(2)` call fails.
#[cfg(target_os = "linux")]
pub fn create_device_nodes() -> Result<()> {
    use nix::sys::stat::{makedev, mknod, Mode, SFlag};

    for &(path, major, minor) in DEVICE_NODES {
        mknod(
            path,
            SFlag::S_IFCHR,
            Mode::from_bits_truncate(0o666),
            makedev(major, minor),
        )
        .map_err(|e| MinicontainerError::Syscall {
            op: "mknod",
            source: e.into(),
        })?;
        tracing::debug!(path, major, minor, "device node created");
    }
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — `/dev` setup requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_dev_tmpfs() -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — `/dev` setup requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn create_device_nodes() -> Result<()> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> MinicontainerError {
    MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    }
}
