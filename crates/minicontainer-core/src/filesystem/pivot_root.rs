//! Root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually swaps the root mount
//! rather than just the process's view of `/`, preventing escape through
//! open file descriptors to the old root.

use std::path::Path;

use minicontainer_common::error::{MinicontainerError, Result};

/// Directory inside the new root that briefly holds the old root.
///
/// Created by the supervisor in the parent namespace; doing it after user
/// namespace entry can fail on permission checks.
pub const PIVOT_DIR: &str = ".pivot_root";

/// Switches the root filesystem to `new_root`.
///
/// Performs the full pivot sequence:
/// 1. Bind-mount `new_root` onto itself (pivot_root requires a mount point).
/// 2. Change into `new_root`.
/// 3. `pivot_root(".", ".pivot_root")`: the working directory becomes the
///    new root and the old root is re-attached under [`PIVOT_DIR`].
/// 4. Change to `/`, lazily unmount the old root, and best-effort remove
///    the now-empty pivot directory.
///
/// # Errors
///
/// Returns an error if any mount, chdir, pivot, or unmount step fails.
#[cfg(target_os = "linux")]
pub fn pivot_root(new_root: &Path) -> Result<()> {
    use nix::mount::{mount, umount2, MntFlags, MsFlags};

    mount(
        Some(new_root),
        new_root,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| MinicontainerError::Syscall {
        op: "mount(rootfs self-bind)",
        source: e.into(),
    })?;

    std::env::set_current_dir(new_root).map_err(|e| MinicontainerError::Io {
        path: new_root.to_path_buf(),
        source: e,
    })?;

    nix::unistd::pivot_root(".", PIVOT_DIR).map_err(|e| MinicontainerError::Syscall {
        op: "pivot_root",
        source: e.into(),
    })?;

    std::env::set_current_dir("/").map_err(|e| MinicontainerError::Io {
        path: "/".into(),
        source: e,
    })?;

    let old_root = format!("/{PIVOT_DIR}");
    umount2(old_root.as_str(), MntFlags::MNT_DETACH).map_err(|e| MinicontainerError::Syscall {
        op: "umount(old root)",
        source: e.into(),
    })?;

    // May fail inside a user namespace; the empty directory is harmless.
    let _ = std::fs::remove_dir(&old_root);

    tracing::debug!(new_root = %new_root.display(), "pivot_root complete");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — `pivot_root` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn pivot_root(_new_root: &Path) -> Result<()> {
    Err(MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    })
}
