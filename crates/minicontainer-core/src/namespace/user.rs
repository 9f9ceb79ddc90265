//! User namespace identity mapping.
//!
//! Maps container root (UID 0) to the invoking host user, enabling
//! rootless containers with a single 1:1 mapping.

use minicontainer_common::error::{MinicontainerError, Result};

/// Writes the identity UID/GID mapping for the calling process.
///
/// Intended to run in the child immediately after `clone` with
/// `CLONE_NEWUSER`: a process may map its own IDs through
/// `/proc/self/{uid_map,gid_map}` as long as the mapping targets its own
/// host IDs with size 1. `setgroups` must be denied before the GID map is
/// written.
///
/// # Errors
///
/// Returns an error if any of the three `/proc/self` writes fails.
#[cfg(target_os = "linux")]
pub fn map_root_to_current_user() -> Result<()> {
    use std::path::PathBuf;

    let uid = nix::unistd::getuid().as_raw();
    let gid = nix::unistd::getgid().as_raw();

    let write = |name: &str, content: String| -> Result<()> {
        let path = PathBuf::from("/proc/self").join(name);
        std::fs::write(&path, content).map_err(|e| MinicontainerError::Io { path, source: e })
    };

    write("setgroups", "deny".into())?;
    write("uid_map", format!("0 {uid} 1"))?;
    write("gid_map", format!("0 {gid} 1"))?;

    tracing::debug!(uid, gid, "identity user-namespace mapping written");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — user namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn map_root_to_current_user() -> Result<()> {
    Err(MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    })
}
