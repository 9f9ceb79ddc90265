//! Executing commands inside a running container.
//!
//! Joins the target's namespaces with `nsenter` rather than re-deriving
//! the setns dance here; the container's PID 1 already anchors the
//! namespaces we need.

use minicontainer_common::error::{MinicontainerError, Result};

use crate::state::ContainerState;

/// Runs a command inside a running container's namespaces.
///
/// Enters the mount, UTS, IPC, and PID namespaces of the recorded init
/// PID with the command's stdio inherited from the caller. Returns the
/// command's exit code.
///
/// # Errors
///
/// Returns `Config` for an empty command, `Conflict` if the container is
/// not running, or an I/O error if `nsenter` cannot be spawned.
#[cfg(target_os = "linux")]
pub fn exec_in_container(state: &ContainerState, command: &[String]) -> Result<i32> {
    use minicontainer_common::types::ContainerStatus;

    if command.is_empty() {
        return Err(MinicontainerError::Config {
            message: "exec requires a command".into(),
        });
    }
    if state.status != ContainerStatus::Running {
        return Err(MinicontainerError::Conflict {
            message: format!("container {} is not running", state.name),
        });
    }

    tracing::info!(id = %state.id.short(), pid = state.pid, cmd = ?command, "exec into container");

    let status = std::process::Command::new("nsenter")
        .args([
            "--target",
            &state.pid.to_string(),
            "--mount",
            "--uts",
            "--ipc",
            "--pid",
            "--",
        ])
        .args(command)
        .status()
        .map_err(|e| MinicontainerError::Io {
            path: "nsenter".into(),
            source: e,
        })?;

    Ok(status.code().unwrap_or(-1))
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — namespace entry requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn exec_in_container(_state: &ContainerState, _command: &[String]) -> Result<i32> {
    Err(MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    })
}
