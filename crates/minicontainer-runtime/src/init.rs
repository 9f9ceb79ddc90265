//! The in-child init program.
//!
//! Runs once, top to bottom, inside the freshly cloned namespaces:
//! hostname, mount privatization, `pivot_root` with the pseudo-filesystem
//! mounts, optional controlling terminal, then an exec that replaces init
//! with the user command, which thereby becomes PID 1 of the new PID
//! namespace. Any step failure is fatal and the child exits nonzero.

use std::path::{Path, PathBuf};

use minicontainer_common::constants::{
    CONTAINER_PATH, CONTAINER_TERM, DEFAULT_HOSTNAME, ENV_HOSTNAME, ENV_ROOTFS, ENV_TTY,
    ENV_VAR_PREFIX,
};
use minicontainer_common::error::{MinicontainerError, Result};

/// Finalizes isolation and execs the user command.
///
/// Returns only on failure; on success the process image is replaced.
///
/// # Errors
///
/// Returns an error if any isolation step fails or the command cannot be
/// resolved.
#[cfg(target_os = "linux")]
pub fn run_init(command: &[String]) -> Result<()> {
    use std::ffi::CString;

    use minicontainer_core::filesystem::mount;

    let Some(program) = command.first() else {
        return Err(MinicontainerError::Config {
            message: "init requires a command".into(),
        });
    };

    let hostname =
        std::env::var(ENV_HOSTNAME).unwrap_or_else(|_| DEFAULT_HOSTNAME.to_string());
    nix::unistd::sethostname(&hostname).map_err(|e| MinicontainerError::Syscall {
        op: "sethostname",
        source: e.into(),
    })?;

    // Without this, the mounts below would leak into the host's namespace
    // on shared-propagation systems (the systemd default).
    mount::make_root_private()?;

    if let Ok(rootfs) = std::env::var(ENV_ROOTFS) {
        if !rootfs.is_empty() {
            setup_rootfs(Path::new(&rootfs))?;
        }
    }

    let path = lookup_program(program, CONTAINER_PATH).ok_or_else(|| {
        MinicontainerError::NotFound {
            kind: "command",
            id: program.clone(),
        }
    })?;

    let env = build_container_env(std::env::vars());

    let to_cstring = |s: &str| {
        CString::new(s).map_err(|_| MinicontainerError::Config {
            message: format!("argument contains NUL byte: {s}"),
        })
    };
    let path_c = to_cstring(&path.display().to_string())?;
    let argv: Vec<CString> = command
        .iter()
        .map(|a| to_cstring(a))
        .collect::<Result<_>>()?;
    let envp: Vec<CString> = env.iter().map(|e| to_cstring(e)).collect::<Result<_>>()?;

    tracing::debug!(program = %path.display(), "replacing init with user command");
    nix::unistd::execve(&path_c, &argv, &envp).map_err(|e| MinicontainerError::Syscall {
        op: "execve",
        source: e.into(),
    })?;
    unreachable!("execve returned without error")
}

/// Pivots into the rootfs and mounts `/proc`, `/sys`, and `/dev`.
#[cfg(target_os = "linux")]
fn setup_rootfs(rootfs: &Path) -> Result<()> {
    use minicontainer_core::filesystem::{dev, mount, pivot_root};

    pivot_root::pivot_root(rootfs)?;

    // Fresh proc for the new PID namespace, read-only kernel view, and a
    // minimal /dev.
    mount::mount_proc()?;
    mount::mount_sysfs_readonly()?;
    dev::mount_dev_tmpfs()?;
    dev::create_device_nodes()?;

    if std::env::var(ENV_TTY).as_deref() == Ok("1") {
        // Makes stdin the controlling terminal so job control works in
        // interactive shells. Best-effort, as in a user namespace it can
        // be refused.
        // SAFETY: plain ioctl on stdin with integer arguments.
        let rc = unsafe { libc::ioctl(0, libc::TIOCSCTTY as _, 0) };
        if rc != 0 {
            tracing::debug!("TIOCSCTTY refused, continuing without controlling tty");
        }
    }

    Ok(())
}

/// Resolves a program name against a `PATH` string.
///
/// Names containing a slash are used as-is; bare names are searched left
/// to right for an executable regular file.
fn lookup_program(program: &str, path_env: &str) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let is_executable = |p: &Path| {
        p.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    };

    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }
    path_env
        .split(':')
        .map(|dir| Path::new(dir).join(program))
        .find(|candidate| is_executable(candidate))
}

/// Builds the container environment from the fixed base plus the
/// forwarded `MINICONTAINER_ENV_*` variables with the prefix stripped.
fn build_container_env(parent_env: impl Iterator<Item = (String, String)>) -> Vec<String> {
    let mut env = vec![
        format!("PATH={CONTAINER_PATH}"),
        format!("TERM={CONTAINER_TERM}"),
    ];
    for (key, value) in parent_env {
        if let Some(stripped) = key.strip_prefix(ENV_VAR_PREFIX) {
            env.push(format!("{stripped}={value}"));
        }
    }
    env
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — container init requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn run_init(_command: &[String]) -> Result<()> {
    Err(MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    })
}
