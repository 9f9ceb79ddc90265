//! Namespaced child creation via the two-phase re-exec pattern.
//!
//! The supervisor cannot finish isolation itself: `pivot_root` and the
//! pseudo-filesystem mounts must run inside the new namespaces. So the
//! child is created with `clone(2)` carrying the namespace flags, and the
//! first thing it does is re-exec the current binary with the hidden
//! `init` subcommand, which completes setup and execs the user command.
//! Configuration crosses the exec boundary through `MINICONTAINER_*`
//! environment variables.

use std::os::fd::OwnedFd;
use std::path::Path;

use minicontainer_common::config::ContainerConfig;
use minicontainer_common::constants::{
    ENV_HOSTNAME, ENV_ROOTFS, ENV_TTY, ENV_VAR_PREFIX, ENV_VOLUME_PREFIX,
};
use minicontainer_common::error::Result;
use minicontainer_core::namespace::NamespaceConfig;

/// Stack size for the cloned child, generous for the short init path.
#[cfg(target_os = "linux")]
const CHILD_STACK_SIZE: usize = 1024 * 1024;

/// How the child's stdio is wired at spawn time.
#[derive(Debug)]
pub enum ChildStdio {
    /// Inherit all three descriptors from the supervisor.
    Inherit,
    /// Inherit stdout/stderr; stdin reads from `/dev/null`.
    InheritOutputOnly {
        /// Open `/dev/null` descriptor for stdin.
        devnull: OwnedFd,
    },
    /// All three descriptors on the PTY slave.
    Pty {
        /// Slave end of the pseudo-terminal.
        slave: OwnedFd,
    },
    /// Detached: stdin from `/dev/null`, output into a log file.
    Detached {
        /// Open `/dev/null` descriptor for stdin.
        devnull: OwnedFd,
        /// Log file descriptor for stdout and stderr.
        log: OwnedFd,
    },
}

/// Everything needed to start the container's init process.
#[derive(Debug)]
pub struct SpawnSpec {
    /// User command and arguments, appended after the `init` subcommand.
    pub command: Vec<String>,
    /// Complete environment for the init process.
    pub env: Vec<String>,
    /// Namespaces to create with the child.
    pub namespaces: NamespaceConfig,
    /// Start the child as a new session leader (TTY and detached modes).
    pub new_session: bool,
    /// Stdio wiring.
    pub stdio: ChildStdio,
}

/// Builds the init-process environment from the supervisor's own plus the
/// `MINICONTAINER_*` protocol variables.
///
/// The rootfs passed here is the one init should pivot into: the overlay
/// `merged` directory, not the original lower dir. Volume variables are
/// informational; volumes are mounted before the clone.
#[must_use]
pub fn build_init_env(
    config: &ContainerConfig,
    actual_rootfs: Option<&Path>,
    tty: bool,
) -> Vec<String> {
    let mut env: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();

    if let Some(rootfs) = actual_rootfs {
        env.push(format!("{ENV_ROOTFS}={}", rootfs.display()));
    }
    if let Some(hostname) = &config.hostname {
        env.push(format!("{ENV_HOSTNAME}={hostname}"));
    }
    for entry in &config.env {
        env.push(format!("{ENV_VAR_PREFIX}{entry}"));
    }
    for (index, volume) in config.volumes.iter().enumerate() {
        env.push(format!("{ENV_VOLUME_PREFIX}{index}={volume}"));
    }
    if tty {
        env.push(format!("{ENV_TTY}=1"));
    }
    env
}

/// Clones the init child with the configured namespaces and re-execs the
/// current binary as `init <command...>`.
///
/// In the child, before exec: the identity user-namespace mapping is
/// written when a user namespace was requested, a new session is started
/// when asked, and stdio is wired per [`ChildStdio`]. Returns the child's
/// host PID.
///
/// # Errors
///
/// Returns an error if argument conversion or the `clone(2)` call fails.
/// Failures inside the child surface as a nonzero child exit instead.
#[cfg(target_os = "linux")]
pub fn spawn_init(spec: SpawnSpec) -> Result<nix::unistd::Pid> {
    use std::ffi::CString;
    use std::os::fd::AsRawFd;

    use minicontainer_common::error::MinicontainerError;

    let to_cstring = |s: &str| {
        CString::new(s).map_err(|_| MinicontainerError::Config {
            message: format!("argument contains NUL byte: {s}"),
        })
    };

    let exe = to_cstring("/proc/self/exe")?;
    let mut argv = vec![exe.clone(), to_cstring("init")?];
    for arg in &spec.command {
        argv.push(to_cstring(arg)?);
    }
    let envp: Vec<CString> = spec
        .env
        .iter()
        .map(|e| to_cstring(e))
        .collect::<Result<_>>()?;

    let flags = spec.namespaces.clone_flags();
    let map_user = spec.namespaces.user;
    let new_session = spec.new_session;
    let stdio = spec.stdio;

    let child = Box::new(move || -> isize {
        // Runs in the cloned child: keep to async-signal-safe-ish work and
        // bail out with a distinct exit code on any failure.
        if map_user {
            if let Err(e) = minicontainer_core::namespace::user::map_root_to_current_user() {
                eprintln!("error: {e}");
                return 1;
            }
        }
        if new_session {
            if nix::unistd::setsid().is_err() {
                eprintln!("error: setsid failed");
                return 1;
            }
        }
        let wired = match &stdio {
            ChildStdio::Inherit => Ok(()),
            ChildStdio::InheritOutputOnly { devnull } => {
                nix::unistd::dup2(devnull.as_raw_fd(), 0).map(|_| ())
            }
            ChildStdio::Pty { slave } => {
                let fd = slave.as_raw_fd();
                nix::unistd::dup2(fd, 0)
                    .and_then(|_| nix::unistd::dup2(fd, 1))
                    .and_then(|_| nix::unistd::dup2(fd, 2))
                    .map(|_| ())
            }
            ChildStdio::Detached { devnull, log } => {
                let log_fd = log.as_raw_fd();
                nix::unistd::dup2(devnull.as_raw_fd(), 0)
                    .and_then(|_| nix::unistd::dup2(log_fd, 1))
                    .and_then(|_| nix::unistd::dup2(log_fd, 2))
                    .map(|_| ())
            }
        };
        if wired.is_err() {
            eprintln!("error: failed to wire child stdio");
            return 1;
        }

        let _ = nix::unistd::execve(&exe, &argv, &envp);
        eprintln!("error: failed to re-exec init");
        127
    });

    let mut stack = vec![0u8; CHILD_STACK_SIZE];
    // SAFETY: the callback only touches data moved into it and execs
    // immediately; the stack buffer outlives the clone call.
    let pid = unsafe { nix::sched::clone(child, &mut stack, flags, Some(libc::SIGCHLD)) }
        .map_err(|e| MinicontainerError::Syscall {
            op: "clone",
            source: e.into(),
        })?;

    tracing::info!(pid = pid.as_raw(), "init child started");
    Ok(pid)
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — namespaced spawn requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn spawn_init(_spec: SpawnSpec) -> Result<nix::unistd::Pid> {
    Err(minicontainer_common::error::MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_env_carries_rootfs_and_hostname() {
        let config = ContainerConfig {
            hostname: Some("box".into()),
            ..ContainerConfig::default()
        };
        let env = build_init_env(&config, Some(Path::new("/tmp/merged")), false);
        assert!(env.contains(&"MINICONTAINER_ROOTFS=/tmp/merged".to_string()));
        assert!(env.contains(&"MINICONTAINER_HOSTNAME=box".to_string()));
        assert!(!env.iter().any(|e| e.starts_with("MINICONTAINER_TTY=")));
    }

    #[test]
    fn protocol_env_prefixes_user_variables() {
        let config = ContainerConfig {
            env: vec!["FOO=bar".into(), "BAZ=qux".into()],
            ..ContainerConfig::default()
        };
        let env = build_init_env(&config, None, false);
        assert!(env.contains(&"MINICONTAINER_ENV_FOO=bar".to_string()));
        assert!(env.contains(&"MINICONTAINER_ENV_BAZ=qux".to_string()));
        assert!(!env.iter().any(|e| e.starts_with("MINICONTAINER_ROOTFS=")));
    }

    #[test]
    fn protocol_env_numbers_volume_specs() {
        let config = ContainerConfig {
            volumes: vec!["/a:/b".into(), "/c:/d:ro".into()],
            ..ContainerConfig::default()
        };
        let env = build_init_env(&config, None, false);
        assert!(env.contains(&"MINICONTAINER_VOLUME_0=/a:/b".to_string()));
        assert!(env.contains(&"MINICONTAINER_VOLUME_1=/c:/d:ro".to_string()));
    }

    #[test]
    fn protocol_env_marks_tty_mode() {
        let env = build_init_env(&ContainerConfig::default(), None, true);
        assert!(env.contains(&"MINICONTAINER_TTY=1".to_string()));
    }

    #[test]
    fn protocol_env_inherits_supervisor_environment() {
        std::env::set_var("MINICONTAINER_SPAWN_TEST_MARKER", "yes");
        let env = build_init_env(&ContainerConfig::default(), None, false);
        assert!(env.contains(&"MINICONTAINER_SPAWN_TEST_MARKER=yes".to_string()));
        std::env::remove_var("MINICONTAINER_SPAWN_TEST_MARKER");
    }
}
