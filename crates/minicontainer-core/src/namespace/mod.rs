//! Linux namespace configuration for container isolation.
//!
//! The supervisor picks the namespaces at spawn time; the flags are handed
//! to `clone(2)` so the child is born isolated.

pub mod user;

#[cfg(target_os = "linux")]
use nix::sched::CloneFlags;

/// Which namespaces to create for a new container.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy)]
pub struct NamespaceConfig {
    /// Isolate hostname (UTS).
    pub uts: bool,
    /// Isolate process IDs.
    pub pid: bool,
    /// Isolate System V IPC and POSIX message queues.
    pub ipc: bool,
    /// Isolate the mount table.
    pub mount: bool,
    /// Isolate users; used when the supervisor is not root.
    pub user: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            ipc: true,
            mount: true,
            user: false,
        }
    }
}

impl NamespaceConfig {
    /// Returns the default namespace set for the current process.
    ///
    /// The user namespace is added exactly when the supervisor is not
    /// running as root; root in a user namespace restricts mount
    /// operations it would otherwise be allowed.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn for_current_user() -> Self {
        Self {
            user: !nix::unistd::getuid().is_root(),
            ..Self::default()
        }
    }

    /// Stub for non-Linux platforms; never requests a user namespace.
    #[cfg(not(target_os = "linux"))]
    #[must_use]
    pub fn for_current_user() -> Self {
        Self::default()
    }

    /// Translates the configuration into `clone(2)` flags.
    #[cfg(target_os = "linux")]
    #[must_use]
    pub fn clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        if self.uts {
            flags |= CloneFlags::CLONE_NEWUTS;
        }
        if self.pid {
            flags |= CloneFlags::CLONE_NEWPID;
        }
        if self.ipc {
            flags |= CloneFlags::CLONE_NEWIPC;
        }
        if self.mount {
            flags |= CloneFlags::CLONE_NEWNS;
        }
        if self.user {
            flags |= CloneFlags::CLONE_NEWUSER;
        }
        flags
    }
}
