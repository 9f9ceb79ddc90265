//! Pseudo-terminal allocation and host terminal raw mode.
//!
//! The master stays in the supervisor; the slave becomes the container's
//! stdio. While a TTY container runs, the host terminal is switched into
//! raw mode so keystrokes reach the container unprocessed; the captured
//! original state is reinstated on every exit path.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use minicontainer_common::error::{MinicontainerError, Result};

/// An open pseudo-terminal pair.
#[derive(Debug)]
pub struct Pty {
    /// Terminal side, held by the supervisor.
    pub master: OwnedFd,
    /// Container side, wired to the child's stdio.
    pub slave: OwnedFd,
}

impl Pty {
    /// Opens a new pseudo-terminal pair.
    ///
    /// Opens the multiplexor, resolves and unlocks the slave device, then
    /// opens the slave path. Owned descriptors guarantee that partially
    /// opened ends are closed if a later step fails.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the PTY syscalls fails.
    #[cfg(target_os = "linux")]
    pub fn open() -> Result<Self> {
        use std::os::fd::IntoRawFd;
        use std::os::unix::fs::OpenOptionsExt;

        use nix::fcntl::OFlag;
        use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt};

        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(|e| {
            MinicontainerError::Syscall {
                op: "posix_openpt",
                source: e.into(),
            }
        })?;
        grantpt(&master).map_err(|e| MinicontainerError::Syscall {
            op: "grantpt",
            source: e.into(),
        })?;
        unlockpt(&master).map_err(|e| MinicontainerError::Syscall {
            op: "unlockpt",
            source: e.into(),
        })?;
        let slave_path = ptsname_r(&master).map_err(|e| MinicontainerError::Syscall {
            op: "ptsname",
            source: e.into(),
        })?;

        let slave = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&slave_path)
            .map_err(|e| MinicontainerError::Io {
                path: slave_path.clone().into(),
                source: e,
            })?;

        tracing::debug!(slave = %slave_path, "pty pair opened");
        // SAFETY: into_raw_fd transfers ownership of a valid open descriptor.
        let master = unsafe {
            use std::os::fd::FromRawFd;
            OwnedFd::from_raw_fd(master.into_raw_fd())
        };
        Ok(Self {
            master,
            slave: slave.into(),
        })
    }

    /// Stub for non-Linux platforms.
    ///
    /// # Errors
    ///
    /// Always returns an error — PTY allocation requires Linux.
    #[cfg(not(target_os = "linux"))]
    pub fn open() -> Result<Self> {
        Err(MinicontainerError::Unsupported {
            message: "Linux required for native container operations".into(),
        })
    }
}

/// Restores the captured terminal state when dropped.
///
/// Returned by [`set_raw`]; call [`RawModeGuard::restore`] for an explicit
/// early restore. A second restore is a no-op, and unwinding restores too.
#[derive(Debug)]
pub struct RawModeGuard {
    fd: RawFd,
    original: nix::sys::termios::Termios,
    restored: bool,
}

impl RawModeGuard {
    /// Reinstates the original terminal attributes.
    pub fn restore(&mut self) {
        if self.restored {
            return;
        }
        self.restored = true;
        // SAFETY: the guard holds the descriptor of a terminal that outlives it.
        let fd = unsafe { std::os::fd::BorrowedFd::borrow_raw(self.fd) };
        if let Err(e) =
            nix::sys::termios::tcsetattr(fd, nix::sys::termios::SetArg::TCSANOW, &self.original)
        {
            tracing::warn!(error = %e, "failed to restore terminal state");
        }
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Puts the terminal on `fd` into raw mode.
///
/// Clears canonical mode, echo, signal generation, input and output
/// post-processing, and parity; sets 8-bit characters with `VMIN=1`,
/// `VTIME=0`. The returned guard reinstates the captured original state.
///
/// # Errors
///
/// Returns an error if the terminal attributes cannot be read or applied.
pub fn set_raw(fd: impl AsRawFd) -> Result<RawModeGuard> {
    use nix::sys::termios::{
        tcgetattr, tcsetattr, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
        SpecialCharacterIndices,
    };

    let raw_fd = fd.as_raw_fd();
    // SAFETY: the caller's descriptor is live for the duration of this call.
    let borrowed = unsafe { std::os::fd::BorrowedFd::borrow_raw(raw_fd) };

    let original = tcgetattr(borrowed).map_err(|e| MinicontainerError::Syscall {
        op: "tcgetattr",
        source: e.into(),
    })?;

    let mut raw = original.clone();
    raw.local_flags &=
        !(LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::ISIG | LocalFlags::IEXTEN);
    raw.input_flags &= !(InputFlags::BRKINT
        | InputFlags::ICRNL
        | InputFlags::INPCK
        | InputFlags::ISTRIP
        | InputFlags::IXON);
    raw.output_flags &= !OutputFlags::OPOST;
    raw.control_flags &= !(ControlFlags::CSIZE | ControlFlags::PARENB);
    raw.control_flags |= ControlFlags::CS8;
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

    tcsetattr(borrowed, SetArg::TCSANOW, &raw).map_err(|e| MinicontainerError::Syscall {
        op: "tcsetattr",
        source: e.into(),
    })?;

    Ok(RawModeGuard {
        fd: raw_fd,
        original,
        restored: false,
    })
}
