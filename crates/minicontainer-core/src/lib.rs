//! # minicontainer-core
//!
//! Low-level Linux isolation primitives for the minicontainer runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: UTS, PID, IPC, mount, and user isolation.
//! - **Cgroups v2**: memory, CPU, and PID resource limiting.
//! - **Filesystem**: overlayfs scratch layers, `pivot_root`, bind mounts,
//!   and the container `/dev` population.
//! - **PTY**: pseudo-terminal allocation and host terminal raw mode.
//!
//! Everything here is synchronous; the runtime relies on the kernel for
//! progress at the blocking syscalls.

pub mod cgroup;
pub mod filesystem;
pub mod namespace;
pub mod pty;
