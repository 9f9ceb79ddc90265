//! Container lifecycle management for the minicontainer runtime.
//!
//! The supervisor side prepares the rootfs, spawns the namespaced child,
//! wires I/O, and records state; the init side finalizes isolation inside
//! the child and execs the user command.

#![allow(unsafe_code)]

pub mod exec;
pub mod init;
pub mod logs;
pub mod spawn;
pub mod state;
pub mod supervisor;
