//! Container filesystem setup.
//!
//! Overlayfs scratch layers, `pivot_root`, the pseudo-filesystem mounts
//! performed by container init, and host volume bind mounts.

pub mod dev;
pub mod mount;
pub mod overlayfs;
pub mod pivot_root;
pub mod volume;
