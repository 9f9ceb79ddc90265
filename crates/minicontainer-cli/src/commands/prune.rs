//! `minicontainer prune` — Reclaim stale overlay scratch directories.

use clap::Args;
use minicontainer_core::filesystem::overlayfs;

/// Arguments for the `prune` command.
#[derive(Args, Debug)]
pub struct PruneArgs {}

/// Executes the `prune` command.
///
/// Removes overlay base directories whose merged mount point is no longer
/// in `/proc/mounts`; directories backing live containers are left alone.
///
/// # Errors
///
/// Returns an error if the scratch directory cannot be scanned.
pub fn execute(_args: PruneArgs) -> anyhow::Result<()> {
    let removed = overlayfs::prune().map_err(|e| anyhow::anyhow!("{e}"))?;
    if removed.is_empty() {
        println!("Nothing to clean.");
    } else {
        for dir in &removed {
            println!("Removed: {}", dir.display());
        }
        println!("Removed {} directories.", removed.len());
    }
    Ok(())
}
