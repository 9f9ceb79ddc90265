//! Overlayfs scratch layers for container root filesystems.
//!
//! Each run gets a uniquely-named base directory under `/tmp` holding the
//! writable `upper/`, the overlay `work/`, and the `merged/` mount point.
//! The image layers are stacked read-only below. Supervisors that die
//! without unmounting leave stale base directories behind; `prune` reclaims
//! them using `/proc/mounts` as the arbiter.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use minicontainer_common::constants::{OVERLAY_PREFIX, OVERLAY_SCRATCH_DIR};
use minicontainer_common::error::{MinicontainerError, Result};

/// An overlayfs mount backing one container run.
#[derive(Debug, Clone)]
pub struct Overlay {
    /// Read-only lower layers, bottom to top.
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper layer directory.
    pub upper_dir: PathBuf,
    /// Work directory required by overlayfs.
    pub work_dir: PathBuf,
    /// Final merged mount point the container sees.
    pub merged_dir: PathBuf,
    /// Base directory containing upper, work, and merged.
    pub base_dir: PathBuf,
}

/// Builds and mounts an overlay over the given lower layers.
///
/// Creates a uniquely-named base directory with `upper/`, `work/`, and
/// `merged/` inside, then mounts `overlay` on `merged`. Lower layers are
/// given bottom to top, matching manifest order; the kernel option string
/// wants them top-first, so the list is reversed when formatted.
///
/// On any failure the base directory is removed before the error returns.
///
/// # Errors
///
/// Returns an error if no lower layer is given, directory creation fails,
/// or the mount syscall fails.
#[cfg(target_os = "linux")]
pub fn setup(lower_dirs: &[PathBuf]) -> Result<Overlay> {
    use nix::mount::{mount, MsFlags};

    if lower_dirs.is_empty() {
        return Err(MinicontainerError::Config {
            message: "overlay requires at least one lower layer".into(),
        });
    }

    let base_dir = tempfile::Builder::new()
        .prefix(OVERLAY_PREFIX)
        .tempdir_in(OVERLAY_SCRATCH_DIR)
        .map_err(|e| MinicontainerError::Io {
            path: PathBuf::from(OVERLAY_SCRATCH_DIR),
            source: e,
        })?
        .into_path();

    let overlay = Overlay {
        lower_dirs: lower_dirs.to_vec(),
        upper_dir: base_dir.join("upper"),
        work_dir: base_dir.join("work"),
        merged_dir: base_dir.join("merged"),
        base_dir,
    };

    for dir in [&overlay.upper_dir, &overlay.work_dir, &overlay.merged_dir] {
        if let Err(e) = std::fs::create_dir(dir) {
            let _ = std::fs::remove_dir_all(&overlay.base_dir);
            return Err(MinicontainerError::Io {
                path: dir.clone(),
                source: e,
            });
        }
    }

    let lowers = overlay
        .lower_dirs
        .iter()
        .rev()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(":");
    let opts = format!(
        "lowerdir={},upperdir={},workdir={}",
        lowers,
        overlay.upper_dir.display(),
        overlay.work_dir.display()
    );

    if let Err(e) = mount(
        Some("overlay"),
        &overlay.merged_dir,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    ) {
        let _ = std::fs::remove_dir_all(&overlay.base_dir);
        return Err(MinicontainerError::Syscall {
            op: "mount(overlay)",
            source: e.into(),
        });
    }

    tracing::info!(merged = %overlay.merged_dir.display(), "overlayfs mounted");
    Ok(overlay)
}

/// Unmounts the overlay and removes its base directory.
///
/// Idempotent: a second call on an already-cleaned overlay succeeds, and a
/// merged dir that is no longer mounted is not an error.
///
/// # Errors
///
/// Returns an error if the base directory exists but cannot be removed.
#[cfg(target_os = "linux")]
pub fn cleanup(overlay: &Overlay) -> Result<()> {
    use nix::mount::{umount2, MntFlags};

    if let Err(e) = umount2(&overlay.merged_dir, MntFlags::MNT_DETACH) {
        // EINVAL means not a mount point, ENOENT means already removed.
        if e != nix::errno::Errno::EINVAL && e != nix::errno::Errno::ENOENT {
            return Err(MinicontainerError::Syscall {
                op: "umount(overlay)",
                source: e.into(),
            });
        }
    }

    match std::fs::remove_dir_all(&overlay.base_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(MinicontainerError::Io {
                path: overlay.base_dir.clone(),
                source: e,
            })
        }
    }
    tracing::debug!(base = %overlay.base_dir.display(), "overlay cleaned up");
    Ok(())
}

/// Removes stale overlay base directories left by dead supervisors.
///
/// A base directory is stale when its `merged` path does not appear in
/// `/proc/mounts`. Directories in use are left alone. Returns the removed
/// paths.
///
/// # Errors
///
/// Returns an error if the scratch directory cannot be enumerated.
#[cfg(target_os = "linux")]
pub fn prune() -> Result<Vec<PathBuf>> {
    let mounted = mounted_paths()?;
    let candidates = overlay_base_dirs()?;
    let stale = stale_bases(candidates, &mounted);
    let mut removed = Vec::new();
    for base in stale {
        match std::fs::remove_dir_all(&base) {
            Ok(()) => removed.push(base),
            Err(e) => tracing::warn!(base = %base.display(), error = %e, "failed to remove stale overlay"),
        }
    }
    Ok(removed)
}

/// Enumerates overlay base directories in the scratch directory.
#[cfg(target_os = "linux")]
fn overlay_base_dirs() -> Result<Vec<PathBuf>> {
    let scratch = Path::new(OVERLAY_SCRATCH_DIR);
    let entries = std::fs::read_dir(scratch).map_err(|e| MinicontainerError::Io {
        path: scratch.to_path_buf(),
        source: e,
    })?;
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(OVERLAY_PREFIX) && entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

/// Reads `/proc/mounts` into a set of mount points.
#[cfg(target_os = "linux")]
fn mounted_paths() -> Result<HashSet<PathBuf>> {
    let path = Path::new("/proc/mounts");
    let content = std::fs::read_to_string(path).map_err(|e| MinicontainerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_mounted_paths(&content))
}

/// Parses the mount-point column out of `/proc/mounts` content.
fn parse_mounted_paths(content: &str) -> HashSet<PathBuf> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(PathBuf::from)
        .collect()
}

/// Filters base directories down to the ones whose `merged` is unmounted.
fn stale_bases(candidates: Vec<PathBuf>, mounted: &HashSet<PathBuf>) -> Vec<PathBuf> {
    candidates
        .into_iter()
        .filter(|base| !mounted.contains(&base.join("merged")))
        .collect()
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — overlayfs requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn setup(_lower_dirs: &[PathBuf]) -> Result<Overlay> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — overlayfs requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn cleanup(_overlay: &Overlay) -> Result<()> {
    Err(unsupported())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — overlayfs requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn prune() -> Result<Vec<PathBuf>> {
    Err(unsupported())
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> MinicontainerError {
    MinicontainerError::Unsupported {
        message: "Linux required for native container operations".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mounted_paths_takes_second_column() {
        let content = "overlay /tmp/minicontainer-overlay-abc/merged overlay rw 0 0\n\
                       proc /proc proc rw 0 0\n";
        let mounted = parse_mounted_paths(content);
        assert!(mounted.contains(Path::new("/tmp/minicontainer-overlay-abc/merged")));
        assert!(mounted.contains(Path::new("/proc")));
        assert_eq!(mounted.len(), 2);
    }

    #[test]
    fn parse_mounted_paths_skips_malformed_lines() {
        let mounted = parse_mounted_paths("short\n\n");
        assert!(mounted.is_empty());
    }

    #[test]
    fn stale_bases_spares_mounted_merged() {
        let mounted: HashSet<PathBuf> =
            [PathBuf::from("/tmp/minicontainer-overlay-live/merged")].into();
        let candidates = vec![
            PathBuf::from("/tmp/minicontainer-overlay-live"),
            PathBuf::from("/tmp/minicontainer-overlay-dead"),
        ];
        let stale = stale_bases(candidates, &mounted);
        assert_eq!(stale, vec![PathBuf::from("/tmp/minicontainer-overlay-dead")]);
    }

    #[test]
    fn stale_bases_empty_when_all_mounted() {
        let mounted: HashSet<PathBuf> = [PathBuf::from("/tmp/minicontainer-overlay-a/merged")].into();
        let stale = stale_bases(vec![PathBuf::from("/tmp/minicontainer-overlay-a")], &mounted);
        assert!(stale.is_empty());
    }
}
