//! Host volume bind mounts.
//!
//! Volumes are mounted into the merged rootfs by the supervisor before the
//! child is spawned, so they must not rely on anything inside the new
//! mount namespace.

use std::path::{Path, PathBuf};

use minicontainer_common::error::{MinicontainerError, Result};

use super::mount;

/// A bind mount from host into container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    /// Path on the host.
    pub host_path: PathBuf,
    /// Absolute path inside the container.
    pub container_path: PathBuf,
    /// Remount read-only after binding.
    pub read_only: bool,
}

impl VolumeMount {
    /// Parses a `host:container[:ro]` volume spec.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty host or container path, or an option
    /// other than `ro`.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split(':').collect();
        if !(2..=3).contains(&parts.len()) || parts[0].is_empty() || parts[1].is_empty() {
            return Err(MinicontainerError::Config {
                message: format!("volume must be host:container[:ro]: {spec}"),
            });
        }
        let read_only = match parts.get(2) {
            None => false,
            Some(&"ro") => true,
            Some(other) => {
                return Err(MinicontainerError::Config {
                    message: format!("unknown volume option {other}: {spec}"),
                })
            }
        };
        Ok(Self {
            host_path: PathBuf::from(parts[0]),
            container_path: PathBuf::from(parts[1]),
            read_only,
        })
    }

    /// Returns where this volume lands under the given rootfs.
    #[must_use]
    pub fn target_in(&self, rootfs: &Path) -> PathBuf {
        let relative = self
            .container_path
            .strip_prefix("/")
            .unwrap_or(&self.container_path);
        rootfs.join(relative)
    }
}

/// Bind-mounts all volume specs into the rootfs.
///
/// Creates each target directory, binds the host path onto it recursively,
/// and follows with a read-only remount when requested.
///
/// # Errors
///
/// Returns an error if a spec is malformed, a target cannot be created, or
/// a mount syscall fails.
pub fn mount_volumes(rootfs: &Path, specs: &[String]) -> Result<()> {
    for spec in specs {
        let volume = VolumeMount::parse(spec)?;
        let target = volume.target_in(rootfs);
        std::fs::create_dir_all(&target).map_err(|e| MinicontainerError::Io {
            path: target.clone(),
            source: e,
        })?;
        mount::bind_mount(&volume.host_path, &target)?;
        if volume.read_only {
            mount::remount_readonly(&target)?;
        }
        tracing::info!(
            host = %volume.host_path.display(),
            target = %target.display(),
            read_only = volume.read_only,
            "volume mounted"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_two_part_spec() {
        let v = VolumeMount::parse("/host/data:/data").expect("valid spec");
        assert_eq!(v.host_path, PathBuf::from("/host/data"));
        assert_eq!(v.container_path, PathBuf::from("/data"));
        assert!(!v.read_only);
    }

    #[test]
    fn parse_read_only_spec() {
        let v = VolumeMount::parse("/host:/data:ro").expect("valid spec");
        assert!(v.read_only);
    }

    #[test]
    fn parse_rejects_unknown_option() {
        assert!(VolumeMount::parse("/host:/data:rw").is_err());
    }

    #[test]
    fn parse_rejects_missing_container_path() {
        assert!(VolumeMount::parse("/host").is_err());
        assert!(VolumeMount::parse("/host:").is_err());
    }

    #[test]
    fn target_strips_leading_slash() {
        let v = VolumeMount::parse("/host:/var/data").expect("valid spec");
        assert_eq!(
            v.target_in(Path::new("/tmp/merged")),
            PathBuf::from("/tmp/merged/var/data")
        );
    }
}
