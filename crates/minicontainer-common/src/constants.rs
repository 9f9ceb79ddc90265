//! System-wide constants and default host paths.

/// Default base directory for minicontainer data.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/minicontainer";

/// Default root for per-container state directories.
pub const DEFAULT_STATE_ROOT: &str = "/var/lib/minicontainer/containers";

/// Default root for image manifests.
pub const DEFAULT_IMAGE_ROOT: &str = "/var/lib/minicontainer/images";

/// Default root for extracted layer directories.
pub const DEFAULT_LAYER_ROOT: &str = "/var/lib/minicontainer/layers";

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Name of the parent cgroup all container cgroups live under.
pub const CGROUP_PARENT: &str = "minicontainer";

/// Directory that overlay scratch base directories are created in.
pub const OVERLAY_SCRATCH_DIR: &str = "/tmp";

/// Name prefix for overlay scratch base directories.
pub const OVERLAY_PREFIX: &str = "minicontainer-overlay-";

/// Hostname assigned to containers that do not request one.
pub const DEFAULT_HOSTNAME: &str = "minicontainer";

/// Environment variable carrying the container hostname to init.
pub const ENV_HOSTNAME: &str = "MINICONTAINER_HOSTNAME";

/// Environment variable carrying the rootfs path to init.
pub const ENV_ROOTFS: &str = "MINICONTAINER_ROOTFS";

/// Environment variable that enables the controlling-TTY ioctl in init.
pub const ENV_TTY: &str = "MINICONTAINER_TTY";

/// Prefix for user environment variables forwarded into the container.
pub const ENV_VAR_PREFIX: &str = "MINICONTAINER_ENV_";

/// Prefix for informational volume-spec variables passed to init.
pub const ENV_VOLUME_PREFIX: &str = "MINICONTAINER_VOLUME_";

/// Fixed PATH for processes inside the container.
pub const CONTAINER_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

/// Fixed TERM for processes inside the container.
pub const CONTAINER_TERM: &str = "xterm";

/// Registry used when a reference does not name one.
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// Tag used when a reference does not name one.
pub const DEFAULT_TAG: &str = "latest";

/// SHA-256 digest length in hex characters.
pub const SHA256_HEX_LENGTH: usize = 64;

/// Length of the short (display) form of a container ID.
pub const SHORT_ID_LENGTH: usize = 12;

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "minicontainer";
