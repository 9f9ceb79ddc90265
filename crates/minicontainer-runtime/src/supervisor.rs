//! The container launch supervisor.
//!
//! One supervisor process per launch. The pipeline runs in four phases:
//! prepare (rootfs, state record, overlay, volumes, cgroup), spawn (the
//! namespaced re-exec child), attach & record (cgroup membership, state
//! to `running`, signal forwarding, PTY copiers), then supervise or
//! detach. Phase failures roll back the resources acquired so far.

use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

use minicontainer_common::config::ContainerConfig;
use minicontainer_common::error::{MinicontainerError, Result};
use minicontainer_common::types::{ContainerId, ContainerStatus};
use minicontainer_core::cgroup::CgroupManager;
use minicontainer_core::filesystem::{overlayfs, pivot_root::PIVOT_DIR, volume};
use minicontainer_core::namespace::NamespaceConfig;
use minicontainer_core::pty::{self, Pty};
use minicontainer_image::storage::ImageStore;

use crate::logs;
use crate::spawn::{self, ChildStdio, SpawnSpec};
use crate::state::{ContainerState, StateStore};

/// Grace period between SIGTERM and SIGKILL in the stop protocol.
const STOP_GRACE: Duration = Duration::from_millis(100);

/// Result of a `run` invocation.
#[derive(Debug)]
pub enum RunOutcome {
    /// The supervisor waited; the final state carries the exit code.
    Attached {
        /// Final persisted state of the container.
        state: ContainerState,
    },
    /// The container keeps running in the background.
    Detached {
        /// Full ID of the launched container.
        id: ContainerId,
    },
}

/// A prepared launch: everything acquired before the child exists.
struct Launch {
    state: ContainerState,
    overlay: Option<overlayfs::Overlay>,
    actual_rootfs: Option<PathBuf>,
    cgroup: CgroupManager,
}

/// Composes the state store and image store into the launch pipeline.
pub struct Supervisor {
    states: StateStore,
    images: ImageStore,
}

impl Supervisor {
    /// Creates a supervisor over explicit stores.
    #[must_use]
    pub fn new(states: StateStore, images: ImageStore) -> Self {
        Self { states, images }
    }

    /// Returns a supervisor over the default host paths.
    #[must_use]
    pub fn default_supervisor() -> Self {
        Self::new(StateStore::default_store(), ImageStore::default_store())
    }

    /// Launches a container, dispatching on the configured I/O mode.
    ///
    /// # Errors
    ///
    /// Returns an error from any pipeline phase; acquired resources are
    /// rolled back before the error surfaces.
    pub fn run(&self, config: &ContainerConfig, command: Vec<String>) -> Result<RunOutcome> {
        let launch = self.prepare(config, command)?;
        if config.detached {
            self.run_detached(config, launch)
        } else if config.allocate_tty {
            self.run_attached_tty(config, launch)
        } else {
            self.run_attached_no_tty(config, launch)
        }
    }

    /// Phase 1: validate, resolve the rootfs, persist the `created`
    /// record, build the overlay, mount volumes, and create the cgroup.
    fn prepare(&self, config: &ContainerConfig, command: Vec<String>) -> Result<Launch> {
        config.validate()?;
        if command.is_empty() {
            return Err(MinicontainerError::Config {
                message: "run requires a command".into(),
            });
        }

        let lowers: Vec<PathBuf> = if let Some(image) = &config.image {
            self.images.lookup(image)?
        } else if let Some(path) = &config.rootfs_path {
            if !path.is_dir() {
                return Err(MinicontainerError::NotFound {
                    kind: "rootfs",
                    id: path.display().to_string(),
                });
            }
            vec![path.clone()]
        } else {
            Vec::new()
        };

        // Mount points that init will need after pivot_root. Created here
        // in the parent: inside the user namespace the child may lack the
        // permission to create them.
        if let Some(top_lower) = lowers.last() {
            prepare_rootfs_dirs(top_lower)?;
        }

        let id = ContainerId::generate();
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| id.short().to_string());
        if config.name.is_some() && self.states.list()?.iter().any(|s| s.name == name) {
            return Err(MinicontainerError::AlreadyExists {
                kind: "container",
                id: name,
            });
        }

        let rootfs_record = lowers.first().cloned().unwrap_or_default();
        let state = ContainerState::new(id.clone(), &name, rootfs_record, command);
        self.states.save(&state)?;
        tracing::info!(id = %id.short(), name = %name, "container created");

        let mut overlay = None;
        let mut actual_rootfs = None;
        if !lowers.is_empty() {
            match overlayfs::setup(&lowers) {
                Ok(built) => {
                    actual_rootfs = Some(built.merged_dir.clone());
                    overlay = Some(built);
                }
                Err(e) => {
                    let _ = self.states.remove(&state);
                    return Err(e);
                }
            }
        }

        if let Some(merged) = &actual_rootfs {
            if let Err(e) = volume::mount_volumes(merged, &config.volumes) {
                self.rollback(&state, overlay.as_ref(), None);
                return Err(e);
            }
        }

        let cgroup = match CgroupManager::create(id.as_str()) {
            Ok(cgroup) => cgroup,
            Err(e) => {
                self.rollback(&state, overlay.as_ref(), None);
                return Err(e);
            }
        };
        if let Err(e) = cgroup.apply(
            config.memory_limit.as_deref(),
            config.cpu_limit,
            config.pids_limit,
        ) {
            self.rollback(&state, overlay.as_ref(), Some(&cgroup));
            return Err(e);
        }

        Ok(Launch {
            state,
            overlay,
            actual_rootfs,
            cgroup,
        })
    }

    /// Phases 2 and 3: spawn the init child, attach it to the cgroup, and
    /// persist the `running` state.
    fn start_child(
        &self,
        config: &ContainerConfig,
        launch: &mut Launch,
        stdio: ChildStdio,
        new_session: bool,
        tty: bool,
    ) -> Result<Pid> {
        let env = spawn::build_init_env(config, launch.actual_rootfs.as_deref(), tty);
        let spec = SpawnSpec {
            command: launch.state.command.clone(),
            env,
            namespaces: NamespaceConfig::for_current_user(),
            new_session,
            stdio,
        };

        let pid = match spawn::spawn_init(spec) {
            Ok(pid) => pid,
            Err(e) => {
                self.rollback(
                    &launch.state,
                    launch.overlay.as_ref(),
                    Some(&launch.cgroup),
                );
                return Err(e);
            }
        };

        if let Err(e) = launch.cgroup.attach(pid.as_raw()) {
            // Without cgroup attribution the container must not run.
            let _ = kill(pid, Signal::SIGKILL);
            let _ = waitpid(pid, None);
            self.rollback(
                &launch.state,
                launch.overlay.as_ref(),
                Some(&launch.cgroup),
            );
            return Err(e);
        }

        launch.state.pid = pid.as_raw();
        launch.state.status = ContainerStatus::Running;
        self.states.save(&launch.state)?;
        tracing::info!(id = %launch.state.id.short(), pid = pid.as_raw(), "container running");
        Ok(pid)
    }

    /// Attached mode with the supervisor's own stdio.
    fn run_attached_no_tty(
        &self,
        config: &ContainerConfig,
        mut launch: Launch,
    ) -> Result<RunOutcome> {
        let stdio = if config.interactive {
            ChildStdio::Inherit
        } else {
            match open_devnull() {
                Ok(devnull) => ChildStdio::InheritOutputOnly { devnull },
                Err(e) => {
                    self.rollback(
                        &launch.state,
                        launch.overlay.as_ref(),
                        Some(&launch.cgroup),
                    );
                    return Err(e);
                }
            }
        };

        let pid = self.start_child(config, &mut launch, stdio, false, false)?;
        let forward_target = install_signal_forwarder(pid);

        let wait_result = waitpid(pid, None);
        forward_target.store(0, Ordering::SeqCst);

        let state = self.finish_attached(config, launch, wait_result)?;
        Ok(RunOutcome::Attached { state })
    }

    /// Attached mode through a pseudo-terminal.
    fn run_attached_tty(
        &self,
        config: &ContainerConfig,
        mut launch: Launch,
    ) -> Result<RunOutcome> {
        let pty = match Pty::open() {
            Ok(pty) => pty,
            Err(e) => {
                self.rollback(
                    &launch.state,
                    launch.overlay.as_ref(),
                    Some(&launch.cgroup),
                );
                return Err(e);
            }
        };
        let Pty { master, slave } = pty;

        let mut raw_guard = match pty::set_raw(std::io::stdin()) {
            Ok(guard) => guard,
            Err(e) => {
                self.rollback(
                    &launch.state,
                    launch.overlay.as_ref(),
                    Some(&launch.cgroup),
                );
                return Err(e);
            }
        };

        // The spawn spec owns the slave; once the clone returns, dropping
        // it closes the parent's copy, so the master reads EOF when the
        // child exits.
        let pid = self.start_child(config, &mut launch, ChildStdio::Pty { slave }, true, true)?;
        let forward_target = install_signal_forwarder(pid);

        let stdout_copier = spawn_master_to_stdout(&master)?;
        if config.interactive {
            spawn_stdin_to_master(&master)?;
        }

        let wait_result = waitpid(pid, None);
        forward_target.store(0, Ordering::SeqCst);

        let state = self.finish_attached(config, launch, wait_result)?;

        // Closing the master ends the copiers; the stdout one is joined so
        // buffered output lands before the terminal is restored.
        drop(master);
        let _ = stdout_copier.join();
        raw_guard.restore();

        Ok(RunOutcome::Attached { state })
    }

    /// Detached mode: spawn, record, and return without waiting.
    ///
    /// The overlay stays mounted for the life of the container; `prune`
    /// reclaims it once the container is gone. Output goes to the
    /// per-container log file.
    fn run_detached(&self, config: &ContainerConfig, mut launch: Launch) -> Result<RunOutcome> {
        let container_dir = self.states.container_dir(&launch.state.id);
        let log = match std::fs::File::create(logs::log_path(&container_dir)) {
            Ok(file) => OwnedFd::from(file),
            Err(e) => {
                self.rollback(
                    &launch.state,
                    launch.overlay.as_ref(),
                    Some(&launch.cgroup),
                );
                return Err(MinicontainerError::Io {
                    path: logs::log_path(&container_dir),
                    source: e,
                });
            }
        };
        let devnull = match open_devnull() {
            Ok(devnull) => devnull,
            Err(e) => {
                self.rollback(
                    &launch.state,
                    launch.overlay.as_ref(),
                    Some(&launch.cgroup),
                );
                return Err(e);
            }
        };
        let stdio = ChildStdio::Detached { devnull, log };

        self.start_child(config, &mut launch, stdio, true, false)?;
        Ok(RunOutcome::Detached {
            id: launch.state.id,
        })
    }

    /// Phase 4: record the exit, clean the overlay, honor `--rm`.
    fn finish_attached(
        &self,
        config: &ContainerConfig,
        mut launch: Launch,
        wait_result: nix::Result<WaitStatus>,
    ) -> Result<ContainerState> {
        let (exit_code, wait_error) = match wait_result {
            Ok(status) => (exit_code_of(status), None),
            Err(e) => (-1, Some(e)),
        };

        launch.state.status = ContainerStatus::Stopped;
        launch.state.exit_code = exit_code;
        self.states.save(&launch.state)?;
        tracing::info!(id = %launch.state.id.short(), exit_code, "container stopped");

        if let Some(overlay) = &launch.overlay {
            if let Err(e) = overlayfs::cleanup(overlay) {
                tracing::warn!(error = %e, "overlay cleanup failed");
            }
        }

        if let Some(e) = wait_error {
            return Err(MinicontainerError::Syscall {
                op: "waitpid",
                source: e.into(),
            });
        }

        if config.auto_remove {
            self.states.remove(&launch.state)?;
            if let Err(e) = launch.cgroup.remove() {
                tracing::warn!(error = %e, "cgroup removal failed");
            }
        }

        Ok(launch.state)
    }

    /// Stops a running container: SIGTERM, a short grace, then SIGKILL.
    ///
    /// Does not wait; the supervising process (if any) records the
    /// transition, and otherwise a later `refresh` marks the record
    /// stopped.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`/`Ambiguous` from resolution, or `Conflict` if
    /// the container is not running.
    pub fn stop(&self, query: &str) -> Result<ContainerState> {
        let mut state = self.states.find(query)?;
        self.states.refresh(&mut state)?;
        if state.status != ContainerStatus::Running {
            return Err(MinicontainerError::Conflict {
                message: format!("container {} is not running", state.name),
            });
        }

        let pid = Pid::from_raw(state.pid);
        let _ = kill(pid, Signal::SIGTERM);
        std::thread::sleep(STOP_GRACE);
        let _ = kill(pid, Signal::SIGKILL);
        tracing::info!(id = %state.id.short(), pid = state.pid, "stop signals sent");
        Ok(state)
    }

    /// Removes a stopped container's record and cgroup.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` for a running container (after a liveness
    /// probe), or errors from resolution and removal.
    pub fn remove(&self, query: &str) -> Result<ContainerState> {
        let mut state = self.states.find(query)?;
        self.states.refresh(&mut state)?;
        self.states.remove(&state)?;
        let cgroup = CgroupManager::from_id(state.id.as_str());
        if let Err(e) = cgroup.remove() {
            tracing::warn!(error = %e, "cgroup removal failed");
        }
        Ok(state)
    }

    /// Returns the state store this supervisor records into.
    #[must_use]
    pub fn states(&self) -> &StateStore {
        &self.states
    }

    /// Returns the image store this supervisor resolves from.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Rolls back phase-1/2 acquisitions in reverse order.
    fn rollback(
        &self,
        state: &ContainerState,
        overlay: Option<&overlayfs::Overlay>,
        cgroup: Option<&CgroupManager>,
    ) {
        if let Some(cgroup) = cgroup {
            if let Err(e) = cgroup.remove() {
                tracing::warn!(error = %e, "rollback: cgroup removal failed");
            }
        }
        if let Some(overlay) = overlay {
            if let Err(e) = overlayfs::cleanup(overlay) {
                tracing::warn!(error = %e, "rollback: overlay cleanup failed");
            }
        }
        if let Err(e) = self.states.remove(state) {
            tracing::warn!(error = %e, "rollback: state removal failed");
        }
    }
}

/// Creates the mount points init needs after pivot: `.pivot_root` plus
/// `proc/` and `sys/`.
fn prepare_rootfs_dirs(rootfs: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    let mkdir = |path: PathBuf, mode: u32| -> Result<()> {
        match std::fs::DirBuilder::new().mode(mode).create(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(MinicontainerError::Io { path, source: e }),
        }
    };

    mkdir(rootfs.join(PIVOT_DIR), 0o700)?;
    mkdir(rootfs.join("proc"), 0o755)?;
    mkdir(rootfs.join("sys"), 0o755)?;
    Ok(())
}

/// Installs the SIGINT/SIGTERM forwarder.
///
/// The handler relays a SIGTERM to whatever PID the returned cell holds;
/// storing 0 after the main wait returns turns it into a no-op.
fn install_signal_forwarder(pid: Pid) -> Arc<AtomicI32> {
    let target = Arc::new(AtomicI32::new(pid.as_raw()));
    let handler_target = Arc::clone(&target);
    if let Err(e) = ctrlc::set_handler(move || {
        let pid = handler_target.load(Ordering::SeqCst);
        if pid > 0 {
            let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
        }
    }) {
        tracing::warn!(error = %e, "failed to install signal forwarder");
    }
    target
}

/// Starts the master→stdout copier thread.
fn spawn_master_to_stdout(master: &OwnedFd) -> Result<std::thread::JoinHandle<()>> {
    let mut reader = std::fs::File::from(try_clone(master)?);
    Ok(std::thread::spawn(move || {
        let _ = std::io::copy(&mut reader, &mut std::io::stdout());
    }))
}

/// Starts the stdin→master copier thread.
///
/// The thread blocks in a stdin read and is reaped by process exit, the
/// same way the source of this design leaves its stdin relay behind.
fn spawn_stdin_to_master(master: &OwnedFd) -> Result<()> {
    let mut writer = std::fs::File::from(try_clone(master)?);
    std::thread::spawn(move || {
        let _ = std::io::copy(&mut std::io::stdin(), &mut writer);
    });
    Ok(())
}

fn try_clone(fd: &OwnedFd) -> Result<OwnedFd> {
    fd.try_clone().map_err(|e| MinicontainerError::Syscall {
        op: "dup",
        source: e,
    })
}

fn open_devnull() -> Result<OwnedFd> {
    std::fs::File::open("/dev/null")
        .map(OwnedFd::from)
        .map_err(|e| MinicontainerError::Io {
            path: PathBuf::from("/dev/null"),
            source: e,
        })
}

/// Maps a wait status to the recorded exit code.
///
/// Signaled children use the shell convention of 128 plus the signal
/// number, so an OOM kill is visible as 137.
fn exit_code_of(status: WaitStatus) -> i32 {
    match status {
        WaitStatus::Exited(_, code) => code,
        WaitStatus::Signaled(_, signal, _) => 128 + signal as i32,
        _ => -1,
    }
}
