//! Persistent container state.
//!
//! One JSON record per container under
//! `<state-root>/containers/<id>/state.json`. The record survives
//! supervisor exit; liveness of a `running` entry is re-validated with a
//! signal-0 probe.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minicontainer_common::constants::DEFAULT_STATE_ROOT;
use minicontainer_common::error::{MinicontainerError, Result};
use minicontainer_common::types::{ContainerId, ContainerStatus};

/// File name of the state record inside the container directory.
const STATE_FILE: &str = "state.json";

/// Durable record of one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerState {
    /// Full 64-hex container ID; immutable after creation.
    pub id: ContainerId,
    /// Display name, user-supplied or the short ID.
    pub name: String,
    /// Command and arguments run inside the container.
    pub command: Vec<String>,
    /// Lifecycle status.
    pub status: ContainerStatus,
    /// Host PID of the supervised init; 0 until started.
    pub pid: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Exit code; meaningful only when stopped, -1 if unknown.
    pub exit_code: i32,
    /// Original lower rootfs directory; empty when none was used.
    pub rootfs_path: PathBuf,
}

impl ContainerState {
    /// Creates a fresh record in the `created` state.
    #[must_use]
    pub fn new(
        id: ContainerId,
        name: impl Into<String>,
        rootfs_path: impl Into<PathBuf>,
        command: Vec<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            command,
            status: ContainerStatus::Created,
            pid: 0,
            created_at: Utc::now(),
            exit_code: -1,
            rootfs_path: rootfs_path.into(),
        }
    }
}

/// Store of container state records on disk.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
}

impl StateStore {
    /// Creates a store over an explicit containers root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the store at the default host path.
    #[must_use]
    pub fn default_store() -> Self {
        Self::new(DEFAULT_STATE_ROOT)
    }

    /// Returns the per-container data directory.
    #[must_use]
    pub fn container_dir(&self, id: &ContainerId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Persists a state record.
    ///
    /// Creates the container directory if absent and replaces the record
    /// with a write-then-rename in the same directory, so readers never
    /// observe a half-written file.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, state: &ContainerState) -> Result<()> {
        let dir = self.container_dir(&state.id);
        std::fs::create_dir_all(&dir).map_err(|e| MinicontainerError::Io {
            path: dir.clone(),
            source: e,
        })?;

        let json = serde_json::to_string_pretty(state)?;
        let tmp = dir.join(".state.json.tmp");
        std::fs::write(&tmp, json).map_err(|e| MinicontainerError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        let path = dir.join(STATE_FILE);
        std::fs::rename(&tmp, &path).map_err(|e| MinicontainerError::Io {
            path,
            source: e,
        })?;
        tracing::debug!(id = %state.id.short(), status = %state.status, "state saved");
        Ok(())
    }

    /// Loads a record by full ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record is absent, or a serialization
    /// error if it cannot be parsed.
    pub fn load(&self, id: &ContainerId) -> Result<ContainerState> {
        let path = self.container_dir(id).join(STATE_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MinicontainerError::NotFound {
                    kind: "container",
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(MinicontainerError::Io { path, source: e }),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Lists all parseable records.
    ///
    /// Entries whose JSON fails to parse are logged and skipped so one
    /// corrupt record does not break `ps`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the containers root exists but cannot be
    /// enumerated.
    pub fn list(&self) -> Result<Vec<ContainerState>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.root).map_err(|e| MinicontainerError::Io {
            path: self.root.clone(),
            source: e,
        })?;

        let mut states = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let id = ContainerId::new(entry.file_name().to_string_lossy());
            match self.load(&id) {
                Ok(state) => states.push(state),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "skipping unreadable container state");
                }
            }
        }
        Ok(states)
    }

    /// Resolves a query to a single container.
    ///
    /// Resolution order: exact ID, exact name, then ID prefix. A prefix
    /// matching more than one container is an error rather than a silent
    /// first pick.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing matches and `Ambiguous` when a
    /// prefix matches several containers.
    pub fn find(&self, query: &str) -> Result<ContainerState> {
        let states = self.list()?;

        if let Some(state) = states.iter().find(|s| s.id.as_str() == query) {
            return Ok(state.clone());
        }
        if let Some(state) = states.iter().find(|s| s.name == query) {
            return Ok(state.clone());
        }

        let mut matches: Vec<&ContainerState> = states
            .iter()
            .filter(|s| !query.is_empty() && s.id.as_str().starts_with(query))
            .collect();
        match matches.len() {
            0 => Err(MinicontainerError::NotFound {
                kind: "container",
                id: query.to_string(),
            }),
            1 => Ok(matches.remove(0).clone()),
            n => Err(MinicontainerError::Ambiguous {
                kind: "container",
                query: query.to_string(),
                matches: n,
            }),
        }
    }

    /// Re-validates a `running` record against the live process table.
    ///
    /// Probes the recorded PID with signal 0; a dead PID transitions the
    /// record to `stopped` with exit code -1 and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the updated record cannot be saved.
    pub fn refresh(&self, state: &mut ContainerState) -> Result<()> {
        if state.status != ContainerStatus::Running {
            return Ok(());
        }
        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(state.pid), None).is_ok();
        if !alive {
            tracing::info!(id = %state.id.short(), pid = state.pid, "recorded pid is gone, marking stopped");
            state.status = ContainerStatus::Stopped;
            state.exit_code = -1;
            self.save(state)?;
        }
        Ok(())
    }

    /// Removes a container's directory and everything in it.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` for a running container, or an I/O error if the
    /// directory cannot be removed.
    pub fn remove(&self, state: &ContainerState) -> Result<()> {
        if state.status == ContainerStatus::Running {
            return Err(MinicontainerError::Conflict {
                message: format!(
                    "cannot remove running container {}, stop it first",
                    state.name
                ),
            });
        }
        let dir = self.container_dir(&state.id);
        std::fs::remove_dir_all(&dir).map_err(|e| MinicontainerError::Io {
            path: dir,
            source: e,
        })?;
        tracing::info!(id = %state.id.short(), "container removed");
        Ok(())
    }

    /// Returns the containers root path.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> StateStore {
        StateStore::new(dir.join("containers"))
    }

    fn sample(id: &str, name: &str) -> ContainerState {
        ContainerState::new(
            ContainerId::new(id),
            name,
            "/tmp/rootfs",
            vec!["/bin/sh".into(), "-c".into(), "true".into()],
        )
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut state = sample(&"a".repeat(64), "web");
        state.status = ContainerStatus::Running;
        state.pid = 4242;
        state.exit_code = -1;

        store.save(&state).expect("save");
        let loaded = store.load(&state.id).expect("load");

        assert_eq!(loaded.id, state.id);
        assert_eq!(loaded.name, "web");
        assert_eq!(loaded.command, state.command);
        assert_eq!(loaded.status, ContainerStatus::Running);
        assert_eq!(loaded.pid, 4242);
        assert_eq!(loaded.exit_code, -1);
        assert_eq!(loaded.rootfs_path, PathBuf::from("/tmp/rootfs"));
    }

    #[test]
    fn state_json_uses_spec_field_names() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let state = sample(&"b".repeat(64), "fields");
        store.save(&state).expect("save");

        let raw = std::fs::read_to_string(
            store.container_dir(&state.id).join("state.json"),
        )
        .expect("read");
        for field in [
            "\"id\"",
            "\"name\"",
            "\"command\"",
            "\"status\"",
            "\"pid\"",
            "\"created_at\"",
            "\"exit_code\"",
            "\"rootfs_path\"",
        ] {
            assert!(raw.contains(field), "missing {field} in {raw}");
        }
        assert!(raw.contains("\"created\""));
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let err = store
            .load(&ContainerId::new("c".repeat(64)))
            .expect_err("missing");
        assert!(matches!(err, MinicontainerError::NotFound { .. }));
    }

    #[test]
    fn list_skips_corrupt_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.save(&sample(&"d".repeat(64), "good")).expect("save");

        let bad_dir = dir.path().join("containers").join("e".repeat(64));
        std::fs::create_dir_all(&bad_dir).expect("mkdir");
        std::fs::write(bad_dir.join("state.json"), b"{ truncated").expect("corrupt");

        let states = store.list().expect("list");
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].name, "good");
    }

    #[test]
    fn list_empty_root_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn find_by_exact_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let id = "f".repeat(64);
        store.save(&sample(&id, "byid")).expect("save");

        assert_eq!(store.find(&id).expect("find").name, "byid");
    }

    #[test]
    fn find_by_name_beats_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.save(&sample(&"1".repeat(64), "one")).expect("save one");
        store.save(&sample(&"2".repeat(64), "two")).expect("save two");

        assert_eq!(store.find("two").expect("find").id.as_str(), "2".repeat(64));
    }

    #[test]
    fn find_by_unique_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let id = format!("abc{}", "0".repeat(61));
        store.save(&sample(&id, "prefixed")).expect("save");

        assert_eq!(store.find("abc").expect("find").name, "prefixed");
    }

    #[test]
    fn find_ambiguous_prefix_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store
            .save(&sample(&format!("ab1{}", "0".repeat(61)), "first"))
            .expect("save first");
        store
            .save(&sample(&format!("ab2{}", "0".repeat(61)), "second"))
            .expect("save second");

        let err = store.find("ab").expect_err("ambiguous");
        assert!(matches!(
            err,
            MinicontainerError::Ambiguous { matches: 2, .. }
        ));
    }

    #[test]
    fn find_unknown_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let err = store.find("nothing").expect_err("missing");
        assert!(matches!(err, MinicontainerError::NotFound { .. }));
    }

    #[test]
    fn refresh_marks_dead_pid_stopped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut state = sample(&"9".repeat(64), "dead");
        state.status = ContainerStatus::Running;
        // A PID far beyond pid_max cannot be alive.
        state.pid = i32::MAX - 1;
        store.save(&state).expect("save");

        store.refresh(&mut state).expect("refresh");
        assert_eq!(state.status, ContainerStatus::Stopped);
        assert_eq!(state.exit_code, -1);

        let reloaded = store.load(&state.id).expect("reload");
        assert_eq!(reloaded.status, ContainerStatus::Stopped);
    }

    #[test]
    fn refresh_leaves_live_pid_running() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut state = sample(&"8".repeat(64), "alive");
        state.status = ContainerStatus::Running;
        state.pid = std::process::id() as i32;
        store.save(&state).expect("save");

        store.refresh(&mut state).expect("refresh");
        assert_eq!(state.status, ContainerStatus::Running);
    }

    #[test]
    fn remove_refuses_running_container() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut state = sample(&"7".repeat(64), "busy");
        state.status = ContainerStatus::Running;
        state.pid = std::process::id() as i32;
        store.save(&state).expect("save");

        let err = store.remove(&state).expect_err("must refuse");
        assert!(matches!(err, MinicontainerError::Conflict { .. }));
        assert!(store.container_dir(&state.id).exists());
    }

    #[test]
    fn remove_deletes_stopped_container_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut state = sample(&"6".repeat(64), "done");
        state.status = ContainerStatus::Stopped;
        state.exit_code = 0;
        store.save(&state).expect("save");

        store.remove(&state).expect("remove");
        assert!(!store.container_dir(&state.id).exists());
    }
}
