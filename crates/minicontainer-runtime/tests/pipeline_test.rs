//! Cross-crate pipeline tests for the minicontainer runtime.
//!
//! These cover the pieces of the launch pipeline that do not need root:
//! 1. State lifecycle (created → running → stopped), resolution, removal
//! 2. Image import → lookup handoff to the overlay layer
//! 3. Layer garbage collection across shared images
//! 4. Reference parsing as used by pull
//! 5. The parent-to-init environment protocol

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::Path;

use minicontainer_common::config::ContainerConfig;
use minicontainer_common::types::{ContainerId, ContainerStatus, Digest};
use minicontainer_image::reference::Reference;
use minicontainer_image::storage::ImageStore;
use minicontainer_runtime::spawn::build_init_env;
use minicontainer_runtime::state::{ContainerState, StateStore};

fn write_tarball(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> std::path::PathBuf {
    let mut builder = tar::Builder::new(Vec::new());
    for (file, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, file, *content).expect("append");
    }
    let bytes = builder.into_inner().expect("tar");
    let path = dir.join(name);
    std::fs::write(&path, bytes).expect("write tarball");
    path
}

// ── State lifecycle ──────────────────────────────────────────────────

#[test]
fn pipeline_state_lifecycle_created_running_stopped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::new(dir.path().join("containers"));

    let id = ContainerId::generate();
    let mut state = ContainerState::new(
        id.clone(),
        id.short().to_string(),
        "",
        vec!["echo".into(), "hello".into()],
    );
    assert_eq!(state.status, ContainerStatus::Created);
    assert_eq!(state.pid, 0);
    store.save(&state).expect("save created");

    state.status = ContainerStatus::Running;
    state.pid = std::process::id() as i32;
    store.save(&state).expect("save running");
    assert_eq!(
        store.load(&id).expect("load").status,
        ContainerStatus::Running
    );

    state.status = ContainerStatus::Stopped;
    state.exit_code = 0;
    store.save(&state).expect("save stopped");

    let reloaded = store.load(&id).expect("reload");
    assert_eq!(reloaded.status, ContainerStatus::Stopped);
    assert_eq!(reloaded.exit_code, 0);

    store.remove(&reloaded).expect("remove");
    assert!(store.list().expect("list").is_empty());
}

#[test]
fn pipeline_short_id_resolution_across_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = StateStore::new(dir.path().join("containers"));

    let id = ContainerId::generate();
    let state = ContainerState::new(id.clone(), "resolver", "", vec!["true".into()]);
    store.save(&state).expect("save");

    let by_short = store.find(id.short()).expect("find by short id");
    assert_eq!(by_short.id, id);
    let by_name = store.find("resolver").expect("find by name");
    assert_eq!(by_name.id, id);
}

// ── Image store handoff ──────────────────────────────────────────────

#[test]
fn pipeline_import_then_lookup_yields_overlay_lowers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ImageStore::new(dir.path().join("images"), dir.path().join("layers"));
    let tarball = write_tarball(dir.path(), "rootfs.tar", &[("bin/sh", b"#!/bin/sh\n")]);

    let meta = store.import(&tarball, "alpine:test").expect("import");
    assert_eq!(meta.id.len(), 64);

    let lowers = store.lookup("alpine:test").expect("lookup");
    assert_eq!(lowers.len(), 1);
    assert!(lowers[0].join("bin/sh").is_file());

    // The same tarball imported again must reuse the extracted layer.
    let again = store.import(&tarball, "alpine:copy").expect("re-import");
    assert_eq!(meta.layers, again.layers);
}

#[test]
fn pipeline_layer_gc_preserves_shared_layers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = ImageStore::new(dir.path().join("images"), dir.path().join("layers"));
    let shared = write_tarball(dir.path(), "shared.tar", &[("etc/hosts", b"localhost")]);
    let unique = write_tarball(dir.path(), "unique.tar", &[("etc/motd", b"hi")]);

    let a = store.import(&shared, "a:latest").expect("import a");
    store.import(&shared, "b:latest").expect("import b");
    let c = store.import(&unique, "c:latest").expect("import c");

    store.remove("a:latest").expect("remove a");
    let shared_digest = Digest::parse(&a.layers[0]).expect("digest");
    assert!(
        store.layer_exists(&shared_digest),
        "layer still referenced by b must survive"
    );

    store.remove("c:latest").expect("remove c");
    let unique_digest = Digest::parse(&c.layers[0]).expect("digest");
    assert!(
        !store.layer_exists(&unique_digest),
        "unreferenced layer must be collected"
    );
}

// ── Reference parsing ────────────────────────────────────────────────

#[test]
fn pipeline_reference_grid() {
    let cases = [
        ("alpine", "registry-1.docker.io", "library/alpine", "latest"),
        ("alpine:3.19", "registry-1.docker.io", "library/alpine", "3.19"),
        ("user/app", "registry-1.docker.io", "user/app", "latest"),
        ("ghcr.io/o/r:v1", "ghcr.io", "o/r", "v1"),
        ("localhost:5000/x", "localhost:5000", "x", "latest"),
    ];
    for (input, registry, repository, tag) in cases {
        let r = Reference::parse(input);
        assert_eq!(r.registry, registry, "{input}");
        assert_eq!(r.repository, repository, "{input}");
        assert_eq!(r.tag, tag, "{input}");
    }
}

// ── Env protocol ─────────────────────────────────────────────────────

#[test]
fn pipeline_env_protocol_carries_full_launch_config() {
    let config = ContainerConfig {
        hostname: Some("box".into()),
        env: vec!["GREETING=hello".into()],
        volumes: vec!["/host:/data:ro".into()],
        ..ContainerConfig::default()
    };
    let env = build_init_env(&config, Some(Path::new("/tmp/overlay/merged")), true);

    assert!(env.contains(&"MINICONTAINER_ROOTFS=/tmp/overlay/merged".to_string()));
    assert!(env.contains(&"MINICONTAINER_HOSTNAME=box".to_string()));
    assert!(env.contains(&"MINICONTAINER_ENV_GREETING=hello".to_string()));
    assert!(env.contains(&"MINICONTAINER_VOLUME_0=/host:/data:ro".to_string()));
    assert!(env.contains(&"MINICONTAINER_TTY=1".to_string()));
}
