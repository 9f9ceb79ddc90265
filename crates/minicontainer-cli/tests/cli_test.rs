//! Binary-level tests for the minicontainer CLI.
//!
//! The unprivileged tests exercise the argument surface and read-only
//! commands; the full launch scenarios need root and a Linux kernel, so
//! they are ignored by default and run explicitly on a configured host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::process::Command;

fn minicontainer() -> Command {
    Command::new(env!("CARGO_BIN_EXE_minicontainer"))
}

#[test]
fn version_prints_package_version() {
    let output = minicontainer().arg("version").output().expect("run version");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("minicontainer version"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_fails() {
    let output = minicontainer().arg("frobnicate").output().expect("run");
    assert!(!output.status.success());
}

#[test]
fn run_without_command_fails() {
    let output = minicontainer().arg("run").output().expect("run");
    assert!(!output.status.success());
}

#[test]
fn stop_unknown_container_reports_error_line() {
    let output = minicontainer()
        .args(["stop", "no-such-container-zzz"])
        .output()
        .expect("run stop");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "stderr was: {stderr}");
}

#[test]
fn logs_unknown_container_fails() {
    let output = minicontainer()
        .args(["logs", "no-such-container-zzz"])
        .output()
        .expect("run logs");
    assert!(!output.status.success());
}

// ── Root-only launch scenarios ───────────────────────────────────────

#[test]
#[ignore = "requires root and a Linux kernel with cgroup v2"]
fn run_trivial_command_streams_output() {
    let output = minicontainer()
        .args(["run", "--hostname", "box", "echo", "hello"])
        .output()
        .expect("run echo");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
}

#[test]
#[ignore = "requires root and a Linux kernel with cgroup v2"]
fn detached_run_prints_full_container_id() {
    let output = minicontainer()
        .args(["run", "-d", "sleep", "5"])
        .output()
        .expect("run detached");
    assert!(output.status.success());
    let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert_eq!(id.len(), 64);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

    let stop = minicontainer().args(["stop", &id]).output().expect("stop");
    assert!(stop.status.success());
}
