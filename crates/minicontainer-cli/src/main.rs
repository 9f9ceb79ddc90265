//! # minicontainer — minimal OCI-style container runtime
//!
//! Single binary for running isolated processes with namespaces,
//! overlayfs, cgroups v2, and pseudo-terminals. The hidden `init`
//! subcommand is the re-exec target that finalizes isolation inside the
//! container's namespaces.

#![allow(
    clippy::unnecessary_wraps,
    clippy::needless_pass_by_value,
    clippy::print_stdout,
    clippy::print_stderr
)]

mod commands;
mod output;

use clap::Parser;

use crate::commands::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = commands::execute(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
