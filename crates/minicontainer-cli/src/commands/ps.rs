//! `minicontainer ps` — List containers.

use clap::Args;
use minicontainer_runtime::state::StateStore;

use crate::output;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show all containers, including stopped ones.
    #[arg(short, long)]
    pub all: bool,
}

/// Executes the `ps` command.
///
/// Re-validates `running` entries against the live process table before
/// printing, so stale records from dead supervisors show as stopped.
///
/// # Errors
///
/// Returns an error if the state store cannot be listed.
pub fn execute(args: PsArgs) -> anyhow::Result<()> {
    let store = StateStore::default_store();
    let mut states = store.list().map_err(|e| anyhow::anyhow!("{e}"))?;
    for state in &mut states {
        if let Err(e) = store.refresh(state) {
            tracing::warn!(id = %state.id.short(), error = %e, "liveness refresh failed");
        }
    }

    println!(
        "{:<12}  {:<20}  {:<10}  {}",
        "CONTAINER ID", "COMMAND", "STATUS", "NAME"
    );
    for state in &states {
        if !args.all && state.status != minicontainer_common::types::ContainerStatus::Running {
            continue;
        }
        println!(
            "{:<12}  {:<20}  {:<10}  {}",
            state.id.short(),
            output::truncate(&state.command.join(" "), 20),
            state.status,
            state.name
        );
    }
    Ok(())
}
