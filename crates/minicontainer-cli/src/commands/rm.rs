//! `minicontainer rm` — Remove a stopped container.

use clap::Args;
use minicontainer_runtime::supervisor::Supervisor;

/// Arguments for the `rm` command.
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Container ID, ID prefix, or name.
    pub container: String,
}

/// Executes the `rm` command.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved or is still
/// running.
pub fn execute(args: RmArgs) -> anyhow::Result<()> {
    let supervisor = Supervisor::default_supervisor();
    let state = supervisor
        .remove(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", state.id.short());
    Ok(())
}
