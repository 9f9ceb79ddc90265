//! `minicontainer stop` — Stop a running container.

use clap::Args;
use minicontainer_runtime::supervisor::Supervisor;

/// Arguments for the `stop` command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// Container ID, ID prefix, or name.
    pub container: String,
}

/// Executes the `stop` command.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved or is not
/// running.
pub fn execute(args: StopArgs) -> anyhow::Result<()> {
    let supervisor = Supervisor::default_supervisor();
    let state = supervisor
        .stop(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", state.id.short());
    Ok(())
}
