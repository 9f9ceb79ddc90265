//! `minicontainer inspect` — Show a container's state record.

use clap::Args;
use minicontainer_runtime::state::StateStore;

/// Arguments for the `inspect` command.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Container ID, ID prefix, or name.
    pub container: String,
}

/// Executes the `inspect` command.
///
/// Prints the state record as pretty JSON after a liveness refresh.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved.
pub fn execute(args: InspectArgs) -> anyhow::Result<()> {
    let store = StateStore::default_store();
    let mut state = store
        .find(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    store.refresh(&mut state).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
