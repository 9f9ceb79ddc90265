//! `minicontainer logs` — Show a container's logs.

use clap::Args;
use minicontainer_runtime::logs::read_logs;
use minicontainer_runtime::state::StateStore;

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container ID, ID prefix, or name.
    pub container: String,
}

/// Executes the `logs` command.
///
/// Only detached containers write logs; attached containers stream to the
/// supervisor's terminal instead.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved or the log file
/// cannot be read.
pub fn execute(args: LogsArgs) -> anyhow::Result<()> {
    let store = StateStore::default_store();
    let state = store
        .find(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let content = read_logs(&store.container_dir(&state.id)).map_err(|e| anyhow::anyhow!("{e}"))?;
    print!("{content}");
    Ok(())
}
