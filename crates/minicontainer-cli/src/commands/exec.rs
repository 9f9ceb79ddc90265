//! `minicontainer exec` — Execute a command in a running container.

use clap::Args;
use minicontainer_runtime::exec::exec_in_container;
use minicontainer_runtime::state::StateStore;

/// Arguments for the `exec` command.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Container ID, ID prefix, or name.
    pub container: String,

    /// Command and arguments to run inside the container.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `exec` command.
///
/// The process exits with the inner command's exit code.
///
/// # Errors
///
/// Returns an error if the container cannot be resolved or is not
/// running.
pub fn execute(args: ExecArgs) -> anyhow::Result<()> {
    let store = StateStore::default_store();
    let mut state = store
        .find(&args.container)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    store.refresh(&mut state).map_err(|e| anyhow::anyhow!("{e}"))?;

    let code = exec_in_container(&state, &args.command).map_err(|e| anyhow::anyhow!("{e}"))?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
