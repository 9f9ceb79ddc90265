//! `minicontainer init` — Internal re-exec target.
//!
//! Runs inside the namespaces created by the supervisor's clone: sets the
//! hostname, pivots into the rootfs, mounts the pseudo-filesystems, and
//! execs the user command. Never invoked by users directly.

use clap::Args;

/// Arguments for the hidden `init` command.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// User command and arguments to exec after isolation finishes.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `init` command.
///
/// Returns only on failure; on success the process image is replaced by
/// the user command.
///
/// # Errors
///
/// Returns an error if any isolation step or the final exec fails.
pub fn execute(args: InitArgs) -> anyhow::Result<()> {
    minicontainer_runtime::init::run_init(&args.command).map_err(|e| anyhow::anyhow!("{e}"))
}
