//! `minicontainer run` — Launch a container.

use std::path::PathBuf;

use clap::Args;
use minicontainer_common::config::ContainerConfig;
use minicontainer_runtime::supervisor::{RunOutcome, Supervisor};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Use an existing directory as the container root filesystem.
    #[arg(long)]
    pub rootfs: Option<PathBuf>,

    /// Hostname inside the container.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Container name for later reference (ps, stop, rm).
    #[arg(long)]
    pub name: Option<String>,

    /// Memory limit, e.g. 256m or 1g.
    #[arg(long)]
    pub memory: Option<String>,

    /// CPU limit in fractional cores, e.g. 0.5.
    #[arg(long)]
    pub cpus: Option<f64>,

    /// Maximum number of processes.
    #[arg(long)]
    pub pids: Option<u64>,

    /// Environment variable in KEY=VALUE form; repeatable.
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Volume mount in host:container[:ro] form; repeatable.
    #[arg(short = 'v', long = "volume")]
    pub volumes: Vec<String>,

    /// Run in the background and print the container ID.
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Remove the container record when it exits.
    #[arg(long = "rm")]
    pub auto_remove: bool,

    /// Keep stdin attached.
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Allocate a pseudo-terminal.
    #[arg(short = 't', long)]
    pub tty: bool,

    /// Image reference followed by the command, or just the command when
    /// --rootfs is given (or no filesystem isolation is wanted).
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

/// Executes the `run` command.
///
/// The first positional is taken as an image reference when it resolves
/// in the local image store and no `--rootfs` was given; otherwise the
/// positionals are the command itself.
///
/// # Errors
///
/// Returns an error if the launch pipeline fails.
pub fn execute(args: RunArgs) -> anyhow::Result<()> {
    let supervisor = Supervisor::default_supervisor();

    let (image, command) = split_image_and_command(&supervisor, &args);
    if command.is_empty() {
        anyhow::bail!("run requires a command");
    }

    let config = ContainerConfig {
        image,
        rootfs_path: args.rootfs,
        hostname: args.hostname,
        name: args.name,
        env: args.env,
        volumes: args.volumes,
        memory_limit: args.memory,
        cpu_limit: args.cpus,
        pids_limit: args.pids,
        detached: args.detach,
        interactive: args.interactive,
        allocate_tty: args.tty,
        auto_remove: args.auto_remove,
    };

    match supervisor
        .run(&config, command)
        .map_err(|e| anyhow::anyhow!("{e}"))?
    {
        RunOutcome::Detached { id } => {
            println!("{id}");
            Ok(())
        }
        RunOutcome::Attached { .. } => Ok(()),
    }
}

/// Splits the positionals into an optional image reference and the
/// command.
fn split_image_and_command(
    supervisor: &Supervisor,
    args: &RunArgs,
) -> (Option<String>, Vec<String>) {
    if args.rootfs.is_none() {
        if let Some(first) = args.command.first() {
            if supervisor.images().lookup(first).is_ok() {
                return (Some(first.clone()), args.command[1..].to_vec());
            }
        }
    }
    (None, args.command.clone())
}
