//! CLI command definitions and dispatch.

pub mod exec;
pub mod images;
pub mod import;
pub mod init;
pub mod inspect;
pub mod logs;
pub mod prune;
pub mod ps;
pub mod pull;
pub mod rm;
pub mod rmi;
pub mod run;
pub mod stop;

use clap::{Parser, Subcommand};

/// minicontainer — minimal OCI-style container runtime for Linux.
#[derive(Parser, Debug)]
#[command(name = "minicontainer", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command in a new container.
    Run(run::RunArgs),
    /// Execute a command inside a running container.
    Exec(exec::ExecArgs),
    /// Stop a running container.
    Stop(stop::StopArgs),
    /// Remove a stopped container.
    Rm(rm::RmArgs),
    /// List containers.
    Ps(ps::PsArgs),
    /// Remove stale overlay scratch directories.
    Prune(prune::PruneArgs),
    /// List local images.
    Images(images::ImagesArgs),
    /// Pull an image from a registry.
    Pull(pull::PullArgs),
    /// Import a rootfs tarball as an image.
    Import(import::ImportArgs),
    /// Remove a local image.
    Rmi(rmi::RmiArgs),
    /// Show a container's logs.
    Logs(logs::LogsArgs),
    /// Show a container's state record.
    Inspect(inspect::InspectArgs),
    /// Show the runtime version.
    Version,
    /// Internal re-exec target that runs inside the new namespaces.
    #[command(hide = true)]
    Init(init::InitArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run(args) => run::execute(args),
        Command::Exec(args) => exec::execute(args),
        Command::Stop(args) => stop::execute(args),
        Command::Rm(args) => rm::execute(args),
        Command::Ps(args) => ps::execute(args),
        Command::Prune(args) => prune::execute(args),
        Command::Images(args) => images::execute(args),
        Command::Pull(args) => pull::execute(args),
        Command::Import(args) => import::execute(args),
        Command::Rmi(args) => rmi::execute(args),
        Command::Logs(args) => logs::execute(args),
        Command::Inspect(args) => inspect::execute(args),
        Command::Version => {
            println!("minicontainer version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init(args) => init::execute(args),
    }
}
