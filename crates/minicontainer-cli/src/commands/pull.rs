//! `minicontainer pull` — Pull an image from a registry.

use clap::Args;
use minicontainer_image::storage::ImageStore;

/// Arguments for the `pull` command.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Image reference, e.g. `alpine:3.19` or `ghcr.io/org/app:v1`.
    pub reference: String,
}

/// Executes the `pull` command.
///
/// # Errors
///
/// Returns an error if the registry fetch, digest verification, or layer
/// extraction fails.
pub fn execute(args: PullArgs) -> anyhow::Result<()> {
    let store = ImageStore::default_store();
    let meta = store
        .pull(&args.reference)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}:{} ({})", meta.name, meta.tag, &meta.id[..meta.id.len().min(12)]);
    Ok(())
}
