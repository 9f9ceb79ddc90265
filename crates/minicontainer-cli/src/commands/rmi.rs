//! `minicontainer rmi` — Remove a local image.

use clap::Args;
use minicontainer_image::storage::ImageStore;

/// Arguments for the `rmi` command.
#[derive(Args, Debug)]
pub struct RmiArgs {
    /// Image reference (`name[:tag]`) or image ID prefix.
    pub image: String,
}

/// Executes the `rmi` command.
///
/// # Errors
///
/// Returns an error if the image cannot be resolved or removed.
pub fn execute(args: RmiArgs) -> anyhow::Result<()> {
    let store = ImageStore::default_store();
    let meta = store.remove(&args.image).map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", &meta.id[..meta.id.len().min(12)]);
    Ok(())
}
