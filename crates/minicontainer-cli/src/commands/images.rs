//! `minicontainer images` — List local images.

use clap::Args;
use minicontainer_image::storage::ImageStore;

use crate::output;

/// Arguments for the `images` command.
#[derive(Args, Debug)]
pub struct ImagesArgs {}

/// Executes the `images` command.
///
/// # Errors
///
/// Returns an error if the image store cannot be listed.
pub fn execute(_args: ImagesArgs) -> anyhow::Result<()> {
    let store = ImageStore::default_store();
    let images = store.list().map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "{:<24}  {:<12}  {:<14}  {:<22}  {}",
        "REPOSITORY", "TAG", "IMAGE ID", "CREATED", "SIZE"
    );
    for image in &images {
        println!(
            "{:<24}  {:<12}  {:<14}  {:<22}  {}",
            output::truncate(&image.name, 24),
            image.tag,
            &image.id[..image.id.len().min(12)],
            image.created_at.format("%Y-%m-%d %H:%M:%S"),
            output::format_bytes(image.size)
        );
    }
    Ok(())
}
