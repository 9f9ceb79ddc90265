//! `minicontainer import` — Import a rootfs tarball as an image.

use std::path::PathBuf;

use clap::Args;
use minicontainer_image::storage::ImageStore;

/// Arguments for the `import` command.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Path to a .tar or .tar.gz rootfs archive.
    pub tarball: PathBuf,

    /// Image reference to store it under, e.g. `alpine:test`.
    pub reference: String,
}

/// Executes the `import` command and prints the short image ID.
///
/// # Errors
///
/// Returns an error if hashing, extraction, or the manifest write fails.
pub fn execute(args: ImportArgs) -> anyhow::Result<()> {
    let store = ImageStore::default_store();
    let meta = store
        .import(&args.tarball, &args.reference)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    println!("{}", &meta.id[..meta.id.len().min(12)]);
    Ok(())
}
