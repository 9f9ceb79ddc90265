//! The local image store.
//!
//! On-disk layout:
//!
//! ```text
//! <image-root>/<name>/<tag>/manifest.json
//! <layer-root>/<hex>/            ← extracted tree, named by archive digest
//! ```
//!
//! Layers are content-addressable and shared across images; no reference
//! counts are kept, so garbage collection is a scan of all manifests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;

use minicontainer_common::constants::{DEFAULT_IMAGE_ROOT, DEFAULT_LAYER_ROOT};
use minicontainer_common::error::{MinicontainerError, Result};
use minicontainer_common::types::Digest;

use crate::hash;
use crate::layer;
use crate::metadata::{ImageMetadata, MANIFEST_FILE};
use crate::reference::{split_name_tag, Reference};
use crate::registry::RegistryClient;

/// Shortest image-ID prefix accepted for lookup by ID.
const MIN_ID_PREFIX: usize = 4;

/// Handle to the image and layer roots.
#[derive(Debug, Clone)]
pub struct ImageStore {
    image_root: PathBuf,
    layer_root: PathBuf,
}

impl ImageStore {
    /// Creates a store over explicit roots.
    #[must_use]
    pub fn new(image_root: impl Into<PathBuf>, layer_root: impl Into<PathBuf>) -> Self {
        Self {
            image_root: image_root.into(),
            layer_root: layer_root.into(),
        }
    }

    /// Returns the store at the default host paths.
    #[must_use]
    pub fn default_store() -> Self {
        Self::new(DEFAULT_IMAGE_ROOT, DEFAULT_LAYER_ROOT)
    }

    /// Returns the directory holding one image's manifest.
    #[must_use]
    pub fn image_dir(&self, name: &str, tag: &str) -> PathBuf {
        self.image_root.join(name).join(tag)
    }

    /// Returns the directory a layer extracts into (bare hex, no prefix).
    #[must_use]
    pub fn layer_dir(&self, digest: &Digest) -> PathBuf {
        self.layer_root.join(digest.hex())
    }

    /// Checks whether a layer is already extracted.
    #[must_use]
    pub fn layer_exists(&self, digest: &Digest) -> bool {
        self.layer_dir(digest).is_dir()
    }

    /// Creates the image and layer roots if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn ensure_roots(&self) -> Result<()> {
        for root in [&self.image_root, &self.layer_root] {
            std::fs::create_dir_all(root).map_err(|e| MinicontainerError::Io {
                path: root.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Imports a local tarball as a single-layer image.
    ///
    /// The layer is named by the digest of the archive bytes; an already
    /// extracted layer is reused without touching it.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing, extraction, or the manifest write
    /// fails.
    pub fn import(&self, tarball: &Path, raw_ref: &str) -> Result<ImageMetadata> {
        let (name, tag) = split_name_tag(raw_ref);
        self.ensure_roots()?;

        let digest = hash::hash_file(tarball)?;
        let size = self.materialize_layer(tarball, &digest)?;

        let meta = ImageMetadata {
            id: digest.hex().to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
            layers: vec![digest.to_string()],
            config_digest: String::new(),
            created_at: Utc::now(),
            size,
        };
        meta.save(&self.image_dir(name, tag))?;
        tracing::info!(name, tag, id = %meta.id, "image imported");
        Ok(meta)
    }

    /// Resolves a reference to its ordered layer directories, bottom to
    /// top.
    ///
    /// Callers stack the list as overlay lowerdirs; single-layer images
    /// are the one-element case.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for a missing image or layer, or `StateCorrupt`
    /// for a manifest with no or malformed layers.
    pub fn lookup(&self, raw_ref: &str) -> Result<Vec<PathBuf>> {
        let (name, tag) = split_name_tag(raw_ref);
        let image_dir = self.image_dir(name, tag);
        let meta = match ImageMetadata::load(&image_dir) {
            Ok(meta) => meta,
            Err(MinicontainerError::NotFound { .. }) => {
                return Err(MinicontainerError::NotFound {
                    kind: "image",
                    id: format!("{name}:{tag}"),
                })
            }
            Err(e) => return Err(e),
        };

        if meta.layers.is_empty() {
            return Err(MinicontainerError::StateCorrupt {
                path: image_dir.join(MANIFEST_FILE),
                message: format!("image {name}:{tag} has no layers"),
            });
        }

        let mut dirs = Vec::with_capacity(meta.layers.len());
        for layer_ref in &meta.layers {
            let digest = Digest::parse(layer_ref).map_err(|_| MinicontainerError::StateCorrupt {
                path: image_dir.join(MANIFEST_FILE),
                message: format!("malformed layer digest {layer_ref}"),
            })?;
            if !self.layer_exists(&digest) {
                return Err(MinicontainerError::NotFound {
                    kind: "layer",
                    id: digest.to_string(),
                });
            }
            dirs.push(self.layer_dir(&digest));
        }
        Ok(dirs)
    }

    /// Lists every parseable manifest in the store.
    ///
    /// Non-directories, unreadable subtrees, and unparseable manifests are
    /// skipped; a missing image root yields an empty list.
    ///
    /// # Errors
    ///
    /// Currently infallible in practice; the signature matches the other
    /// store operations.
    pub fn list(&self) -> Result<Vec<ImageMetadata>> {
        let mut images = Vec::new();
        if self.image_root.is_dir() {
            collect_manifests(&self.image_root, &mut images);
        }
        Ok(images)
    }

    /// Removes an image by `name[:tag]` or by exact/prefix image ID.
    ///
    /// Deletes the manifest directory, prunes emptied name directories,
    /// then removes any layers referenced only by the removed manifest.
    /// Layer removal is best-effort and idempotent; a layer that vanished
    /// in a race is success.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing matches, `Ambiguous` for an ID prefix
    /// with several matches, or an I/O error from the manifest removal.
    pub fn remove(&self, ref_or_id: &str) -> Result<ImageMetadata> {
        let meta = {
            let (name, tag) = split_name_tag(ref_or_id);
            match ImageMetadata::load(&self.image_dir(name, tag)) {
                Ok(meta) => meta,
                Err(MinicontainerError::NotFound { .. }) => self.find_by_id(ref_or_id)?,
                Err(e) => return Err(e),
            }
        };

        let image_dir = self.image_dir(&meta.name, &meta.tag);
        std::fs::remove_dir_all(&image_dir).map_err(|e| MinicontainerError::Io {
            path: image_dir.clone(),
            source: e,
        })?;
        self.prune_empty_parents(&image_dir);

        let referenced: HashSet<String> = self
            .list()?
            .into_iter()
            .flat_map(|m| m.layers)
            .collect();
        for layer_ref in &meta.layers {
            if referenced.contains(layer_ref) {
                continue;
            }
            if let Ok(digest) = Digest::parse(layer_ref) {
                let dir = self.layer_dir(&digest);
                if let Err(e) = std::fs::remove_dir_all(&dir) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(layer = %dir.display(), error = %e, "failed to remove layer");
                    }
                }
            }
        }

        tracing::info!(name = %meta.name, tag = %meta.tag, "image removed");
        Ok(meta)
    }

    /// Pulls an image from its registry into the store.
    ///
    /// Each blob is downloaded to a temp file, checked against the
    /// declared Content-Length and the declared digest, then extracted.
    /// Layers already present are skipped.
    ///
    /// # Errors
    ///
    /// Returns registry errors for transport failures, `DigestMismatch`
    /// for a blob that hashes differently than declared, or I/O errors
    /// from extraction.
    pub fn pull(&self, raw_ref: &str) -> Result<ImageMetadata> {
        let reference = Reference::parse(raw_ref);
        self.ensure_roots()?;

        let mut client = RegistryClient::new(reference.clone())?;
        client.authenticate()?;
        let manifest = client.fetch_manifest()?;
        if manifest.schema_version != 2 {
            return Err(MinicontainerError::Registry {
                message: format!("unsupported manifest schema {}", manifest.schema_version),
            });
        }

        let mut layers = Vec::with_capacity(manifest.layers.len());
        let mut total_size = 0u64;
        for (index, descriptor) in manifest.layers.iter().enumerate() {
            let digest = Digest::parse(&descriptor.digest).map_err(|_| {
                MinicontainerError::Registry {
                    message: format!("malformed layer digest {}", descriptor.digest),
                }
            })?;
            tracing::info!(
                layer = index + 1,
                total = manifest.layers.len(),
                digest = %digest,
                "fetching layer"
            );

            if self.layer_exists(&digest) {
                tracing::debug!(digest = %digest, "layer already present, skipping");
                layers.push(digest.to_string());
                continue;
            }

            let mut blob = tempfile::NamedTempFile::new().map_err(|e| MinicontainerError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;
            let (written, declared_len) = client.fetch_blob(&descriptor.digest, blob.as_file_mut())?;
            if let Some(expected) = declared_len {
                if written != expected {
                    return Err(MinicontainerError::Registry {
                        message: format!(
                            "blob size mismatch for {digest}: expected {expected}, got {written}"
                        ),
                    });
                }
            }
            // The registry's declared digest is authoritative; the blob
            // must hash to it before the layer is accepted.
            hash::verify_file(blob.path(), &digest)?;

            self.materialize_layer(blob.path(), &digest)?;
            total_size += written;
            layers.push(digest.to_string());
        }

        let config_digest = Digest::parse(&manifest.config.digest).map_err(|_| {
            MinicontainerError::Registry {
                message: format!("malformed config digest {}", manifest.config.digest),
            }
        })?;

        let (name, tag) = split_name_tag(raw_ref);
        let meta = ImageMetadata {
            id: config_digest.hex().to_string(),
            name: name.to_string(),
            tag: tag.to_string(),
            layers,
            config_digest: config_digest.to_string(),
            created_at: Utc::now(),
            size: total_size,
        };
        meta.save(&self.image_dir(name, tag))?;
        tracing::info!(name, tag, id = %meta.id, "image pulled");
        Ok(meta)
    }

    /// Finds an image by exact or prefix ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing matches and `Ambiguous` when a
    /// prefix matches several images.
    pub fn find_by_id(&self, id: &str) -> Result<ImageMetadata> {
        let mut matches: Vec<ImageMetadata> = self
            .list()?
            .into_iter()
            .filter(|img| {
                img.id == id || (id.len() >= MIN_ID_PREFIX && img.id.starts_with(id))
            })
            .collect();
        match matches.len() {
            0 => Err(MinicontainerError::NotFound {
                kind: "image",
                id: id.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            n => Err(MinicontainerError::Ambiguous {
                kind: "image",
                query: id.to_string(),
                matches: n,
            }),
        }
    }

    /// Extracts a layer archive into its content-addressed directory.
    ///
    /// Skips extraction when the directory already exists; removes a
    /// partial directory when extraction fails. Returns the extracted
    /// tree size.
    fn materialize_layer(&self, tarball: &Path, digest: &Digest) -> Result<u64> {
        let dir = self.layer_dir(digest);
        if dir.is_dir() {
            tracing::debug!(digest = %digest, "layer cached");
            return layer::dir_size(&dir);
        }
        std::fs::create_dir_all(&dir).map_err(|e| MinicontainerError::Io {
            path: dir.clone(),
            source: e,
        })?;
        if let Err(e) = layer::extract_tarball(tarball, &dir) {
            let _ = std::fs::remove_dir_all(&dir);
            return Err(e);
        }
        layer::dir_size(&dir)
    }

    /// Removes now-empty name directories up to the image root.
    fn prune_empty_parents(&self, image_dir: &Path) {
        let mut current = image_dir.parent();
        while let Some(dir) = current {
            if dir == self.image_root || std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

/// Recursively collects parseable manifests under `dir`.
fn collect_manifests(dir: &Path, out: &mut Vec<ImageMetadata>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(MANIFEST_FILE).is_file() {
            match ImageMetadata::load(&path) {
                Ok(meta) => out.push(meta),
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "skipping unparseable manifest");
                }
            }
        } else {
            collect_manifests(&path, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> ImageStore {
        ImageStore::new(dir.join("images"), dir.join("layers"))
    }

    fn write_tarball(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let mut builder = tar::Builder::new(Vec::new());
        for (file, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, file, *content).expect("append");
        }
        let bytes = builder.into_inner().expect("tar");
        let path = dir.join(name);
        std::fs::write(&path, bytes).expect("write tarball");
        path
    }

    #[test]
    fn import_creates_manifest_and_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "rootfs.tar", &[("bin/sh", b"#!")]);

        let meta = store.import(&tarball, "alpine:test").expect("import");
        assert_eq!(meta.name, "alpine");
        assert_eq!(meta.tag, "test");
        assert_eq!(meta.layers.len(), 1);
        assert_eq!(meta.id.len(), 64);
        assert!(meta.config_digest.is_empty());

        let digest = Digest::parse(&meta.layers[0]).expect("digest");
        assert!(store.layer_exists(&digest));
        assert!(store
            .image_dir("alpine", "test")
            .join(MANIFEST_FILE)
            .is_file());
    }

    #[test]
    fn import_defaults_tag_to_latest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "rootfs.tar", &[("etc/os", b"x")]);

        let meta = store.import(&tarball, "alpine").expect("import");
        assert_eq!(meta.tag, "latest");
    }

    #[test]
    fn second_import_reuses_extracted_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "rootfs.tar", &[("bin/sh", b"#!")]);

        let first = store.import(&tarball, "a:1").expect("first import");
        let digest = Digest::parse(&first.layers[0]).expect("digest");

        // A marker in the layer directory survives the second import only
        // if extraction was skipped.
        let marker = store.layer_dir(&digest).join("marker");
        std::fs::write(&marker, b"untouched").expect("marker");

        let second = store.import(&tarball, "b:1").expect("second import");
        assert_eq!(first.layers, second.layers);
        assert!(marker.is_file());
    }

    #[test]
    fn lookup_returns_layer_directories_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "rootfs.tar", &[("bin/sh", b"#!")]);

        let meta = store.import(&tarball, "alpine:test").expect("import");
        let digest = Digest::parse(&meta.layers[0]).expect("digest");

        let dirs = store.lookup("alpine:test").expect("lookup");
        assert_eq!(dirs, vec![store.layer_dir(&digest)]);
    }

    #[test]
    fn lookup_missing_image_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let err = store.lookup("ghost:latest").expect_err("missing");
        assert!(matches!(err, MinicontainerError::NotFound { kind: "image", .. }));
    }

    #[test]
    fn lookup_with_deleted_layer_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "rootfs.tar", &[("bin/sh", b"#!")]);

        let meta = store.import(&tarball, "alpine:test").expect("import");
        let digest = Digest::parse(&meta.layers[0]).expect("digest");
        std::fs::remove_dir_all(store.layer_dir(&digest)).expect("delete layer");

        let err = store.lookup("alpine:test").expect_err("layer gone");
        assert!(matches!(err, MinicontainerError::NotFound { kind: "layer", .. }));
    }

    #[test]
    fn list_returns_all_images() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let a = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);
        let b = write_tarball(dir.path(), "b.tar", &[("b", b"b")]);

        store.import(&a, "one:latest").expect("import one");
        store.import(&b, "two:v2").expect("import two");

        let mut names: Vec<String> = store.list().expect("list").into_iter().map(|m| m.name).collect();
        names.sort();
        assert_eq!(names, vec!["one", "two"]);
    }

    #[test]
    fn list_skips_corrupt_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let a = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);
        store.import(&a, "good:latest").expect("import");

        let bad_dir = dir.path().join("images/bad/latest");
        std::fs::create_dir_all(&bad_dir).expect("mkdir");
        std::fs::write(bad_dir.join(MANIFEST_FILE), b"{ not json").expect("corrupt");

        let images = store.list().expect("list");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "good");
    }

    #[test]
    fn list_empty_store_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        assert!(store.list().expect("list").is_empty());
    }

    #[test]
    fn remove_deletes_manifest_and_unreferenced_layer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);

        let meta = store.import(&tarball, "solo:latest").expect("import");
        let digest = Digest::parse(&meta.layers[0]).expect("digest");

        store.remove("solo:latest").expect("remove");
        assert!(!store.image_dir("solo", "latest").exists());
        assert!(!store.layer_exists(&digest));
        assert!(!dir.path().join("images/solo").exists());
    }

    #[test]
    fn remove_keeps_layer_shared_with_other_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);

        store.import(&tarball, "first:latest").expect("import first");
        let second = store.import(&tarball, "second:latest").expect("import second");
        let digest = Digest::parse(&second.layers[0]).expect("digest");

        store.remove("first:latest").expect("remove");
        assert!(store.layer_exists(&digest), "shared layer must survive");
        assert!(store.lookup("second:latest").is_ok());
    }

    #[test]
    fn remove_unknown_image_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let err = store.remove("ghost:latest").expect_err("missing");
        assert!(matches!(err, MinicontainerError::NotFound { .. }));
    }

    #[test]
    fn remove_by_id_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);

        let meta = store.import(&tarball, "byid:latest").expect("import");
        store.remove(&meta.id[..12]).expect("remove by short id");
        assert!(!store.image_dir("byid", "latest").exists());
    }

    #[test]
    fn find_by_id_rejects_short_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let tarball = write_tarball(dir.path(), "a.tar", &[("a", b"a")]);
        store.import(&tarball, "x:latest").expect("import");

        assert!(store.find_by_id("ab").is_err());
    }
}
