//! Image manifest metadata.
//!
//! One JSON record per `name:tag`, written next to nothing else in the
//! image directory. Every layer digest it references must correspond to an
//! extant layer directory at the time the manifest is written.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use minicontainer_common::error::{MinicontainerError, Result};

/// File name of the manifest inside `images/<name>/<tag>/`.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata for one stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Content-derived image ID (hex).
    pub id: String,
    /// Image name, e.g. `alpine`.
    pub name: String,
    /// Image tag, e.g. `latest`.
    pub tag: String,
    /// Layer digests in `sha256:<hex>` form, bottom to top.
    pub layers: Vec<String>,
    /// Digest of the config blob; empty for imported tarballs.
    pub config_digest: String,
    /// When the image was created or imported.
    pub created_at: DateTime<Utc>,
    /// Total size in bytes.
    pub size: u64,
}

impl ImageMetadata {
    /// Loads a manifest from its directory.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the manifest file is absent, or a
    /// serialization error if it cannot be parsed.
    pub fn load(image_dir: &Path) -> Result<Self> {
        let path = image_dir.join(MANIFEST_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MinicontainerError::NotFound {
                    kind: "image",
                    id: image_dir.display().to_string(),
                })
            }
            Err(e) => return Err(MinicontainerError::Io { path, source: e }),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the manifest into its directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, image_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(image_dir).map_err(|e| MinicontainerError::Io {
            path: image_dir.to_path_buf(),
            source: e,
        })?;
        let path = image_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|e| MinicontainerError::Io { path, source: e })?;
        tracing::debug!(name = %self.name, tag = %self.tag, "image manifest saved");
        Ok(())
    }
}
