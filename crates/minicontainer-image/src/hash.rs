//! SHA-256 content digests.
//!
//! Digests name layers on disk and validate downloaded blobs against what
//! the registry declared.

use std::path::Path;

use sha2::{Digest as _, Sha256};

use minicontainer_common::error::{MinicontainerError, Result};
use minicontainer_common::types::Digest;

/// Computes the SHA-256 digest of a file.
///
/// Streams the content through the hasher, so memory use is bounded
/// regardless of file size.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn hash_file(path: &Path) -> Result<Digest> {
    let mut file = std::fs::File::open(path).map_err(|e| MinicontainerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| MinicontainerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Digest::from_hex(hex::encode(hasher.finalize()))
}

/// Validates that a file matches the expected digest.
///
/// # Errors
///
/// Returns [`MinicontainerError::DigestMismatch`] when the content hashes
/// to something else, or an I/O error if the file cannot be read.
pub fn verify_file(path: &Path, expected: &Digest) -> Result<()> {
    let actual = hash_file(path)?;
    if &actual != expected {
        return Err(MinicontainerError::DigestMismatch {
            resource: path.display().to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_matches_known_vector() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, b"abc").expect("write");
        let digest = hash_file(&path).expect("hash");
        assert_eq!(
            digest.hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty");
        std::fs::write(&path, b"").expect("write");
        let digest = hash_file(&path).expect("hash");
        assert_eq!(
            digest.hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_file_accepts_matching_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, b"content").expect("write");
        let digest = hash_file(&path).expect("hash");
        assert!(verify_file(&path, &digest).is_ok());
    }

    #[test]
    fn verify_file_rejects_other_digest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data");
        std::fs::write(&path, b"content").expect("write");
        let wrong = Digest::from_hex("0".repeat(64)).expect("digest");
        let err = verify_file(&path, &wrong).expect_err("must mismatch");
        assert!(matches!(
            err,
            MinicontainerError::DigestMismatch { .. }
        ));
    }
}
