//! Layer archive extraction.
//!
//! Layers arrive as tar archives, optionally gzip-compressed. Compression
//! is detected from the magic bytes rather than the file name, since blobs
//! downloaded from a registry carry no extension.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::GzDecoder;

use minicontainer_common::error::{MinicontainerError, Result};

/// Extracts a tar archive (gzipped or plain) into `dest`.
///
/// # Errors
///
/// Returns an error if the archive cannot be read or unpacked.
pub fn extract_tarball(tarball: &Path, dest: &Path) -> Result<()> {
    let mut file = std::fs::File::open(tarball).map_err(|e| MinicontainerError::Io {
        path: tarball.to_path_buf(),
        source: e,
    })?;

    let mut magic = [0u8; 2];
    let n = file.read(&mut magic).map_err(|e| MinicontainerError::Io {
        path: tarball.to_path_buf(),
        source: e,
    })?;
    file.seek(SeekFrom::Start(0)).map_err(|e| MinicontainerError::Io {
        path: tarball.to_path_buf(),
        source: e,
    })?;

    let reader: Box<dyn Read> = if n == 2 && magic == [0x1f, 0x8b] {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.unpack(dest).map_err(|e| MinicontainerError::Io {
        path: dest.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(archive = %tarball.display(), dest = %dest.display(), "layer extracted");
    Ok(())
}

/// Returns the total size in bytes of all regular files under `path`.
///
/// Symlinks are not followed.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut total = 0;
    let entries = std::fs::read_dir(path).map_err(|e| MinicontainerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| MinicontainerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let meta = entry.path().symlink_metadata().map_err(|e| MinicontainerError::Io {
            path: entry.path(),
            source: e,
        })?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn build_tar(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).expect("append");
        }
        builder.into_inner().expect("finish tar")
    }

    #[test]
    fn extract_plain_tar() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tar_path = dir.path().join("layer.tar");
        std::fs::write(&tar_path, build_tar(&[("hello.txt", b"hi")])).expect("write tar");

        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).expect("mkdir");
        extract_tarball(&tar_path, &dest).expect("extract");

        let content = std::fs::read_to_string(dest.join("hello.txt")).expect("read");
        assert_eq!(content, "hi");
    }

    #[test]
    fn extract_gzipped_tar_by_magic_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tar_bytes = build_tar(&[("a/b.txt", b"nested")]);

        let tar_path = dir.path().join("layer.bin");
        let file = std::fs::File::create(&tar_path).expect("create");
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(&tar_bytes).expect("compress");
        encoder.finish().expect("finish gzip");

        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).expect("mkdir");
        extract_tarball(&tar_path, &dest).expect("extract");

        let content = std::fs::read_to_string(dest.join("a/b.txt")).expect("read");
        assert_eq!(content, "nested");
    }

    #[test]
    fn extract_garbage_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let bad = dir.path().join("bad.tar");
        std::fs::write(&bad, b"this is not a tar archive at all").expect("write");
        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).expect("mkdir");
        assert!(extract_tarball(&bad, &dest).is_err());
    }

    #[test]
    fn dir_size_sums_regular_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("a"), vec![0u8; 100]).expect("write a");
        std::fs::create_dir(dir.path().join("sub")).expect("mkdir");
        std::fs::write(dir.path().join("sub/b"), vec![0u8; 50]).expect("write b");

        assert_eq!(dir_size(dir.path()).expect("size"), 150);
    }

    #[test]
    fn dir_size_of_empty_dir_is_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(dir_size(dir.path()).expect("size"), 0);
    }
}
