//! Hashing utilities for archive checksums and upload integrity.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{PathContext, Result};

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buffer = [0u8; 8192];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Compute MD5 hash of bytes.
pub fn md5_bytes(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Compute MD5 hash of a reader.
pub fn md5_reader<R: Read>(reader: R) -> std::io::Result<String> {
    digest_reader::<Md5, R>(reader)
}

/// Compute SHA256 hash of bytes.
pub fn sha256_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Compute SHA256 hash of a reader.
pub fn sha256_reader<R: Read>(reader: R) -> std::io::Result<String> {
    digest_reader::<Sha256, R>(reader)
}

/// Stream a file through MD5.
pub fn md5_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_path(path)?;
    md5_reader(file).with_path(path)
}

/// Stream a file through SHA256.
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).with_path(path)?;
    sha256_reader(file).with_path(path)
}

/// Path of the checksum file that sits next to `archive`.
pub fn checksum_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_owned();
    name.push(".md5");
    PathBuf::from(name)
}

/// Hash the finished archive and write the lowercase hex digest to
/// `<archive>.md5`, with nothing after the digest.
pub fn write_checksum_file(archive: &Path) -> Result<(PathBuf, String)> {
    let hash = md5_file(archive)?;
    let target = checksum_path(archive);
    std::fs::write(&target, &hash).with_path(&target)?;
    Ok((target, hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_bytes() {
        assert_eq!(md5_bytes(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_md5_reader_matches_bytes() {
        let data = vec![7u8; 20_000];
        assert_eq!(md5_reader(&data[..]).unwrap(), md5_bytes(&data));
    }

    #[test]
    fn test_sha256_bytes() {
        let hash = sha256_bytes(b"hello world");
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_checksum_path() {
        assert_eq!(
            checksum_path(Path::new("out/pkg.unitypackage")),
            PathBuf::from("out/pkg.unitypackage.md5")
        );
    }

    #[test]
    fn test_write_checksum_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        std::fs::write(&archive, b"hello world").unwrap();

        let (path, hash) = write_checksum_file(&archive).unwrap();

        assert_eq!(path, dir.path().join("pkg.zip.md5"));
        assert_eq!(hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), hash);
    }
}
