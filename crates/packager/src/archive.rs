//! Deterministic tar.gz assembly of a staged tree.

use crate::ignore::IgnoreRules;
use crate::scanner::Scanner;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::info;
use unitypack_common::hash::write_checksum_file;
use unitypack_common::{Error, PathContext, Result, Timestamp};

/// Sorted relative paths of everything that goes into an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveManifest {
    entries: Vec<String>,
}

impl ArchiveManifest {
    /// List every entry under `root`, including each intermediate
    /// directory, deduplicated and sorted byte-wise.
    pub fn from_dir(root: &Path) -> Result<Self> {
        let mut paths = BTreeSet::new();

        for entry in Scanner::new(root, IgnoreRules::default()) {
            let entry = entry?;
            let mut current = entry.relative.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                paths.insert(parent.to_string());
                current = parent;
            }
            paths.insert(entry.relative);
        }

        Ok(Self {
            entries: paths.into_iter().collect(),
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What an archive run produced.
#[derive(Debug, Clone)]
pub struct ArchiveOutput {
    pub archive: PathBuf,
    pub checksum_file: PathBuf,
    /// Lowercase hex MD5 of the archive bytes.
    pub checksum: String,
    pub manifest: ArchiveManifest,
}

/// Write the manifest entries of `root` into a gzip-compressed tarball.
///
/// Only the listed paths are added; directories are never recursed into
/// by the writer. Ownership is zeroed and every entry carries `mtime`.
pub fn write_tar_gz(
    root: &Path,
    manifest: &ArchiveManifest,
    dest: &Path,
    mtime: Timestamp,
) -> Result<()> {
    let file = File::create(dest).with_path(dest)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut archive = Builder::new(encoder);

    for relative in manifest.entries() {
        let source = root.join(relative);
        let metadata = std::fs::metadata(&source).with_path(&source)?;

        let mut header = Header::new_gnu();
        header.set_mtime(mtime.unix_seconds());
        header.set_uid(0);
        header.set_gid(0);

        if metadata.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            header.set_cksum();
            archive
                .append_data(&mut header, format!("{}/", relative), std::io::empty())
                .with_path(&source)?;
        } else {
            header.set_entry_type(EntryType::Regular);
            header.set_size(metadata.len());
            header.set_mode(0o644);
            header.set_cksum();
            let content = File::open(&source).with_path(&source)?;
            archive
                .append_data(&mut header, relative, content)
                .with_path(&source)?;
        }
    }

    let encoder = archive.into_inner().with_path(dest)?;
    let mut writer = encoder.finish().with_path(dest)?;
    writer.flush().with_path(dest)?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::fs(dest, e.into_error()))?;
    file.sync_all().with_path(dest)?;

    Ok(())
}

/// Archive `root` into `dest`, then hash the finished file into
/// `<dest>.md5`.
pub fn build_archive(root: &Path, dest: &Path, mtime: Timestamp) -> Result<ArchiveOutput> {
    let manifest = ArchiveManifest::from_dir(root)?;

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
    }

    info!("Archiving {} entries into {}", manifest.len(), dest.display());
    write_tar_gz(root, &manifest, dest, mtime)?;

    let (checksum_file, checksum) = write_checksum_file(dest)?;

    Ok(ArchiveOutput {
        archive: dest.to_path_buf(),
        checksum_file,
        checksum,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use tar::Archive;

    fn staged() -> assert_fs::TempDir {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("dir001/pathname").write_str("Assets/Sub").unwrap();
        temp.child("dir001/asset.meta").write_str("guid: dir001").unwrap();
        temp.child("abc123/pathname").write_str("Assets/Foo.cs").unwrap();
        temp.child("abc123/asset.meta").write_str("guid: abc123").unwrap();
        temp.child("abc123/asset").write_str("class Foo {}").unwrap();
        temp
    }

    fn read_entries(path: &Path) -> Vec<(String, EntryType, u64, Vec<u8>)> {
        let mut archive = Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string();
                let kind = entry.header().entry_type();
                let mtime = entry.header().mtime().unwrap();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (name, kind, mtime, content)
            })
            .collect()
    }

    #[test]
    fn test_manifest_sorted_with_directories() {
        let temp = staged();
        temp.child("nested/a/b/leaf").write_str("x").unwrap();

        let manifest = ArchiveManifest::from_dir(temp.path()).unwrap();

        assert_eq!(
            manifest.entries(),
            &[
                "abc123",
                "abc123/asset",
                "abc123/asset.meta",
                "abc123/pathname",
                "dir001",
                "dir001/asset.meta",
                "dir001/pathname",
                "nested",
                "nested/a",
                "nested/a/b",
                "nested/a/b/leaf",
            ]
        );
    }

    #[test]
    fn test_archive_follows_manifest_order() {
        let temp = staged();
        let out = assert_fs::TempDir::new().unwrap();
        let dest = out.path().join("pkg.unitypackage");
        let mtime = Timestamp::from_unix(1_500_000_000).unwrap();

        let output = build_archive(temp.path(), &dest, mtime).unwrap();
        let entries = read_entries(&dest);

        let names: Vec<&str> = entries.iter().map(|(n, ..)| n.as_str()).collect();
        assert_eq!(names, output.manifest.entries());
        assert_eq!(entries[0].1, EntryType::Directory);
        assert_eq!(entries[1].1, EntryType::Regular);
        assert_eq!(entries[1].3, b"class Foo {}");
        assert!(entries.iter().all(|(_, _, t, _)| *t == 1_500_000_000));
    }

    #[test]
    fn test_checksum_file_matches_archive_bytes() {
        let temp = staged();
        let out = assert_fs::TempDir::new().unwrap();
        let dest = out.path().join("nested/out/pkg.unitypackage");

        let output = build_archive(temp.path(), &dest, Timestamp::now()).unwrap();

        let bytes = std::fs::read(&dest).unwrap();
        let expected = unitypack_common::hash::md5_bytes(&bytes);
        assert_eq!(output.checksum, expected);
        assert_eq!(output.checksum_file, out.path().join("nested/out/pkg.unitypackage.md5"));
        assert_eq!(std::fs::read_to_string(&output.checksum_file).unwrap(), expected);
    }

    #[test]
    fn test_fixed_mtime_gives_identical_archives() {
        let temp = staged();
        let out = assert_fs::TempDir::new().unwrap();
        let mtime = Timestamp::from_unix(1_600_000_000).unwrap();

        let first = build_archive(temp.path(), &out.path().join("a.tgz"), mtime).unwrap();
        let second = build_archive(temp.path(), &out.path().join("b.tgz"), mtime).unwrap();

        assert_eq!(first.manifest, second.manifest);
        assert_eq!(first.checksum, second.checksum);
    }
}
