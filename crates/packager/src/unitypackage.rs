//! `.unitypackage` builder: scan, resolve, rewrite, archive.

use crate::archive::{build_archive, ArchiveManifest};
use crate::ignore::{IgnoreRules, UNITY_PACKAGE_IGNORES};
use crate::meta::{ResolvedAsset, Resolver};
use crate::rewriter::Rewriter;
use crate::scanner::Scanner;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use unitypack_common::{Error, PathContext, Result, Timestamp};

/// Extension of Unity package archives.
pub const UNITYPACKAGE_EXTENSION: &str = "unitypackage";

/// Prefix of the scratch directory holding the rewritten layout.
pub const SCRATCH_PREFIX: &str = "unitypackaging-";

/// Package builder configuration.
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// Unity project (or any directory with an `Assets/` subtree).
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Archive name without extension.
    pub file_stem: String,
    /// Evaluated in order; the last matching rule wins.
    pub ignore_rules: Vec<String>,
    /// Modification time stamped on every archive entry.
    pub mtime: Timestamp,
}

impl PackageConfig {
    /// Configuration with the default Unity ignore rules and the current time.
    pub fn new(
        source: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        file_stem: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            file_stem: file_stem.into(),
            ignore_rules: UNITY_PACKAGE_IGNORES.iter().map(|r| r.to_string()).collect(),
            mtime: Timestamp::now(),
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", self.file_stem, UNITYPACKAGE_EXTENSION))
    }

    /// Check the configuration before anything touches the disk.
    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            return Err(Error::Config(format!(
                "source path {} is not a directory",
                self.source.display()
            )));
        }
        if self.file_stem.trim().is_empty() {
            return Err(Error::Config("package file name is empty".to_string()));
        }
        if self.file_stem.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "package file name '{}' must not contain path separators",
                self.file_stem
            )));
        }
        Ok(())
    }
}

/// Outcome of a package run.
#[derive(Debug, Clone)]
pub struct PackageReport {
    pub archive: PathBuf,
    pub checksum_file: PathBuf,
    pub checksum: String,
    /// Assets written to the package.
    pub units: usize,
    /// Scanned entries without metadata.
    pub skipped: usize,
    pub manifest: ArchiveManifest,
}

/// Build `<out>/<file>.unitypackage` and its `.md5` from a source tree.
///
/// Entries without a `.meta` sidecar are skipped. Malformed metadata and
/// duplicate guids abort the run. The scratch directory is removed when
/// the run ends, successfully or not; a partially written archive is left
/// in place on failure.
pub async fn build_unity_package(config: &PackageConfig) -> Result<PackageReport> {
    config.validate()?;
    let rules = IgnoreRules::parse(&config.ignore_rules)?;
    let source = config.source.canonicalize().with_path(&config.source)?;

    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir()
        .map_err(Error::Io)?;
    debug!("Staging into {}", scratch.path().display());

    info!("Scanning {}", source.display());
    let scan_root = source.clone();
    let (assets, skipped) = blocking(move || resolve_tree(&scan_root, rules)).await?;

    let mut rewriter = Rewriter::new(&source, scratch.path());
    for asset in &assets {
        rewriter.dispatch(asset);
    }
    let units = rewriter.finish().await?;
    info!(
        "Rewrote {} assets ({} entries without metadata)",
        units.len(),
        skipped
    );

    let staged = scratch.path().to_path_buf();
    let dest = config.archive_path();
    let mtime = config.mtime;
    let output = blocking(move || build_archive(&staged, &dest, mtime)).await?;
    info!(
        "{} and {} created",
        output.archive.display(),
        output.checksum_file.display()
    );

    Ok(PackageReport {
        archive: output.archive,
        checksum_file: output.checksum_file,
        checksum: output.checksum,
        units: units.len(),
        skipped,
        manifest: output.manifest,
    })
}

/// Scan and resolve the whole tree, returning the assets in scan order and
/// the number of entries without metadata.
fn resolve_tree(source: &Path, rules: IgnoreRules) -> Result<(Vec<ResolvedAsset>, usize)> {
    let mut resolver = Resolver::new();
    let mut assets = Vec::new();
    let mut skipped = 0;

    for entry in Scanner::new(source, rules) {
        match resolver.resolve(entry?)? {
            Some(asset) => assets.push(asset),
            None => skipped += 1,
        }
    }
    debug!("Resolved {} assets", resolver.resolved());
    Ok((assets, skipped))
}

/// Run filesystem-heavy work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Other(format!("blocking task failed: {}", e)))?
}
