//! Whole-directory zip packaging with a fixed entry date.

use crate::ignore::IgnoreRules;
use crate::scanner::Scanner;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use unitypack_common::hash::write_checksum_file;
use unitypack_common::{Error, PathContext, Result, Timestamp};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Name used for the archive when none is given.
pub const DEFAULT_ZIP_NAME: &str = "octorun";

/// Directory zip configuration.
#[derive(Debug, Clone)]
pub struct ZipConfig {
    pub source: PathBuf,
    pub output_dir: PathBuf,
    /// Archive name without the `.zip` extension.
    pub name: String,
    /// Folder every entry is placed under; defaults to `name`. Empty
    /// places entries at the archive root.
    pub base: Option<String>,
    /// Entry date. Falls back to the last commit date of `source`.
    pub date: Option<Timestamp>,
}

impl ZipConfig {
    pub fn new(source: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            output_dir: output_dir.into(),
            name: DEFAULT_ZIP_NAME.to_string(),
            base: None,
            date: None,
        }
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zip", self.name))
    }

    pub fn base_dir(&self) -> &str {
        self.base.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            return Err(Error::Config(format!(
                "source path {} is not a directory",
                self.source.display()
            )));
        }
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return Err(Error::Config(format!("invalid archive name '{}'", self.name)));
        }
        Ok(())
    }
}

/// Outcome of a zip run.
#[derive(Debug, Clone)]
pub struct ZipReport {
    pub archive: PathBuf,
    pub checksum_file: PathBuf,
    pub checksum: String,
    pub date: Timestamp,
    /// Entry names in archive order.
    pub entries: Vec<String>,
}

/// Committer date of the last commit touching `dir`.
pub fn git_commit_date(dir: &Path) -> Option<Timestamp> {
    debug!("Local exec: git log -n1 --format=%cI . in {}", dir.display());
    let output = Command::new("git")
        .args(["log", "-n1", "--format=%cI", "."])
        .current_dir(dir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout).parse().ok()
}

fn resolve_date(config: &ZipConfig) -> Timestamp {
    if let Some(date) = config.date {
        return date;
    }
    match git_commit_date(&config.source) {
        Some(date) => date,
        None => {
            warn!(
                "No git history for {}, using the current time",
                config.source.display()
            );
            Timestamp::now()
        }
    }
}

fn zip_error(dest: &Path, e: ZipError) -> Error {
    match e {
        ZipError::Io(io) => Error::fs(dest, io),
        other => Error::Archive(other.to_string()),
    }
}

fn zip_datetime(date: Timestamp) -> Result<DateTime> {
    let (year, month, day, hour, minute, second) = date.civil();
    let year = u16::try_from(year).unwrap_or(0);
    DateTime::from_date_and_time(
        year,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
    )
    .map_err(|_| Error::Archive(format!("date {} cannot be stored in a zip archive", date)))
}

/// Write every file and directory under `source` into `dest`, below `base`.
///
/// Returns the entry names in the order they were written.
pub fn write_zip(source: &Path, base: &str, dest: &Path, date: Timestamp) -> Result<Vec<String>> {
    let modified = zip_datetime(date)?;
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(modified)
        .unix_permissions(0o644);
    let dir_options = SimpleFileOptions::default()
        .last_modified_time(modified)
        .unix_permissions(0o755);

    let file = File::create(dest).with_path(dest)?;
    let mut zip = ZipWriter::new(file);
    let mut entries = Vec::new();

    let base = base.trim_matches('/');
    if !base.is_empty() {
        let name = format!("{}/", base);
        zip.add_directory(name.as_str(), dir_options)
            .map_err(|e| zip_error(dest, e))?;
        entries.push(name);
    }

    for entry in Scanner::new(source, IgnoreRules::default()) {
        let entry = entry?;
        let name = if base.is_empty() {
            entry.relative.clone()
        } else {
            format!("{}/{}", base, entry.relative)
        };

        if entry.is_dir {
            let name = format!("{}/", name);
            zip.add_directory(name.as_str(), dir_options)
                .map_err(|e| zip_error(dest, e))?;
            entries.push(name);
        } else {
            zip.start_file(name.as_str(), file_options)
                .map_err(|e| zip_error(dest, e))?;
            let content = std::fs::read(&entry.path).with_path(&entry.path)?;
            zip.write_all(&content).with_path(dest)?;
            entries.push(name);
        }
    }

    let file = zip.finish().map_err(|e| zip_error(dest, e))?;
    file.sync_all().with_path(dest)?;
    Ok(entries)
}

/// Build `<out>/<name>.zip` and its `.md5` from a directory.
pub fn build_directory_zip(config: &ZipConfig) -> Result<ZipReport> {
    config.validate()?;
    let date = resolve_date(config);
    let dest = config.archive_path();
    std::fs::create_dir_all(&config.output_dir).with_path(&config.output_dir)?;

    info!("Zipping {} (dated {})", config.source.display(), date);
    let entries = write_zip(&config.source, config.base_dir(), &dest, date)?;
    let (checksum_file, checksum) = write_checksum_file(&dest)?;
    info!("{} and {} created", dest.display(), checksum_file.display());

    Ok(ZipReport {
        archive: dest,
        checksum_file,
        checksum,
        date,
        entries,
    })
}
