//! Upload planning for release artefacts.
//!
//! Works out which local files go where in the object store and with which
//! headers. The upload itself is left to an external tool that consumes
//! the JSON plan.

use crate::ignore::IgnoreRules;
use crate::scanner::Scanner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;
use unitypack_common::hash::{md5_file, sha256_file};
use unitypack_common::{Error, PathContext, Result};

pub const DEFAULT_BUCKET: &str = "github-vs";
pub const DEFAULT_PREFIX: &str = "unity";
pub const DEFAULT_ACL: &str = "public-read";
pub const CACHE_CONTROL: &str = "no-cache";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// What is being published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadKind {
    /// The `latest.json` release feed.
    Feed,
    /// Bundled git and git-lfs distributions.
    Git,
    /// Unity packages and their checksums.
    Package,
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::Feed => write!(f, "feed"),
            UploadKind::Git => write!(f, "git"),
            UploadKind::Package => write!(f, "package"),
        }
    }
}

impl FromStr for UploadKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "feed" => Ok(UploadKind::Feed),
            "git" => Ok(UploadKind::Git),
            "package" => Ok(UploadKind::Package),
            _ => Err(Error::Config(format!("unknown upload kind: {}", s))),
        }
    }
}

impl UploadKind {
    /// File names (or name suffixes) published for this kind.
    pub fn selectors(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Feed => &["latest.json"],
            UploadKind::Git => &["git-lfs.zip", "git-lfs.json", "git.zip", "git.json", "gitconfig"],
            UploadKind::Package => &[".unitypackage", ".unitypackage.md5"],
        }
    }

    /// Key prefix under the root prefix.
    pub fn key_prefix(&self, root: &str) -> String {
        let root = root.trim_matches('/');
        match self {
            UploadKind::Feed => root.to_string(),
            UploadKind::Git => format!("{}/git", root),
            UploadKind::Package => format!("{}/releases", root),
        }
    }

    /// Whether a root-relative file path is published for this kind.
    pub fn selects(&self, relative: &str) -> bool {
        let basename = relative.rsplit('/').next().unwrap_or(relative);
        self.selectors()
            .iter()
            .any(|item| basename == *item || relative.ends_with(item))
    }
}

/// Content type for an object key: by extension first, then by file name.
pub fn content_type(key: &str) -> &'static str {
    let basename = key.rsplit('/').next().unwrap_or(key);
    let extension = basename.rfind('.').filter(|&i| i > 0).map(|i| &basename[i..]);

    match extension {
        Some(".txt") | Some(".md5") => "text/plain",
        Some(".json") => "application/json",
        _ if basename == "gitconfig" => "text/plain",
        _ => OCTET_STREAM,
    }
}

/// `inline` for anything a browser can show, `attachment` otherwise.
pub fn content_disposition(content_type: &str) -> &'static str {
    if content_type == OCTET_STREAM {
        "attachment"
    } else {
        "inline"
    }
}

/// Publish configuration.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub kind: UploadKind,
    /// Directory holding the artefacts.
    pub source: PathBuf,
    pub bucket: String,
    pub prefix: String,
    pub acl: String,
}

impl PublishConfig {
    pub fn new(kind: UploadKind, source: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            source: source.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            acl: DEFAULT_ACL.to_string(),
        }
    }
}

/// One object to upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadItem {
    pub local_path: PathBuf,
    pub key: String,
    pub content_type: String,
    pub content_disposition: String,
    pub cache_control: String,
    pub size_bytes: u64,
    pub md5: String,
    pub sha256: String,
}

/// Everything an uploader needs for one publish run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPlan {
    pub kind: UploadKind,
    pub bucket: String,
    pub acl: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<UploadItem>,
}

/// Select the artefacts under `config.source` and describe their uploads.
pub fn plan_publish(config: &PublishConfig) -> Result<PublishPlan> {
    if !config.source.is_dir() {
        return Err(Error::Config(format!(
            "source path {} is not a directory",
            config.source.display()
        )));
    }

    let prefix = config.kind.key_prefix(&config.prefix);
    let mut items = Vec::new();

    for entry in Scanner::new(&config.source, IgnoreRules::default()) {
        let entry = entry?;
        if entry.is_dir || !config.kind.selects(&entry.relative) {
            continue;
        }

        let key = format!("{}/{}", prefix, entry.relative);
        let content_type = content_type(&key);
        let size_bytes = std::fs::metadata(&entry.path)
            .with_path(&entry.path)?
            .len();

        info!(
            "Would upload {} from {} as {} {}",
            key,
            entry.path.display(),
            content_type,
            content_disposition(content_type)
        );

        items.push(UploadItem {
            md5: md5_file(&entry.path)?,
            sha256: sha256_file(&entry.path)?,
            local_path: entry.path,
            key,
            content_type: content_type.to_string(),
            content_disposition: content_disposition(content_type).to_string(),
            cache_control: CACHE_CONTROL.to_string(),
            size_bytes,
        });
    }

    Ok(PublishPlan {
        kind: config.kind,
        bucket: config.bucket.clone(),
        acl: config.acl.clone(),
        created_at: Utc::now(),
        items,
    })
}

/// Write the plan as pretty JSON.
pub fn write_plan(plan: &PublishPlan, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(plan).map_err(|e| Error::Other(e.to_string()))?;
    std::fs::write(path, json).with_path(path)
}
