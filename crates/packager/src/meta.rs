//! Sidecar `.meta` lookup and guid extraction.

use crate::scanner::TreeEntry;
use serde_yaml::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use unitypack_common::{Error, Result};

/// Suffix appended to an asset path to find its metadata.
pub const META_SUFFIX: &str = ".meta";

/// Parsed contents of a `.meta` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    /// Opaque identifier, not validated beyond being non-empty.
    pub guid: String,
    /// Where the metadata was read from.
    pub path: PathBuf,
    /// The file as read, copied verbatim into the package.
    pub raw: String,
}

/// A scanned entry paired with its metadata.
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub entry: TreeEntry,
    pub meta: AssetMetadata,
}

/// `Foo.cs` -> `Foo.cs.meta`, in the same directory.
pub fn meta_path(asset: &Path) -> PathBuf {
    let mut name = asset.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

/// Extract the guid from metadata text.
pub fn parse_metadata(path: &Path, raw: &str) -> Result<AssetMetadata> {
    let malformed = |reason: String| Error::MalformedMetadata {
        path: path.to_path_buf(),
        reason,
    };

    let doc: Value = serde_yaml::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let value = doc
        .get("guid")
        .ok_or_else(|| malformed("missing guid field".to_string()))?;

    let guid = match value {
        Value::String(s) => s.trim().to_string(),
        // YAML would turn `guid: 0123` into a number; keep the text as written.
        Value::Number(n) => raw_scalar(raw, "guid").unwrap_or_else(|| n.to_string()),
        Value::Bool(b) => raw_scalar(raw, "guid").unwrap_or_else(|| b.to_string()),
        Value::Null => String::new(),
        _ => return Err(malformed("guid is not a scalar".to_string())),
    };

    if guid.is_empty() {
        return Err(malformed("guid is empty".to_string()));
    }
    if !is_single_component(&guid) {
        return Err(malformed(format!(
            "guid '{}' cannot be used as a directory name",
            guid
        )));
    }

    Ok(AssetMetadata {
        guid,
        path: path.to_path_buf(),
        raw: raw.to_string(),
    })
}

/// The guid names a directory in the scratch tree, so it must stay inside it.
fn is_single_component(guid: &str) -> bool {
    if guid.contains(['/', '\\']) {
        return false;
    }
    let mut components = Path::new(guid).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == guid
    )
}

/// Text of a top-level `key: value` line, without quotes or comments.
fn raw_scalar(raw: &str, key: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        let value = rest.split(" #").next().unwrap_or(rest).trim();
        let value = value.trim_matches(|c| c == '"' || c == '\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Load the metadata for an entry.
///
/// Returns `Ok(None)` when there is no sidecar file: such entries are not
/// part of the package.
pub fn load_metadata(entry: &TreeEntry) -> Result<Option<AssetMetadata>> {
    let path = meta_path(&entry.path);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No metadata for {}, skipping", entry.relative);
            return Ok(None);
        }
        Err(e) => return Err(Error::fs(path, e)),
    };
    parse_metadata(&path, &raw).map(Some)
}

/// Resolves entries to metadata and rejects guid collisions.
///
/// Two assets sharing a guid would land in the same package directory and
/// the later one would silently replace the earlier, so the run fails
/// instead.
#[derive(Debug, Default)]
pub struct Resolver {
    seen: HashMap<String, PathBuf>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, entry: TreeEntry) -> Result<Option<ResolvedAsset>> {
        let Some(meta) = load_metadata(&entry)? else {
            return Ok(None);
        };

        if let Some(first) = self.seen.get(&meta.guid) {
            return Err(Error::DuplicateGuid {
                guid: meta.guid,
                first: first.clone(),
                second: entry.path,
            });
        }
        self.seen.insert(meta.guid.clone(), entry.path.clone());

        Ok(Some(ResolvedAsset { entry, meta }))
    }

    /// Number of assets resolved so far.
    pub fn resolved(&self) -> usize {
        self.seen.len()
    }
}
