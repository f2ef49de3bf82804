//! Rewrites resolved assets into the guid-keyed package layout.
//!
//! Every asset becomes a directory named after its guid holding:
//! - `asset`: the file content (files only),
//! - `asset.meta`: the metadata, verbatim,
//! - `pathname`: the root-relative path with `/` separators,
//! - `preview.png`: for `.png` files, a copy of the scan root's
//!   `preview.png`. The thumbnail belongs to the package, not the asset.

use crate::meta::ResolvedAsset;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::debug;
use unitypack_common::{Error, PathContext, Result};

pub const ASSET_FILE: &str = "asset";
pub const META_FILE: &str = "asset.meta";
pub const PATHNAME_FILE: &str = "pathname";
pub const PREVIEW_FILE: &str = "preview.png";

/// One guid directory in the scratch tree, described by its sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackagedUnit {
    pub guid: String,
    pub target_dir: PathBuf,
    /// Original root-relative path.
    pub pathname: String,
    /// Content to copy into `asset`; `None` for directories.
    pub asset: Option<PathBuf>,
    pub meta: PathBuf,
    /// Preview to copy into `preview.png`.
    pub preview: Option<PathBuf>,
}

impl RepackagedUnit {
    /// Plan the unit for an asset found under `source_root`.
    pub fn plan(resolved: &ResolvedAsset, source_root: &Path, scratch: &Path) -> Self {
        let entry = &resolved.entry;
        let is_png = !entry.is_dir && entry.path.extension().is_some_and(|ext| ext == "png");

        Self {
            guid: resolved.meta.guid.clone(),
            target_dir: scratch.join(&resolved.meta.guid),
            pathname: entry.relative.clone(),
            asset: (!entry.is_dir).then(|| entry.path.clone()),
            meta: resolved.meta.path.clone(),
            preview: is_png.then(|| source_root.join(PREVIEW_FILE)),
        }
    }

    /// Materialize the unit on disk.
    pub async fn write(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.target_dir)
            .await
            .with_path(&self.target_dir)?;

        copy(&self.meta, &self.target_dir.join(META_FILE)).await?;

        let pathname = self.target_dir.join(PATHNAME_FILE);
        tokio::fs::write(&pathname, self.pathname.as_bytes())
            .await
            .with_path(&pathname)?;

        if let Some(asset) = &self.asset {
            copy(asset, &self.target_dir.join(ASSET_FILE)).await?;
        }
        if let Some(preview) = &self.preview {
            copy(preview, &self.target_dir.join(PREVIEW_FILE)).await?;
        }

        debug!("Wrote {} -> {}", self.pathname, self.guid);
        Ok(())
    }
}

async fn copy(from: &Path, to: &Path) -> Result<()> {
    tokio::fs::copy(from, to).await.with_path(from)?;
    Ok(())
}

/// Dispatches one write task per unit and waits for all of them.
///
/// Units never share a directory, so tasks run without coordination.
/// Nothing in the scratch tree should be read before [`Rewriter::finish`]
/// returns. Dropping the rewriter aborts outstanding tasks.
pub struct Rewriter {
    source_root: PathBuf,
    scratch: PathBuf,
    tasks: JoinSet<Result<RepackagedUnit>>,
}

impl Rewriter {
    pub fn new(source_root: impl Into<PathBuf>, scratch: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            scratch: scratch.into(),
            tasks: JoinSet::new(),
        }
    }

    /// Start writing an asset. Must be called inside a tokio runtime.
    pub fn dispatch(&mut self, resolved: &ResolvedAsset) {
        let unit = RepackagedUnit::plan(resolved, &self.source_root, &self.scratch);
        self.tasks.spawn(async move {
            unit.write().await?;
            Ok(unit)
        });
    }

    /// Wait for every dispatched write. The first failure aborts the rest.
    pub async fn finish(mut self) -> Result<Vec<RepackagedUnit>> {
        let mut units = Vec::with_capacity(self.tasks.len());
        while let Some(joined) = self.tasks.join_next().await {
            let unit = joined.map_err(|e| Error::Other(format!("rewrite task failed: {}", e)))??;
            units.push(unit);
        }
        units.sort_by(|a, b| a.guid.cmp(&b.guid));
        Ok(units)
    }
}
