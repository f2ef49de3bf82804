//! Unitypack - Build-time packaging of Unity asset trees and release artefacts.
//!
//! The Unity package pipeline runs in four stages:
//! [`scanner`] walks the source tree, [`meta`] pairs entries with their
//! guid, [`rewriter`] stages a guid-keyed layout in a scratch directory and
//! [`archive`] turns that layout into a tarball with an MD5 sidecar.

pub mod archive;
pub mod dirzip;
pub mod ignore;
pub mod meta;
pub mod publish;
pub mod rewriter;
pub mod scanner;
pub mod unitypackage;

pub use archive::{ArchiveManifest, ArchiveOutput};
pub use dirzip::{build_directory_zip, ZipConfig, ZipReport};
pub use ignore::IgnoreRules;
pub use meta::{AssetMetadata, ResolvedAsset, Resolver};
pub use publish::{plan_publish, PublishConfig, PublishPlan, UploadKind};
pub use rewriter::{RepackagedUnit, Rewriter};
pub use scanner::{Scanner, TreeEntry};
pub use unitypackage::{build_unity_package, PackageConfig, PackageReport};
