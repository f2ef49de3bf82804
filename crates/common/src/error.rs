//! Common error types for unitypack.

use std::path::PathBuf;
use thiserror::Error;

/// Common error type for unitypack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error on {}: {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid ignore rule '{rule}': {reason}")]
    InvalidIgnoreRule { rule: String, reason: String },

    #[error("Malformed metadata in {}: {reason}", path.display())]
    MalformedMetadata { path: PathBuf, reason: String },

    #[error("Duplicate guid {guid}: {} and {}", first.display(), second.display())]
    DuplicateGuid {
        guid: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias using common Error.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an IO error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::FileSystem {
            path: path.into(),
            source,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

/// Attach a path to IO results.
pub trait PathContext<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> PathContext<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::fs(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_error_mentions_path() {
        let err: Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ))
        .with_path("/tmp/missing.meta");

        let message = err.unwrap_err().to_string();
        assert!(message.contains("/tmp/missing.meta"));
        assert!(message.contains("no such file"));
    }

    #[test]
    fn test_duplicate_guid_display() {
        let err = Error::DuplicateGuid {
            guid: "abc123".to_string(),
            first: PathBuf::from("Assets/A.cs"),
            second: PathBuf::from("Assets/B.cs"),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate guid abc123: Assets/A.cs and Assets/B.cs"
        );
    }
}
