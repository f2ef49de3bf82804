//! Depth-first tree scanning.

use crate::ignore::IgnoreRules;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};
use unitypack_common::{PathContext, Result};

/// A file or directory found under the scan root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Root-relative path with `/` separators.
    pub relative: String,
    pub is_dir: bool,
}

/// Lazy pre-order walk over a directory tree.
///
/// Directories are yielded before their children and siblings are visited
/// in lexicographic order of their names, so two scans of the same tree
/// produce the same sequence. Entries excluded by the ignore rules are
/// skipped, and excluded directories are not descended into. The root
/// itself is not yielded. Symlinks are followed without cycle detection.
pub struct Scanner {
    rules: IgnoreRules,
    stack: Vec<TreeEntry>,
    expand: Option<(PathBuf, String)>,
    failed: bool,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, rules: IgnoreRules) -> Self {
        Self {
            rules,
            stack: Vec::new(),
            expand: Some((root.into(), String::new())),
            failed: false,
        }
    }

    fn push_children(&mut self, dir: &Path, relative: &str) -> Result<()> {
        let mut children = Vec::new();

        for item in std::fs::read_dir(dir).with_path(dir)? {
            let item = item.with_path(dir)?;
            let path = item.path();
            let name = entry_name(&path, &item.file_name());
            let is_dir = std::fs::metadata(&path).with_path(&path)?.is_dir();

            let child_relative = if relative.is_empty() {
                name
            } else {
                format!("{}/{}", relative, name)
            };

            if self.rules.is_ignored(&child_relative, is_dir) {
                trace!("Ignoring {}", child_relative);
                continue;
            }

            children.push(TreeEntry {
                path,
                relative: child_relative,
                is_dir,
            });
        }

        // Popped from the back, so the smallest name must end up last.
        children.sort_by(|a, b| b.relative.cmp(&a.relative));
        self.stack.extend(children);
        Ok(())
    }
}

/// File name as UTF-8. Invalid sequences become U+FFFD, so the recorded
/// path no longer names the file on disk.
fn entry_name(path: &Path, name: &OsStr) -> String {
    match name.to_str() {
        Some(name) => name.to_string(),
        None => {
            let lossy = name.to_string_lossy().into_owned();
            warn!(
                "File name of {} is not valid UTF-8, recording it as {}",
                path.display(),
                lossy
            );
            lossy
        }
    }
}

impl Iterator for Scanner {
    type Item = Result<TreeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some((dir, relative)) = self.expand.take() {
            if let Err(e) = self.push_children(&dir, &relative) {
                self.failed = true;
                return Some(Err(e));
            }
        }

        let entry = self.stack.pop()?;
        if entry.is_dir {
            self.expand = Some((entry.path.clone(), entry.relative.clone()));
        }
        Some(Ok(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;

    fn scan(root: &Path, rules: IgnoreRules) -> Vec<TreeEntry> {
        Scanner::new(root, rules).collect::<Result<Vec<_>>>().unwrap()
    }

    fn relatives(entries: &[TreeEntry]) -> Vec<String> {
        entries.iter().map(|e| e.relative.clone()).collect()
    }

    #[test]
    fn test_scan_is_preorder_and_sorted() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("b.txt").write_str("b").unwrap();
        temp.child("a/z.txt").write_str("z").unwrap();
        temp.child("a/m/inner.txt").write_str("i").unwrap();
        temp.child("a/b.txt").write_str("b").unwrap();

        let entries = scan(temp.path(), IgnoreRules::default());

        assert_eq!(
            relatives(&entries),
            vec!["a", "a/b.txt", "a/m", "a/m/inner.txt", "a/z.txt", "b.txt"]
        );
        assert!(entries[0].is_dir);
        assert!(!entries[1].is_dir);
        assert_eq!(entries[1].path, temp.path().join("a").join("b.txt"));
    }

    #[test]
    fn test_scan_applies_unity_rules() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("preview.png").write_str("png").unwrap();
        temp.child("ProjectSettings/settings.asset").write_str("x").unwrap();
        temp.child("Assets/Foo.cs").write_str("class Foo {}").unwrap();
        temp.child("Assets/Foo.cs.meta").write_str("guid: abc123").unwrap();
        temp.child("Assets/Lib.pdb").write_str("pdb").unwrap();

        let entries = scan(temp.path(), IgnoreRules::unity_package().unwrap());

        assert_eq!(relatives(&entries), vec!["Assets", "Assets/Foo.cs"]);
    }

    #[test]
    fn test_scan_includes_empty_directories() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child("empty").create_dir_all().unwrap();

        let entries = scan(temp.path(), IgnoreRules::default());

        assert_eq!(relatives(&entries), vec!["empty"]);
        assert!(entries[0].is_dir);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_names_are_replaced() {
        use std::os::unix::ffi::OsStrExt;

        let temp = assert_fs::TempDir::new().unwrap();
        let raw = OsStr::from_bytes(b"bad\xff.txt");
        std::fs::write(temp.path().join(raw), b"x").unwrap();

        let entries = scan(temp.path(), IgnoreRules::default());

        assert_eq!(relatives(&entries), vec!["bad\u{FFFD}.txt"]);
        assert_eq!(entries[0].path, temp.path().join(raw));
    }

    #[test]
    fn test_scan_missing_root_fails_once() {
        let temp = assert_fs::TempDir::new().unwrap();
        let mut scanner = Scanner::new(temp.path().join("missing"), IgnoreRules::default());

        assert!(scanner.next().unwrap().is_err());
        assert!(scanner.next().is_none());
    }
}
