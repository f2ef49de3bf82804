//! Gitignore-style ignore rules for tree scanning.
//!
//! Rule syntax:
//! - `!rule` force-includes whatever `rule` matches;
//! - `rule/` only applies to directories;
//! - a rule with a `/` anywhere but the end is anchored to the scan root,
//!   otherwise it matches at any depth;
//! - `*` never crosses a path separator.
//!
//! When several rules match a path, the last one wins.

use globset::{GlobBuilder, GlobMatcher};
use unitypack_common::{Error, Result};

/// Rules used when building a Unity package: keep only the `Assets/`
/// subtree and drop sidecar metadata and debug symbols.
pub const UNITY_PACKAGE_IGNORES: &[&str] = &["/*", "/*/", "!/Assets/", "*.meta", "*.pdb"];

/// A single compiled ignore rule.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    negated: bool,
    dir_only: bool,
    matcher: GlobMatcher,
}

impl IgnoreRule {
    /// Compile a rule.
    pub fn parse(rule: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidIgnoreRule {
            rule: rule.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = rule.trim();
        let (negated, body) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (dir_only, body) = match body.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };

        let anchored = body.contains('/');
        let body = body.trim_start_matches('/');
        if body.is_empty() {
            return Err(invalid("rule matches nothing"));
        }

        let glob = if anchored {
            body.to_string()
        } else {
            format!("**/{}", body)
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid(&e.to_string()))?
            .compile_matcher();

        Ok(Self {
            negated,
            dir_only,
            matcher,
        })
    }

    /// Whether the rule applies to `relative` (slash separated, root-relative).
    pub fn matches(&self, relative: &str, is_dir: bool) -> bool {
        if self.dir_only && !is_dir {
            return false;
        }
        self.matcher.is_match(relative)
    }

    /// True for `!` rules.
    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

/// An ordered list of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    /// Compile every rule, keeping their order.
    pub fn parse<S: AsRef<str>>(rules: &[S]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|r| IgnoreRule::parse(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Default rules for Unity packages.
    pub fn unity_package() -> Result<Self> {
        Self::parse(UNITY_PACKAGE_IGNORES)
    }

    /// Returns true when the last matching rule excludes the path.
    pub fn is_ignored(&self, relative: &str, is_dir: bool) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(relative, is_dir))
            .map(|rule| !rule.is_negated())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_rules_keep_only_assets() {
        let rules = IgnoreRules::unity_package().unwrap();
        assert_eq!(rules.len(), 5);

        assert!(!rules.is_ignored("Assets", true));
        assert!(rules.is_ignored("ProjectSettings", true));
        assert!(rules.is_ignored("preview.png", false));
        assert!(rules.is_ignored("README.md", false));
        assert!(!rules.is_ignored("Assets/Foo.cs", false));
        assert!(!rules.is_ignored("Assets/Sub", true));
        assert!(!rules.is_ignored("Assets/Sub/Deep/Bar.png", false));
    }

    #[test]
    fn test_suffix_rules_match_at_any_depth() {
        let rules = IgnoreRules::unity_package().unwrap();
        assert!(rules.is_ignored("Assets/Foo.cs.meta", false));
        assert!(rules.is_ignored("Assets/Sub/Lib.pdb", false));
        assert!(!rules.is_ignored("Assets/Sub/Lib.dll", false));
    }

    #[test]
    fn test_anchored_star_does_not_cross_separator() {
        let rules = IgnoreRules::parse(&["/*"]).unwrap();
        assert!(rules.is_ignored("top.txt", false));
        assert!(!rules.is_ignored("dir/nested.txt", false));
    }

    #[test]
    fn test_directory_only_rule_skips_files() {
        let rules = IgnoreRules::parse(&["build/"]).unwrap();
        assert!(rules.is_ignored("build", true));
        assert!(rules.is_ignored("src/build", true));
        assert!(!rules.is_ignored("build", false));
    }

    #[test]
    fn test_last_matching_rule_wins() {
        let include_then_exclude = IgnoreRules::parse(&["!*.png", "*.png"]).unwrap();
        assert!(include_then_exclude.is_ignored("a/icon.png", false));

        let exclude_then_include = IgnoreRules::parse(&["*.png", "!icon.png"]).unwrap();
        assert!(!exclude_then_include.is_ignored("a/icon.png", false));
        assert!(exclude_then_include.is_ignored("a/other.png", false));
    }

    #[test]
    fn test_every_default_rule_compiles() {
        let rules = IgnoreRules::unity_package().unwrap();
        assert_eq!(rules.len(), UNITY_PACKAGE_IGNORES.len());
        assert!(!rules.is_empty());
    }

    #[test]
    fn test_no_rules_ignore_nothing() {
        let rules = IgnoreRules::default();
        assert!(rules.is_empty());
        assert!(!rules.is_ignored("anything", false));
    }

    #[test]
    fn test_invalid_rules_are_rejected() {
        assert!(matches!(
            IgnoreRule::parse("!/"),
            Err(Error::InvalidIgnoreRule { .. })
        ));
        assert!(matches!(
            IgnoreRule::parse("Assets/[z-a]"),
            Err(Error::InvalidIgnoreRule { .. })
        ));
    }
}
