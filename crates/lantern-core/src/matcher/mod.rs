//! Path classification under the classic and pod layout conventions.
//!
//! Both matchers are table-driven. A table is an ordered list of
//! [`LayoutRule`]s; the first rule whose conditions all hold decides the
//! symbol type. Order is significant: a path that could satisfy two entries
//! is reported as the earlier one.

pub mod classic;
pub mod pod;

use std::path::Path;

use crate::symbol::{FileKind, MatchResult, Scope, SymbolType};

pub use classic::ClassicMatcher;
pub use pod::PodMatcher;

/// A single substring condition against a `/`-joined relative path.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    /// The path must contain the substring.
    Has(&'static str),
    /// The path must not contain the substring.
    Not(&'static str),
}

impl Rule {
    fn holds(self, path: &str) -> bool {
        match self {
            Rule::Has(needle) => path.contains(needle),
            Rule::Not(needle) => !path.contains(needle),
        }
    }
}

/// One entry of a layout table.
#[derive(Debug, Clone, Copy)]
pub struct LayoutRule {
    pub symbol_type: SymbolType,
    /// Substring the symbol name is sliced against (a directory for classic,
    /// a file-name infix for pods). Always also listed in `rules`.
    pub anchor: &'static str,
    pub rules: &'static [Rule],
}

/// Classifies a project-relative path.
pub trait PathMatcher: Send + Sync {
    /// Classify a `/`-joined path relative to the project root. Returns
    /// `None` when the path is ignored or matches no rule.
    fn classify(&self, relative_path: &str) -> Option<MatchResult>;
}

/// Classic layout first, pod layout second.
#[derive(Debug, Clone, Default)]
pub struct LayoutMatcher {
    classic: ClassicMatcher,
    pod: PodMatcher,
}

impl LayoutMatcher {
    pub fn new(pod_prefix: Option<&str>) -> Self {
        Self {
            classic: ClassicMatcher,
            pod: PodMatcher::new(pod_prefix),
        }
    }

    pub fn pod_prefix(&self) -> Option<&str> {
        self.pod.prefix()
    }

    /// Classify an absolute path that lives under `root`.
    pub fn classify_under(&self, root: &Path, path: &Path) -> Option<MatchResult> {
        let relative = path.strip_prefix(root).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.classify(&joined)
    }
}

impl PathMatcher for LayoutMatcher {
    fn classify(&self, relative_path: &str) -> Option<MatchResult> {
        self.classic
            .classify(relative_path)
            .or_else(|| self.pod.classify(relative_path))
    }
}

/// Directory segments whose contents are build output or VCS internals.
const IGNORED_SEGMENTS: [&str; 3] = ["/.git/", "/dist/", "/tmp/"];

/// Substrings that put a file in addon scope.
const ADDON_MARKERS: [&str; 5] = ["/addon/", "/lib/", "/engines/", "/node_modules/", "/dummy"];

/// Normalize separators and anchor the path with a leading `/` so that
/// top-level directories satisfy `/dir/` rules.
pub(crate) fn anchored(relative_path: &str) -> String {
    let unified = relative_path.replace('\\', "/");
    let trimmed = unified.trim_start_matches("./");
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

pub(crate) fn is_ignored(path: &str) -> bool {
    path.contains("__") || IGNORED_SEGMENTS.iter().any(|seg| path.contains(seg))
}

pub(crate) fn first_match(table: &[LayoutRule], path: &str) -> Option<LayoutRule> {
    table
        .iter()
        .find(|entry| entry.rules.iter().all(|rule| rule.holds(path)))
        .copied()
}

pub(crate) fn scope_of(path: &str) -> Scope {
    if ADDON_MARKERS.iter().any(|marker| path.contains(marker)) {
        Scope::Addon
    } else {
        Scope::Application
    }
}

/// Split the last segment into `(stem, extension)`.
pub(crate) fn split_extension(path: &str) -> Option<(&str, &str)> {
    let file_start = path.rfind('/').map_or(0, |i| i + 1);
    let dot = path[file_start..].rfind('.')?;
    if dot == 0 {
        return None;
    }
    let dot = file_start + dot;
    Some((&path[..dot], &path[dot + 1..]))
}

pub(crate) fn file_kind(path: &str, stem: &str, extension: &str) -> Option<FileKind> {
    let by_extension = match extension {
        "hbs" => FileKind::Template,
        "js" | "ts" | "gjs" | "gts" | "mjs" | "cjs" => FileKind::Script,
        "css" | "scss" | "sass" | "less" => FileKind::Style,
        _ => return None,
    };
    if path.contains("/tests/") || stem.ends_with("-test") {
        Some(FileKind::Test)
    } else {
        Some(by_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchored() {
        assert_eq!(anchored("app/components/x.js"), "/app/components/x.js");
        assert_eq!(anchored("./app/x.js"), "/app/x.js");
        assert_eq!(anchored("app\\helpers\\y.js"), "/app/helpers/y.js");
    }

    #[test]
    fn test_ignored_paths() {
        assert!(is_ignored("/dist/components/foo.js"));
        assert!(is_ignored("/tmp/x/components/foo.js"));
        assert!(is_ignored("/.git/components/foo.js"));
        assert!(is_ignored("/app/components/foo__bar.js"));
        assert!(!is_ignored("/app/components/distance.js"));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("/a/b/foo.js"), Some(("/a/b/foo", "js")));
        assert_eq!(split_extension("/a/b.c/foo"), None);
        assert_eq!(split_extension("/a/.eslintrc"), None);
        assert_eq!(
            split_extension("/a/foo.module.css"),
            Some(("/a/foo.module", "css"))
        );
    }

    #[test]
    fn test_layout_prefers_classic() {
        let matcher = LayoutMatcher::new(Some("app/pods"));
        let classic = matcher.classify("app/components/foo/component.js").unwrap();
        assert_eq!(classic.symbol_type, SymbolType::Component);
        assert_eq!(classic.name, "foo");

        let pod = matcher.classify("app/pods/foo-bar/service.js").unwrap();
        assert_eq!(pod.symbol_type, SymbolType::Service);
        assert_eq!(pod.name, "foo-bar");
    }

    #[test]
    fn test_classify_under_root() {
        let matcher = LayoutMatcher::default();
        let result = matcher
            .classify_under(
                Path::new("/work/app"),
                Path::new("/work/app/app/helpers/format-date.js"),
            )
            .unwrap();
        assert_eq!(result.symbol_type, SymbolType::Helper);
        assert_eq!(result.name, "format-date");
        assert!(
            matcher
                .classify_under(Path::new("/work/app"), Path::new("/elsewhere/x.js"))
                .is_none()
        );
    }
}
