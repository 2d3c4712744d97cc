// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

/// Directories that are never delivered to listeners: version control
/// metadata and dependency / build caches.
pub const SYSTEM_IGNORED_DIRS: &[&str] = &[".git", ".hg", ".svn", "node_modules", "target"];

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashed(rel));
    }

    // macOS reports /private/var/... for /var/..., among others.
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(slashed(rel));
        }
    }

    None
}

/// Like [`relative_str`] but never fails: unrelated paths are returned
/// whole. Used for pattern checks on paths the child reports, which may live
/// outside the project root.
pub fn relative_or_full(root: &Path, path: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        return slashed(rel);
    }
    slashed(path)
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Absolute form of `path`, interpreting relative paths against `base`.
pub fn resolve_under(base: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

/// Whether any component of `path` is in [`SYSTEM_IGNORED_DIRS`].
pub fn is_system_ignored(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .map(|s| SYSTEM_IGNORED_DIRS.contains(&s))
            .unwrap_or(false),
        _ => false,
    })
}

/// Number of dependency-boundary crossings in `path`, i.e. how many of its
/// components equal `boundary`.
pub fn dependency_depth(path: &Path, boundary: &str) -> usize {
    path.components()
        .filter(|c| matches!(c, Component::Normal(name) if name.to_str() == Some(boundary)))
        .count()
}

/// Nesting bound for dependencies reported by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepsPolicy {
    /// `-1` is unlimited.
    pub max_depth: i64,
    pub boundary: String,
}

impl Default for DepsPolicy {
    fn default() -> Self {
        Self {
            max_depth: 0,
            boundary: "node_modules".to_string(),
        }
    }
}

impl DepsPolicy {
    pub fn new(max_depth: i64, boundary: impl Into<String>) -> Self {
        Self {
            max_depth,
            boundary: boundary.into(),
        }
    }

    pub fn from_config(cfg: &crate::config::ConfigFile) -> Self {
        Self::new(cfg.watch.deps, cfg.watch.deps_dir.clone())
    }

    pub fn allows(&self, path: &Path) -> bool {
        if self.max_depth < 0 {
            return true;
        }
        dependency_depth(path, &self.boundary) as i64 <= self.max_depth
    }
}
