//! Workspace roots and the virtual-path resolver.
//!
//! Every document is addressed by a virtual path with a leading `/`. Three
//! namespaces map onto the physical tree under the workspace root:
//!
//! - `/foo/bar.md`            -> `{root}/docs/foo/bar.md`
//! - `/coordinator/active.md` -> `{root}/coordinator/active.md`
//! - `/archived/...`          -> `{root}/archived/...`

use std::env;
use std::path::{Path, PathBuf};

use crate::error::TaskdocError;

/// Environment variable naming the workspace root directory.
pub const WORKSPACE_ENV_VAR: &str = "TASKDOC_ROOT";

/// Fixed virtual path of the sequential coordinator document.
pub const COORDINATOR_ACTIVE_PATH: &str = "/coordinator/active.md";

const DOCS_DIR: &str = "docs";
const COORDINATOR_DIR: &str = "coordinator";
const ARCHIVED_DIR: &str = "archived";

/// Canonical filesystem locations for a taskdoc workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the workspace root from `TASKDOC_ROOT`.
    ///
    /// Fails when the variable is unset or does not name a directory; callers
    /// are expected to treat this as a startup error.
    pub fn from_env() -> Result<Self, TaskdocError> {
        let raw = env::var(WORKSPACE_ENV_VAR).map_err(|_| {
            TaskdocError::Validation(format!(
                "workspace root is not configured; set {WORKSPACE_ENV_VAR}"
            ))
        })?;
        let root = PathBuf::from(raw);
        if !root.is_dir() {
            return Err(TaskdocError::Validation(format!(
                "{WORKSPACE_ENV_VAR} does not name a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn docs_root(&self) -> PathBuf {
        self.root.join(DOCS_DIR)
    }

    pub fn coordinator_root(&self) -> PathBuf {
        self.root.join(COORDINATOR_DIR)
    }

    pub fn archived_root(&self) -> PathBuf {
        self.root.join(ARCHIVED_DIR)
    }

    /// Maps a virtual path to its physical filesystem location.
    ///
    /// Pure with respect to the filesystem: the target need not exist. The
    /// leading `coordinator` segment selects the coordinator tree directly and
    /// is not duplicated; the `archived` prefix is preserved as-is; everything
    /// else lands under `docs/`.
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, TaskdocError> {
        let canonical = canonicalize_virtual(virtual_path);
        reject_traversal(&canonical)?;

        let relative = canonical.trim_start_matches('/');
        let mut segments = relative.split('/').filter(|seg| !seg.is_empty());

        let first = segments.next().ok_or_else(|| {
            TaskdocError::InvalidAddress(format!("empty path: {virtual_path:?}"))
        })?;

        let base = match first {
            COORDINATOR_DIR => self.coordinator_root(),
            ARCHIVED_DIR => self.archived_root(),
            _ => self.docs_root().join(first),
        };

        let mut physical = base;
        for segment in segments {
            physical.push(segment);
        }
        Ok(physical)
    }

    /// Inverts `resolve`: maps a physical path under one of the workspace
    /// roots back to its canonical virtual path. Returns `None` for paths
    /// outside the workspace.
    pub fn virtual_path(&self, physical: &Path) -> Option<String> {
        if let Ok(rel) = physical.strip_prefix(self.docs_root()) {
            return Some(format!("/{}", normalize_separators(rel)));
        }
        if let Ok(rel) = physical.strip_prefix(self.coordinator_root()) {
            return Some(format!("/{COORDINATOR_DIR}/{}", normalize_separators(rel)));
        }
        if let Ok(rel) = physical.strip_prefix(self.archived_root()) {
            return Some(format!("/{ARCHIVED_DIR}/{}", normalize_separators(rel)));
        }
        None
    }
}

/// Returns true when the virtual path lives in the coordinator namespace.
pub fn is_coordinator_path(virtual_path: &str) -> bool {
    first_segment(virtual_path) == Some(COORDINATOR_DIR)
}

/// Returns true when the virtual path lives in the archive namespace.
pub fn is_archived_path(virtual_path: &str) -> bool {
    first_segment(virtual_path) == Some(ARCHIVED_DIR)
}

/// Prepends the leading `/` when missing. Consecutive slashes are preserved
/// as authored; physical resolution skips the empty segments they produce.
pub fn canonicalize_virtual(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

fn first_segment(virtual_path: &str) -> Option<&str> {
    canonical_segments(virtual_path).next()
}

fn canonical_segments(virtual_path: &str) -> impl Iterator<Item = &str> {
    virtual_path
        .trim_start_matches('/')
        .split('/')
        .filter(|seg| !seg.is_empty())
}

fn reject_traversal(canonical: &str) -> Result<(), TaskdocError> {
    if canonical_segments(canonical).any(|seg| seg == "..") {
        return Err(TaskdocError::InvalidAddress(format!(
            "path escapes the workspace root: {canonical:?}"
        )));
    }
    Ok(())
}

fn normalize_separators(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docs_paths_resolve_under_docs_root() {
        let ws = WorkspacePaths::new("/ws");
        let physical = ws.resolve("/api/auth.md").unwrap();
        assert_eq!(physical, PathBuf::from("/ws/docs/api/auth.md"));
    }

    #[test]
    fn coordinator_segment_is_not_duplicated() {
        let ws = WorkspacePaths::new("/ws");
        let physical = ws.resolve("/coordinator/active.md").unwrap();
        assert_eq!(physical, PathBuf::from("/ws/coordinator/active.md"));
    }

    #[test]
    fn archived_prefix_is_preserved() {
        let ws = WorkspacePaths::new("/ws");
        let physical = ws.resolve("/archived/coordinator/x.md").unwrap();
        assert_eq!(physical, PathBuf::from("/ws/archived/coordinator/x.md"));
    }

    #[test]
    fn missing_leading_slash_is_tolerated() {
        let ws = WorkspacePaths::new("/ws");
        let physical = ws.resolve("api/auth.md").unwrap();
        assert_eq!(physical, PathBuf::from("/ws/docs/api/auth.md"));
    }

    #[test]
    fn consecutive_slashes_resolve_like_single() {
        let ws = WorkspacePaths::new("/ws");
        let physical = ws.resolve("/api//auth.md").unwrap();
        assert_eq!(physical, PathBuf::from("/ws/docs/api/auth.md"));
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let ws = WorkspacePaths::new("/ws");
        let err = ws.resolve("/api/../../etc/passwd.md").unwrap_err();
        assert!(matches!(err, TaskdocError::InvalidAddress(_)));
    }

    #[test]
    fn namespace_classifiers() {
        assert!(is_coordinator_path("/coordinator/active.md"));
        assert!(is_coordinator_path("coordinator/active.md"));
        assert!(is_archived_path("/archived/coordinator/x.md"));
        assert!(!is_coordinator_path("/api/auth.md"));
    }

    #[test]
    fn virtual_path_round_trips() {
        let ws = WorkspacePaths::new("/ws");
        for virt in ["/api/auth.md", "/coordinator/active.md", "/archived/api/x.md"] {
            let physical = ws.resolve(virt).unwrap();
            assert_eq!(ws.virtual_path(&physical).as_deref(), Some(virt));
        }
    }
}
