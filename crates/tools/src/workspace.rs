//! Workspace confinement for the file tools.
//!
//! Every path the model passes is resolved against one root directory.
//! Parent-directory components are refused outright, and existing paths are
//! canonicalized so a symlink cannot lead outside the root.

use std::path::{Component, Path, PathBuf};

/// A directory that file tools may not leave.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Why a path was refused.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path traversal is not allowed: {0}")]
    Traversal(String),

    #[error("path is outside the workspace: {0}")]
    OutsideWorkspace(String),

    #[error("path is empty")]
    Empty,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` to a location inside the workspace.
    ///
    /// Relative paths are joined onto the root; absolute paths must already
    /// point inside it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathError> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }

        let input = Path::new(trimmed);
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(PathError::Traversal(path.to_string()));
        }

        let joined = if input.is_absolute() {
            if !input.starts_with(&self.root) {
                return Err(PathError::OutsideWorkspace(path.to_string()));
            }
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        // Symlinks inside the workspace may point anywhere; follow them.
        if joined.exists() {
            let canonical_root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
            let canonical = joined
                .canonicalize()
                .map_err(|_| PathError::OutsideWorkspace(path.to_string()))?;
            if !canonical.starts_with(&canonical_root) {
                return Err(PathError::OutsideWorkspace(path.to_string()));
            }
        }

        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_root() {
        let ws = Workspace::new("/srv/ws");
        assert_eq!(ws.resolve("notes/a.txt").unwrap(), PathBuf::from("/srv/ws/notes/a.txt"));
    }

    #[test]
    fn parent_components_rejected() {
        let ws = Workspace::new("/srv/ws");
        assert!(matches!(ws.resolve("../etc/passwd"), Err(PathError::Traversal(_))));
        assert!(matches!(ws.resolve("a/../../b"), Err(PathError::Traversal(_))));
    }

    #[test]
    fn absolute_outside_rejected() {
        let ws = Workspace::new("/srv/ws");
        assert!(matches!(ws.resolve("/etc/shadow"), Err(PathError::OutsideWorkspace(_))));
        assert!(ws.resolve("/srv/ws/ok.txt").is_ok());
    }

    #[test]
    fn empty_path_rejected() {
        let ws = Workspace::new("/srv/ws");
        assert!(matches!(ws.resolve("  "), Err(PathError::Empty)));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_rejected() {
        let outside = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let ws = Workspace::new(root.path());
        assert!(matches!(ws.resolve("link"), Err(PathError::OutsideWorkspace(_))));
    }
}
