//! Per-request scratch workspace.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Scratch directory scoped to one processing request.
///
/// Every request gets its own directory, so concurrent requests never see
/// each other's intermediate files. The directory and its contents are
/// removed when the context drops, on success and failure alike.
#[derive(Debug)]
pub struct WorkspaceContext {
    dir: tempfile::TempDir,
}

impl WorkspaceContext {
    /// Creates a fresh scratch directory.
    pub fn new() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("meshpress_").tempdir()?;
        debug!(dir = %dir.path().display(), "workspace created");
        Ok(Self { dir })
    }

    /// Root of the scratch directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path for a scratch file with the given name.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_workspace_is_usable() {
        let ws = WorkspaceContext::new().unwrap();
        assert!(ws.path().is_dir());

        let file = ws.scratch_file("stage.obj");
        fs::write(&file, "v 0 0 0\n").unwrap();
        assert!(file.is_file());
        assert_eq!(file.parent().unwrap(), ws.path());
    }

    #[test]
    fn test_drop_removes_directory_and_contents() {
        let path;
        {
            let ws = WorkspaceContext::new().unwrap();
            path = ws.path().to_path_buf();
            fs::write(ws.scratch_file("leftover.obj"), "v 0 0 0\n").unwrap();
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_workspaces_are_isolated() {
        let a = WorkspaceContext::new().unwrap();
        let b = WorkspaceContext::new().unwrap();
        assert_ne!(a.path(), b.path());
    }
}
