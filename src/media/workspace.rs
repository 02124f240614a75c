use std::io;
use std::path::Path;

use tempfile::{Builder, TempDir};
use tracing::{debug, warn};

/// Scratch directory for a single request. Uniquely named under the
/// configured base, so concurrent requests never collide. Removed by
/// [`Workspace::dispose`], or on drop if the request bails out early.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn create(base: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(base)?;
        let dir = Builder::new().prefix("request-").tempdir_in(base)?;
        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Best-effort removal. Failures are logged, never propagated.
    pub fn dispose(self) {
        let path = self.dir.path().display().to_string();
        match self.dir.close() {
            Ok(()) => debug!("Removed workspace {}", path),
            Err(err) => warn!("Failed to remove workspace {}: {}", path, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispose_removes_everything() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path()).unwrap();
        let root = workspace.path().to_path_buf();

        std::fs::create_dir(root.join("attempt-0")).unwrap();
        std::fs::write(root.join("attempt-0").join("video.mp4"), b"data").unwrap();

        workspace.dispose();
        assert!(!root.exists());
    }

    #[test]
    fn test_workspaces_are_unique() {
        let base = tempfile::tempdir().unwrap();
        let first = Workspace::create(base.path()).unwrap();
        let second = Workspace::create(base.path()).unwrap();
        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_drop_cleans_up_on_early_exit() {
        let base = tempfile::tempdir().unwrap();
        let root = {
            let workspace = Workspace::create(base.path()).unwrap();
            workspace.path().to_path_buf()
        };
        assert!(!root.exists());
    }
}
