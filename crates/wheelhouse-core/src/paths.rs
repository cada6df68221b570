//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for client-owned state.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client files (~/.wheelhouse)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.wheelhouse`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".wheelhouse"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.wheelhouse).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.wheelhouse/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the persisted session file path (~/.wheelhouse/session.json).
    ///
    /// This is the durable tier of the credential store; it only holds data
    /// for sessions created with "remember me".
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/wheelhouse-test"));
        assert_eq!(paths.base_dir(), &PathBuf::from("/tmp/wheelhouse-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/wheelhouse-test/config.json")
        );
        assert_eq!(
            paths.session_file(),
            PathBuf::from("/tmp/wheelhouse-test/session.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_base() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested").join("base"));
        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().is_dir());
    }
}
