//! Path resolution for studysync configuration and data files.
//!
//! All data is stored in `~/.studysync/` unless `STUDYSYNC_HOME` points
//! elsewhere:
//! - `config.yaml` - Host configuration (remote endpoint, breaker, logging)
//! - `studysync.db` - `SQLite` database holding the queue blobs

use std::path::PathBuf;

use crate::error::SyncError;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "STUDYSYNC_HOME";

/// Paths to studysync configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.studysync/`
    pub root: PathBuf,
    /// Config file: `~/.studysync/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.studysync/studysync.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `STUDYSYNC_HOME` or the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if neither location can be determined.
    pub fn new() -> Result<Self, SyncError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            return Ok(Self::with_root(PathBuf::from(root)));
        }

        let home = std::env::var("HOME").map_err(|_| {
            SyncError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".studysync")))
    }

    /// Create paths with a custom root directory.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("studysync.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), SyncError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                SyncError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-studysync");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("studysync.db"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested").join("root"));

        paths.ensure_dirs().unwrap();
        assert!(paths.root.exists());
    }
}
