//! File system paths for the console.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;
use url::Url;

/// Directory name under the user's home directory.
const BASE_DIR_NAME: &str = ".abet";
/// JSONL log file written by the logging layer.
const LOG_FILE_NAME: &str = "console.jsonl";

/// Manages file system paths for the console.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for all console files (~/.abet)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.abet`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(BASE_DIR_NAME),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.abet).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.abet/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the logs directory (~/.abet/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.abet/logs/console.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE_NAME)
    }

    /// Get the directory holding per-origin storage areas (~/.abet/storage).
    pub fn storage_dir(&self) -> PathBuf {
        self.base_dir.join("storage")
    }

    /// Get the storage file for the origin of `api_url`.
    ///
    /// Each server origin gets its own storage area, so sessions for
    /// different servers never overwrite each other.
    pub fn storage_file(&self, api_url: &Url) -> PathBuf {
        let origin = api_url.origin().ascii_serialization();
        let name: String = origin
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.storage_dir().join(format!("{}.json", name))
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.storage_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_paths_with_base_dir() {
        let base = PathBuf::from("/tmp/test-abet");
        let paths = Paths::with_base_dir(base.clone());

        assert_eq!(paths.base_dir(), &base);
        assert_eq!(paths.config_file(), base.join("config.json"));
        assert_eq!(paths.logs_dir(), base.join("logs"));
        assert_eq!(paths.log_file(), base.join("logs/console.jsonl"));
        assert_eq!(paths.storage_dir(), base.join("storage"));
    }

    #[test]
    fn test_paths_default() {
        let paths = Paths::new().unwrap();
        let home = dirs::home_dir().unwrap();

        assert_eq!(paths.base_dir(), &home.join(".abet"));
    }

    #[test]
    fn test_storage_file_is_per_origin() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/abet"));

        let local = paths.storage_file(&Url::parse("http://localhost:8080/api").unwrap());
        let same_origin = paths.storage_file(&Url::parse("http://localhost:8080/other").unwrap());
        let remote = paths.storage_file(&Url::parse("https://abet.example.edu").unwrap());

        assert_eq!(local, same_origin);
        assert_ne!(local, remote);
        assert_eq!(
            local,
            PathBuf::from("/tmp/abet/storage/http___localhost_8080.json")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_directories() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("abet");
        let paths = Paths::with_base_dir(base.clone());

        assert!(!base.exists());

        paths.ensure_dirs().unwrap();

        assert!(base.is_dir());
        assert!(paths.logs_dir().is_dir());
        assert!(paths.storage_dir().is_dir());
    }

    #[test]
    fn test_ensure_dirs_idempotent() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.logs_dir().exists());
    }
}
