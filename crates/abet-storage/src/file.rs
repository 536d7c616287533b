//! File-backed store.
//!
//! One JSON object per storage area. Every mutation writes the whole object
//! to a fresh sibling temp file, syncs it, and renames it over the original,
//! so readers see either the old or the new contents, never a torn write.
//! On unix the file is created owner-only (0600).

use crate::{PersistentStore, StorageError, StorageResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Owner read/write only; the file holds a bearer token.
#[cfg(unix)]
const STORE_FILE_MODE: u32 = 0o600;

/// Durable store persisted as a JSON object file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        let data = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!("{}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), entries = data.len(), "Opened file store");

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to a copy of the contents, persist it, then commit it
    /// in memory. On a write failure the in-memory view is unchanged.
    fn update<R>(&self, mutate: impl FnOnce(&mut BTreeMap<String, String>) -> R) -> StorageResult<R> {
        let mut data = self.data.lock();
        let mut next = data.clone();
        let result = mutate(&mut next);
        self.write(&next)?;
        *data = next;
        Ok(result)
    }

    fn write(&self, data: &BTreeMap<String, String>) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = dir.join(format!(".{}.tmp.{}", file_name, nanos));

        let result = (|| -> std::io::Result<()> {
            let mut options = OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(STORE_FILE_MODE);
            }

            let mut file = options.open(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;

            std::fs::rename(&tmp_path, &self.path)?;

            if let Ok(parent) = File::open(&dir) {
                let _ = parent.sync_all();
            }
            Ok(())
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl PersistentStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|data| {
            data.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        if !self.data.lock().contains_key(key) {
            return Ok(false);
        }
        self.update(|data| data.remove(key).is_some())
    }

    fn clear(&self) -> StorageResult<()> {
        self.update(|data| data.clear())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("origin.json")).unwrap();

        assert_eq!(store.get("anything").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage").join("origin.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("session", r#"{"token":"t"}"#).unwrap();
            store.set("other", "value").unwrap();
            assert!(store.remove("other").unwrap());
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("session").unwrap(),
            Some(r#"{"token":"t"}"#.to_string())
        );
        assert_eq!(reopened.get("other").unwrap(), None);
    }

    #[test]
    fn test_clear_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.clear().unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert!(!reopened.has("a").unwrap());
    }

    #[test]
    fn test_remove_missing_key_does_not_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");

        let store = FileStore::open(&path).unwrap();
        assert!(!store.remove("missing").unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");

        let store = FileStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["origin.json".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn test_store_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");

        let store = FileStore::open(&path).unwrap();
        store.set("session", r#"{"token":"secret"}"#).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_rewrite_tightens_existing_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileStore::open(&path).unwrap();
        store.set("session", r#"{"token":"secret"}"#).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_write_keeps_memory_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        // The target is a directory, so the final rename fails
        let path = dir.path().join("origin.json");
        let store = FileStore::open(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("blocker"), "x").unwrap();

        assert!(store.set("a", "1").is_err());
        assert_eq!(store.get("a").unwrap(), None);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["origin.json".to_string()]);
    }

    #[test]
    fn test_corrupt_file_is_encoding_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("origin.json");
        std::fs::write(&path, "{ definitely not json").unwrap();

        let result = FileStore::open(&path);
        assert!(matches!(result, Err(StorageError::Encoding(_))));
    }
}
