//! Storage trait definitions.

use crate::StorageResult;

/// A durable string key/value area.
///
/// Implementations must make each individual call atomic: a reader never
/// observes a partially applied `set`, `remove` or `clear`.
pub trait PersistentStore: Send + Sync {
    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Returns whether the key existed.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Remove every value
    fn clear(&self) -> StorageResult<()>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
