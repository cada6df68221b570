//! Storage trait definitions.

use crate::StorageResult;

/// Trait for key-value storage backends.
///
/// Writes must be visible to the very next read, including reads issued by
/// other concurrently-scheduled tasks. Implementations are synchronous.
pub trait KeyValueStore: Send + Sync {
    /// Store a value
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Retrieve a value
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value
    fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Check if a key exists
    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
