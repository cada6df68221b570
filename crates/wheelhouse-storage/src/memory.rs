//! In-memory key-value backend (the ephemeral tier).

use crate::{KeyValueStore, StorageResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory storage. Contents are lost when the process exits, which is
/// exactly the contract of the ephemeral durability tier.
///
/// Clones share the same underlying map, so a caller can keep a handle to
/// a tier after handing it to the credential store.
#[derive(Default, Clone)]
pub struct MemoryStore {
    data: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().unwrap();
        Ok(data.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_ops() {
        let store = MemoryStore::new();

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
        assert!(store.has("k").unwrap());
        assert!(!store.has("missing").unwrap());

        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_memory_store_overwrite() {
        let store = MemoryStore::new();
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap(), Some("v2".to_string()));
    }
}
