//! File-backed key-value backend (the durable tier).

use crate::{KeyValueStore, StorageError, StorageResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSON-file-backed storage. Every write is flushed to disk before the call
/// returns, so a restart sees exactly what the last write left behind.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a file store at the given path, loading any existing contents.
    ///
    /// A missing file is an empty store. An unreadable or malformed file is
    /// also treated as empty rather than an error; the session it held is
    /// simply gone, which fails safe to an unauthenticated state.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = Self::load(&path);
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    fn load(path: &Path) -> HashMap<String, String> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read session file, starting empty");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Session file is malformed, starting empty");
                HashMap::new()
            }
        }
    }

    fn persist(&self, data: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json =
            serde_json::to_string_pretty(data).map_err(|e| StorageError::Encoding(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut data = self.data.lock().unwrap();
        data.insert(key.to_string(), value.to_string());
        self.persist(&data)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().unwrap();
        Ok(data.get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        let mut data = self.data.lock().unwrap();
        let removed = data.remove(key).is_some();
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }
}
