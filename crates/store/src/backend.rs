// crates/store/src/backend.rs
//! Key-value backends for the durable job store.
//!
//! The contract matches a per-origin durable map: `get`, `set`,
//! `remove`, enumerable keys. No transactions.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error accessing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt store document at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Durable string-to-string map.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError>;
    fn set(&self, key: &str, value: &str) -> Result<(), BackendError>;
    fn remove(&self, key: &str) -> Result<(), BackendError>;
    fn keys(&self) -> Result<Vec<String>, BackendError>;
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.map.read().ok().and_then(|m| m.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        if let Ok(mut m) = self.map.write() {
            m.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        if let Ok(mut m) = self.map.write() {
            m.remove(key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .map
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}

/// File-backed backend: one JSON document holding the whole map.
///
/// Writes go to a temp file in the same directory followed by a rename,
/// so a crash mid-write leaves the previous document intact. Concurrent
/// writers are last-write-wins.
pub struct FileBackend {
    path: PathBuf,
    // Cached document; reloaded lazily, flushed on every set/remove.
    map: RwLock<HashMap<String, String>>,
}

impl FileBackend {
    /// Open (or create) the document at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let map = Self::load(&path)?;
        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    /// Default per-user location under the platform data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("respond")
            .join("jobs.json")
    }

    fn load(path: &Path) -> Result<HashMap<String, String>, BackendError> {
        match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Ok(HashMap::new()),
            Ok(text) => serde_json::from_str(&text).map_err(|e| BackendError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(BackendError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    fn persist(&self, map: &HashMap<String, String>) -> Result<(), BackendError> {
        let io_err = |source| BackendError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(map).map_err(|e| BackendError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&body).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.map.read().ok().and_then(|m| m.get(key).cloned()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let snapshot = {
            let mut m = self
                .map
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            m.insert(key.to_string(), value.to_string());
            m.clone()
        };
        self.persist(&snapshot)
    }

    fn remove(&self, key: &str) -> Result<(), BackendError> {
        let snapshot = {
            let mut m = self
                .map
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            m.remove(key);
            m.clone()
        };
        self.persist(&snapshot)
    }

    fn keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self
            .map
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_backend_basics() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("a").unwrap(), None);

        backend.set("a", "1").unwrap();
        backend.set("b", "2").unwrap();
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));

        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);

        backend.remove("a").unwrap();
        assert_eq!(backend.get("a").unwrap(), None);
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.set("job-1", r#"{"x":1}"#).unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.get("job-1").unwrap().as_deref(), Some(r#"{"x":1}"#));
    }

    #[test]
    fn file_backend_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("nope.json")).unwrap();
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn file_backend_corrupt_document_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        fs::write(&path, "{{ nope").unwrap();
        assert!(matches!(
            FileBackend::open(&path),
            Err(BackendError::Corrupt { .. })
        ));
    }

    #[test]
    fn file_backend_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.json");
        let a = FileBackend::open(&path).unwrap();
        let b = FileBackend::open(&path).unwrap();

        a.set("k", "from-a").unwrap();
        b.set("k", "from-b").unwrap();

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("from-b"));
    }
}
