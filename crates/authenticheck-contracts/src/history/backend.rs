use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::error::PersistenceError;

/// Key-value persistence collaborator behind the history store.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Stores every key in one pretty-printed JSON object file. Writes re-read
/// the file and replace only the written key, so other keys survive. A file
/// that no longer decodes is replaced rather than blocking every write.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let Some(payload) = read_json_object(&self.path)? else {
            return Ok(None);
        };
        Ok(payload.get(key).and_then(Value::as_str).map(str::to_string))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut on_disk = match read_json_object(&self.path) {
            Ok(existing) => existing.unwrap_or_default(),
            Err(PersistenceError::Decode(reason)) => {
                tracing::warn!(path = %self.path.display(), %reason, "discarding undecodable store file");
                Map::new()
            }
            Err(err) => return Err(PersistenceError::Write(err.to_string())),
        };
        on_disk.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &on_disk)
    }
}

fn read_json_object(path: &Path) -> Result<Option<Map<String, Value>>, PersistenceError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(PersistenceError::Read(format!(
                "{}: {err}",
                path.display()
            )))
        }
    };
    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|err| PersistenceError::Decode(format!("{}: {err}", path.display())))?;
    match parsed {
        Value::Object(object) => Ok(Some(object)),
        _ => Err(PersistenceError::Decode(format!(
            "{}: expected a JSON object",
            path.display()
        ))),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> Result<(), PersistenceError> {
    let write_err = |err: std::io::Error| PersistenceError::Write(format!("{}: {err}", path.display()));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let body = serde_json::to_string_pretty(&Value::Object(payload.clone()))
        .map_err(|err| PersistenceError::Write(err.to_string()))?;
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    let staged = PathBuf::from(staged);
    std::fs::write(&staged, body).map_err(write_err)?;
    std::fs::rename(&staged, path).map_err(write_err)
}

/// In-memory store. Clones share the same map, so a test can keep a handle
/// and inspect what the history store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.lock().values.insert(key.to_string(), value.to_string());
        store
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(PersistenceError::Read("storage unavailable".to_string()));
        }
        Ok(inner.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(PersistenceError::Write("storage quota exceeded".to_string()));
        }
        inner.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
