use super::backend::KeyValueStore;
use crate::error::PersistenceError;
use crate::verification::HistoryEntry;

pub const HISTORY_KEY: &str = "verificationHistory";

/// Most-recent-first log of past verifications.
///
/// The whole sequence is rewritten to the backend after every mutation.
/// Storage failures are logged and swallowed: losing history never
/// interrupts a verification.
pub struct HistoryStore {
    backend: Box<dyn KeyValueStore>,
    entries: Vec<HistoryEntry>,
    last_error: Option<PersistenceError>,
}

impl HistoryStore {
    /// Reads previously persisted entries. Absent, unreadable or
    /// undecodable state yields an empty store.
    pub fn load(backend: impl KeyValueStore + 'static) -> Self {
        let mut store = Self {
            backend: Box::new(backend),
            entries: Vec::new(),
            last_error: None,
        };
        match store.read_entries() {
            Ok(entries) => store.entries = entries,
            Err(err) => {
                tracing::warn!(error = %err, "failed to load verification history; starting empty");
                store.last_error = Some(err);
            }
        }
        store
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    /// Writes the full sequence. Returns whether the write landed.
    pub fn persist(&mut self) -> bool {
        let result = serde_json::to_string(&self.entries)
            .map_err(|err| PersistenceError::Write(err.to_string()))
            .and_then(|payload| self.backend.set(HISTORY_KEY, &payload));
        match result {
            Ok(()) => {
                self.last_error = None;
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, entries = self.entries.len(), "failed to persist verification history");
                self.last_error = Some(err);
                false
            }
        }
    }

    pub fn last_error(&self) -> Option<&PersistenceError> {
        self.last_error.as_ref()
    }

    fn read_entries(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        let Some(raw) = self.backend.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|err| PersistenceError::Decode(err.to_string()))
    }
}
