//! Value table persistence.
//!
//! Loading never fails: a missing, unreadable or structurally corrupt table
//! is logged and replaced by an empty one, so the worst case is retraining
//! from scratch.

use crate::error::Result;
use crate::table::{TableDocument, ValueTable};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait TableStore {
    /// Returns the persisted table, or an empty table with `bins` bins.
    fn load(&self, bins: u8) -> ValueTable;
    fn save(&self, table: &ValueTable) -> Result<()>;
}

fn decode(raw: &str, bins: u8, origin: &str) -> ValueTable {
    let doc: TableDocument = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            warn_event!("value table at {} is corrupt; starting empty: {}", origin, e);
            return ValueTable::new(bins);
        }
    };
    match ValueTable::from_document(doc, bins) {
        Ok(table) => table,
        Err(e) => {
            warn_event!("value table at {} discarded; starting empty: {}", origin, e);
            ValueTable::new(bins)
        }
    }
}

/// JSON document on the local filesystem.
#[derive(Debug, Clone)]
pub struct JsonFileTableStore {
    path: PathBuf,
}

impl JsonFileTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TableStore for JsonFileTableStore {
    fn load(&self, bins: u8) -> ValueTable {
        if !self.path.exists() {
            info_event!("no value table at {:?}; starting empty", self.path);
            return ValueTable::new(bins);
        }
        match fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw, bins, &self.path.display().to_string()),
            Err(e) => {
                warn_event!(
                    "failed to read value table {:?}; starting empty: {}",
                    self.path,
                    e
                );
                ValueTable::new(bins)
            }
        }
    }

    /// Writes a sibling temp file and renames it over the target, so readers
    /// never observe a half-written table.
    fn save(&self, table: &ValueTable) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&table.to_document())?;
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Keeps the serialized document in memory. Goes through the same encoding
/// as the file store.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    raw: Mutex<Option<String>>,
}

impl MemoryTableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with an arbitrary document, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().ok().and_then(|g| (*g).clone())
    }
}

impl TableStore for MemoryTableStore {
    fn load(&self, bins: u8) -> ValueTable {
        match self.raw() {
            Some(raw) => decode(&raw, bins, "memory"),
            None => ValueTable::new(bins),
        }
    }

    fn save(&self, table: &ValueTable) -> Result<()> {
        let body = serde_json::to_string(&table.to_document())?;
        let mut guard = self
            .raw
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use moodtune_core::{enumerate_actions, ContentType, Mood, RecommendationState, TimeOfDay};

    fn state() -> RecommendationState {
        RecommendationState {
            trait_bins: [0, 1, 2, 3, 4],
            content_type: ContentType::Video,
            mood: Mood::Calm,
            time_of_day: TimeOfDay::Night,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("moodtune_store_{}_{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir.join("qtable.json")
    }

    #[test]
    fn file_store_roundtrip() {
        let path = temp_path("roundtrip");
        let store = JsonFileTableStore::new(&path);
        let mut table = ValueTable::new(5);
        table.set(state(), enumerate_actions()[4], 0.42);
        table.meta.epsilon = Some(0.25);
        table.meta.runs = 2;
        store.save(&table).unwrap();

        let loaded = store.load(5);
        assert_eq!(loaded, table);
        assert!(!path.with_extension("json.tmp").exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn missing_file_yields_empty_table() {
        let store = JsonFileTableStore::new(temp_path("missing"));
        let table = store.load(5);
        assert!(table.is_empty());
        assert_eq!(table.bins(), 5);
    }

    #[test]
    fn corrupt_file_fails_soft() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let table = JsonFileTableStore::new(&path).load(5);
        assert!(table.is_empty());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn memory_store_fails_soft_on_wrong_shape_and_bins() {
        assert!(MemoryTableStore::with_raw("[1,2,3]").load(5).is_empty());
        assert!(MemoryTableStore::with_raw(r#"{"bins": 3, "entries": {}}"#)
            .load(5)
            .is_empty());
        assert!(MemoryTableStore::new().load(5).is_empty());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTableStore::new();
        let mut table = ValueTable::new(5);
        table.set(state(), enumerate_actions()[26], -0.3);
        store.save(&table).unwrap();
        assert_eq!(store.load(5), table);
    }
}
