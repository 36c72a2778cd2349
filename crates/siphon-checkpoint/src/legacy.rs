//! Legacy generic state store
//!
//! Before the per-input binary store pair existed, all checkpoint state
//! lived in one generic key/value document per collector: a single JSON file
//! mapping string keys to records. The migrator reads and rewrites that
//! format; steady-state code never touches it.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File-backed generic key/value store in the legacy on-disk format.
///
/// Every mutation rewrites the whole document, matching the legacy store's
/// update semantics.
#[derive(Debug)]
pub struct LegacyStateStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl LegacyStateStore {
    /// Open the legacy store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.is_file() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    /// Path of the underlying document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up `key`, decoding the stored record. Absent keys are `Ok(None)`.
    pub fn get_state<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Upsert `key` and persist the document.
    pub fn update_state<T: Serialize>(&mut self, key: &str, value: &T) -> Result<()> {
        self.entries
            .insert(key.to_string(), serde_json::to_value(value)?);
        self.persist()
    }

    /// Remove `key` and persist the document. Removing an absent key is not
    /// an error.
    pub fn delete_state(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = LegacyStateStore::open(dir.path().join("state.json")).unwrap();
        let value: Option<Value> = store.get_state("anything").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_update_get_delete_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut store = LegacyStateStore::open(&path).unwrap();
        store.update_state("job1.ckpt", &json!({"keys": {}})).unwrap();

        // Persisted across reopen.
        let store = LegacyStateStore::open(&path).unwrap();
        let value: Option<Value> = store.get_state("job1.ckpt").unwrap();
        assert_eq!(value, Some(json!({"keys": {}})));

        let mut store = LegacyStateStore::open(&path).unwrap();
        store.delete_state("job1.ckpt").unwrap();
        store.delete_state("job1.ckpt").unwrap(); // absent key is a no-op

        let store = LegacyStateStore::open(&path).unwrap();
        let value: Option<Value> = store.get_state("job1.ckpt").unwrap();
        assert!(value.is_none());
    }
}
