//! Checkpoint pool registry
//!
//! One [`CheckpointPool`] is constructed at process start and passed by
//! reference to every collector. It caches the open store-pair of each data
//! input so the same on-disk files are never opened twice within a process,
//! and it centralizes teardown.
//!
//! The cache itself is internally locked, but access to one input's pair is
//! not: callers must serialize use of a single data input themselves (one
//! worker per input). Separate processes are not coordinated at all; that is
//! a documented limitation of this layer.

use crate::error::{CheckpointError, Result};
use crate::store::{checkpoint_file, KvStore, StoreRole};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// The open store-pair of one data input.
#[derive(Debug)]
pub struct StorePair {
    name: String,
    /// Discovered-object index store (also holds the meta-record).
    pub index: KvStore,
    /// Per-object ingestion progress store.
    pub key: KvStore,
}

impl StorePair {
    fn open(name: &str, dir: &Path) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            index: KvStore::open(checkpoint_file(name, StoreRole::Index, dir))?,
            key: KvStore::open(checkpoint_file(name, StoreRole::Key, dir))?,
        })
    }

    /// Name of the data input this pair belongs to.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Process-wide registry of open checkpoint store-pairs, keyed by data-input
/// name.
#[derive(Debug, Default)]
pub struct CheckpointPool {
    pool: Mutex<HashMap<String, Arc<StorePair>>>,
}

impl CheckpointPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Arc<StorePair>>>> {
        self.pool.lock().map_err(|_| CheckpointError::LockPoisoned)
    }

    /// Get the store-pair for `name`, opening it under `dir` on first use.
    ///
    /// Repeated calls for the same name return the same pair until it is
    /// cleaned or closed.
    pub fn get(&self, name: &str, dir: &Path) -> Result<Arc<StorePair>> {
        let mut pool = self.lock()?;
        if let Some(pair) = pool.get(name) {
            return Ok(Arc::clone(pair));
        }

        info!(data_input = %name, "Opening checkpoint store-pair");
        let pair = Arc::new(StorePair::open(name, dir)?);
        pool.insert(name.to_string(), Arc::clone(&pair));
        Ok(pair)
    }

    /// Compact and close the pair for `name`, evicting it from the registry.
    /// No-op when the pair is not open.
    pub fn clean(&self, name: &str) -> Result<()> {
        let pair = self.lock()?.remove(name);
        if let Some(pair) = pair {
            info!(data_input = %name, "Closing checkpoint store-pair");
            pair.index.sweep()?;
            pair.key.sweep()?;
            pair.index.close()?;
            pair.key.close()?;
        }
        Ok(())
    }

    /// Close every open pair without compaction. Shutdown path.
    pub fn close_all(&self) -> Result<()> {
        let mut pool = self.lock()?;
        for pair in pool.values() {
            pair.index.close()?;
            pair.key.close()?;
        }
        pool.clear();
        Ok(())
    }

    /// Compact every open pair without closing it. Periodic maintenance path.
    pub fn sweep_all(&self) -> Result<()> {
        let pairs: Vec<Arc<StorePair>> = self.lock()?.values().cloned().collect();
        for pair in pairs {
            pair.index.sweep()?;
            pair.key.sweep()?;
        }
        Ok(())
    }

    /// Close the pair for `name` and permanently delete its on-disk stores.
    /// Used when a data input is removed from configuration.
    pub fn clean_and_remove(&self, name: &str, dir: &Path) -> Result<()> {
        info!(data_input = %name, "Closing and removing checkpoint store-pair");
        let pair = self.get(name, dir)?;
        self.lock()?.remove(name);
        pair.index.close()?;
        pair.key.close()?;
        delete_checkpoint_files(name, dir)
    }
}

/// Remove a data input's checkpoint files without opening them.
///
/// Missing files are skipped, so this is safe to call for inputs that never
/// ran or were already removed.
pub fn delete_checkpoint_files(name: &str, dir: &Path) -> Result<()> {
    let index_file = checkpoint_file(name, StoreRole::Index, dir);
    let key_file = checkpoint_file(name, StoreRole::Key, dir);

    if index_file.is_file() {
        std::fs::remove_file(&index_file)?;
    }
    if key_file.is_file() {
        std::fs::remove_file(&key_file)?;
    }
    info!(
        data_input = %name,
        index_file = %index_file.display(),
        key_file = %key_file.display(),
        "Checkpoint files deleted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_get_is_idempotent() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let first = pool.get("job1", dir.path()).unwrap();
        let second = pool.get("job1", dir.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_independent_inputs_get_independent_pairs() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let one = pool.get("job1", dir.path()).unwrap();
        let two = pool.get("job2", dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&one, &two));
        assert_ne!(one.index.path(), two.index.path());
    }

    #[test]
    fn test_clean_evicts_and_closes() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let pair = pool.get("job1", dir.path()).unwrap();
        pool.clean("job1").unwrap();

        // The old handle is closed; a fresh get opens a new pair.
        assert!(pair.index.get::<serde_json::Value>("x").is_err());
        let reopened = pool.get("job1", dir.path()).unwrap();
        assert!(!Arc::ptr_eq(&pair, &reopened));
    }

    #[test]
    fn test_clean_unknown_input_is_noop() {
        let pool = CheckpointPool::new();
        pool.clean("never-opened").unwrap();
    }

    #[test]
    fn test_close_all() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let one = pool.get("job1", dir.path()).unwrap();
        let two = pool.get("job2", dir.path()).unwrap();
        pool.close_all().unwrap();

        assert!(one.index.get::<serde_json::Value>("x").is_err());
        assert!(two.key.get::<serde_json::Value>("x").is_err());
    }

    #[test]
    fn test_sweep_all_keeps_pairs_open() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let pair = pool.get("job1", dir.path()).unwrap();
        pool.sweep_all().unwrap();

        // Still open and still the cached pair.
        let again = pool.get("job1", dir.path()).unwrap();
        assert!(Arc::ptr_eq(&pair, &again));
        assert!(pair.index.get::<serde_json::Value>("x").unwrap().is_none());
    }

    #[test]
    fn test_clean_and_remove_deletes_files() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        pool.get("job1", dir.path()).unwrap();
        pool.clean_and_remove("job1", dir.path()).unwrap();

        assert!(!checkpoint_file("job1", StoreRole::Index, dir.path()).exists());
        assert!(!checkpoint_file("job1", StoreRole::Key, dir.path()).exists());
    }

    #[test]
    fn test_delete_checkpoint_files_tolerates_missing() {
        let dir = tempdir().unwrap();
        delete_checkpoint_files("never-created", dir.path()).unwrap();
    }
}
