//! Index checkpoint: discovered-object set and bucket scan cursor
//!
//! One [`IndexCheckpoint`] wraps the index store of a data input's pair. It
//! owns the in-memory copy of the [`BucketScanState`] meta-record and writes
//! it back wholesale on every committed mutation, and it maintains one
//! [`KeyIndexEntry`] per discovered object.

use crate::error::{CheckpointError, Result};
use crate::pool::{CheckpointPool, StorePair};
use crate::records::{BucketScanState, KeyIndexEntry, KeyIngestState, META_KEY};
use crate::retry::{with_retries, SAVE_ATTEMPTS};
use crate::store::ObjectNames;
use siphon_common::CollectionTask;
use std::sync::Arc;
use tracing::info;

/// Discovered-object index for one data input.
pub struct IndexCheckpoint {
    pair: Arc<StorePair>,
    meta: BucketScanState,
}

impl IndexCheckpoint {
    /// Open the index checkpoint for `task`, loading its meta-record.
    ///
    /// When the meta-record is absent and `create_if_absent` is true, an
    /// initial record is synthesized from the task configuration and
    /// persisted immediately. When creation is not requested, the absence is
    /// a controlled [`CheckpointError::NotFound`]; nothing is written.
    pub fn open(
        pool: &CheckpointPool,
        task: &CollectionTask,
        create_if_absent: bool,
    ) -> Result<Self> {
        let pair = pool.get(&task.data_input, &task.checkpoint_dir)?;

        let meta = match pair.index.get::<BucketScanState>(META_KEY)? {
            Some(meta) => meta,
            None => {
                info!(data_input = %task.data_input, "Index checkpoint does not exist");
                if !create_if_absent {
                    return Err(CheckpointError::not_found(format!(
                        "index checkpoint for data input {}",
                        task.data_input
                    )));
                }
                let meta = BucketScanState::initial(task);
                pair.index.set(META_KEY, &meta, true)?;
                info!(data_input = %task.data_input, "Created index checkpoint");
                meta
            },
        };

        Ok(Self { pair, meta })
    }

    /// Persist the meta-record so the cursor any reader observes is at least
    /// as fresh as the one a scan starts from.
    pub fn flush_cursor(&mut self) -> Result<()> {
        self.save()
    }

    /// All discovered object names, excluding the reserved meta key.
    ///
    /// Calls [`IndexCheckpoint::flush_cursor`] first, then returns a
    /// single-pass iterator over the store's key range. The iterator is a
    /// snapshot and is not restartable mid-iteration.
    pub fn keys(&mut self) -> Result<ObjectNames> {
        self.flush_cursor()?;
        Ok(self.pair.index.keys()?.excluding(META_KEY))
    }

    /// Upsert the index entry for one discovered object. With
    /// `flush = false` the write stays in the store's in-memory state until
    /// the next durable commit.
    pub fn add(&self, name: &str, last_modified: &str, flush: bool) -> Result<()> {
        self.pair
            .index
            .set(name, &KeyIndexEntry::new(last_modified), flush)
    }

    /// Look up the index entry for `name`.
    pub fn get(&self, name: &str) -> Result<Option<KeyIndexEntry>> {
        self.pair.index.get(name)
    }

    /// Remove the index entry for `name`.
    pub fn delete_item(&self, name: &str) -> Result<()> {
        self.pair.index.delete(name)
    }

    /// Bucket this input collects from.
    pub fn bucket_name(&self) -> &str {
        &self.meta.bucket_name
    }

    /// Discovery high-water mark.
    pub fn last_modified(&self) -> Option<&str> {
        self.meta.latest_last_modified.as_deref()
    }

    /// Update the discovery high-water mark. `commit` rewrites the whole
    /// meta-record immediately.
    pub fn set_last_modified(&mut self, last_modified: impl Into<String>, commit: bool) -> Result<()> {
        self.meta.latest_last_modified = Some(last_modified.into());
        if commit {
            self.save()?;
        }
        Ok(())
    }

    /// Opaque scan-resumption cursor.
    pub fn latest_scanned(&self) -> &str {
        &self.meta.latest_scanned
    }

    /// Update the scan-resumption cursor. `commit` rewrites the whole
    /// meta-record immediately.
    pub fn set_latest_scanned(&mut self, latest_scanned: impl Into<String>, commit: bool) -> Result<()> {
        self.meta.latest_scanned = latest_scanned.into();
        if commit {
            self.save()?;
        }
        Ok(())
    }

    /// Persist the meta-record. Retried before the final failure propagates.
    pub fn save(&mut self) -> Result<()> {
        let pair = &self.pair;
        let meta = &self.meta;
        with_retries("Index meta save", SAVE_ATTEMPTS, || {
            pair.index.set(META_KEY, meta, true)
        })
    }

    /// Generic lookup in this input's key store. A clean miss is `Ok(None)`;
    /// transient failures are retried before the final error propagates.
    pub fn get_state(&self, key: &str) -> Result<Option<KeyIngestState>> {
        with_retries("Key state lookup", SAVE_ATTEMPTS, || self.pair.key.get(key))
    }

    /// Generic delete in this input's key store.
    pub fn delete_state(&self, key: &str) -> Result<()> {
        self.pair.key.delete(key)
    }

    /// Durably flush pending writes in both stores without closing them.
    pub fn flush(&self) -> Result<()> {
        self.pair.key.flush()?;
        self.pair.index.flush()
    }
}

impl std::fmt::Debug for IndexCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCheckpoint")
            .field("data_input", &self.pair.name())
            .field("meta", &self.meta)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn task(dir: &std::path::Path) -> CollectionTask {
        CollectionTask::new("job1", dir, "bucket-a").with_initial_last_modified("2024-01-01")
    }

    #[test]
    fn test_open_without_create_fails_when_absent() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let result = IndexCheckpoint::open(&pool, &task(dir.path()), false);
        assert!(matches!(result, Err(CheckpointError::NotFound(_))));

        // Nothing was synthesized: a second non-creating open still fails.
        let result = IndexCheckpoint::open(&pool, &task(dir.path()), false);
        assert!(matches!(result, Err(CheckpointError::NotFound(_))));
    }

    #[test]
    fn test_create_persists_initial_meta() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();

        let index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();
        assert_eq!(index.bucket_name(), "bucket-a");
        assert_eq!(index.last_modified(), Some("2024-01-01"));
        assert_eq!(index.latest_scanned(), "");

        // Durably readable immediately: a second instance sees the record.
        let reopened = IndexCheckpoint::open(&pool, &task(dir.path()), false).unwrap();
        assert_eq!(reopened.bucket_name(), "bucket-a");
    }

    #[test]
    fn test_add_get_delete_item() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();
        let index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();

        index.add("a.log", "2024-02-02", true).unwrap();
        let entry = index.get("a.log").unwrap().unwrap();
        assert_eq!(entry.last_modified, "2024-02-02");

        index.delete_item("a.log").unwrap();
        assert!(index.get("a.log").unwrap().is_none());
    }

    #[test]
    fn test_keys_excludes_meta_and_flushes_cursor() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();
        let mut index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();

        index.add("b.log", "t2", true).unwrap();
        index.add("a.log", "t1", true).unwrap();
        index.set_latest_scanned("cursor-1", false).unwrap();

        let names: Vec<String> = index.keys().unwrap().collect();
        assert_eq!(names, vec!["a.log".to_string(), "b.log".to_string()]);

        // keys() saved the meta-record before iterating.
        let reopened = IndexCheckpoint::open(&pool, &task(dir.path()), false).unwrap();
        assert_eq!(reopened.latest_scanned(), "cursor-1");
    }

    #[test]
    fn test_meta_mutators_commit() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();
        let mut index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();

        index.set_last_modified("2024-03-03", true).unwrap();
        index.set_latest_scanned("cursor-2", true).unwrap();

        let reopened = IndexCheckpoint::open(&pool, &task(dir.path()), false).unwrap();
        assert_eq!(reopened.last_modified(), Some("2024-03-03"));
        assert_eq!(reopened.latest_scanned(), "cursor-2");
    }

    #[test]
    fn test_uncommitted_mutation_stays_in_memory() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();
        let mut index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();

        index.set_last_modified("2024-04-04", false).unwrap();
        assert_eq!(index.last_modified(), Some("2024-04-04"));

        let reopened = IndexCheckpoint::open(&pool, &task(dir.path()), false).unwrap();
        assert_eq!(reopened.last_modified(), Some("2024-01-01"));
    }

    #[test]
    fn test_get_state_clean_miss_is_none() {
        let dir = tempdir().unwrap();
        let pool = CheckpointPool::new();
        let index = IndexCheckpoint::open(&pool, &task(dir.path()), true).unwrap();

        assert!(index.get_state("never-seen").unwrap().is_none());
    }
}
