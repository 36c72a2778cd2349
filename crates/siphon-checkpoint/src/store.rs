//! Store adapter over the embedded key/value database
//!
//! One [`KvStore`] wraps one single-file `redb` database holding a single
//! string-keyed table of JSON-encoded records. Records are decoded at this
//! boundary, so every component above it sees typed values and plain `&str`
//! keys, never raw bytes.
//!
//! The database enforces a single writer per file; a second open of the same
//! path fails instead of corrupting the store.

use crate::error::{CheckpointError, Result};
use redb::{Database, Durability, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// The single table every checkpoint store keeps its records in.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

/// Role of a store within a data input's pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRole {
    /// Discovered-object index plus the bucket scan meta-record.
    Index,
    /// Per-object ingestion progress records.
    Key,
}

impl StoreRole {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreRole::Index => "index",
            StoreRole::Key => "key",
        }
    }
}

impl std::fmt::Display for StoreRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full path of a checkpoint store file: `<dir>/<name>.<role>.v3.ckpt`.
pub fn checkpoint_file(name: &str, role: StoreRole, dir: &Path) -> PathBuf {
    dir.join(format!("{name}.{role}.v3.ckpt"))
}

/// Durable single-writer key/value store for checkpoint records.
///
/// Writes with `flush = false` stay in the database's non-durable state and
/// remain visible to readers; the next durable commit (any `flush = true`
/// write, or an explicit [`KvStore::flush`]) persists them.
pub struct KvStore {
    path: PathBuf,
    db: RwLock<Option<Database>>,
}

impl KvStore {
    /// Open the store at `path`, creating it if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(&path)?;

        // Ensure the records table exists before any reader opens it.
        let txn = db.begin_write()?;
        txn.open_table(RECORDS)?;
        txn.commit()?;

        debug!(path = %path.display(), "Opened checkpoint store");
        Ok(Self {
            path,
            db: RwLock::new(Some(db)),
        })
    }

    /// Path of the underlying database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_db<R>(&self, f: impl FnOnce(&Database) -> Result<R>) -> Result<R> {
        let guard = self.db.read().map_err(|_| CheckpointError::LockPoisoned)?;
        match guard.as_ref() {
            Some(db) => f(db),
            None => Err(CheckpointError::StoreClosed(
                self.path.display().to_string(),
            )),
        }
    }

    /// Look up `key`, decoding the stored record. Absent keys are `Ok(None)`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(RECORDS)?;
            match table.get(key)? {
                Some(raw) => Ok(Some(serde_json::from_slice(raw.value())?)),
                None => Ok(None),
            }
        })
    }

    /// Upsert `key`. With `flush = false` the write is applied but not made
    /// durable until the next durable commit.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, flush: bool) -> Result<()> {
        self.with_db(|db| {
            let encoded = serde_json::to_vec(value)?;
            let mut txn = db.begin_write()?;
            if !flush {
                txn.set_durability(Durability::None);
            }
            {
                let mut table = txn.open_table(RECORDS)?;
                table.insert(key, encoded.as_slice())?;
            }
            txn.commit()?;
            Ok(())
        })
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.with_db(|db| {
            let txn = db.begin_write()?;
            {
                let mut table = txn.open_table(RECORDS)?;
                table.remove(key)?;
            }
            txn.commit()?;
            Ok(())
        })
    }

    /// Snapshot all keys in range order.
    ///
    /// The returned iterator is single-pass and reflects the store contents
    /// at the moment of the call; writes made afterwards are not visible
    /// through it.
    pub fn keys(&self) -> Result<ObjectNames> {
        self.with_db(|db| {
            let txn = db.begin_read()?;
            let table = txn.open_table(RECORDS)?;
            let mut names = Vec::new();
            for item in table.iter()? {
                let (key, _value) = item?;
                names.push(key.value().to_string());
            }
            Ok(ObjectNames::new(names))
        })
    }

    /// Durably persist every pending write.
    pub fn flush(&self) -> Result<()> {
        self.with_db(|db| {
            // An empty durable commit carries all earlier non-durable ones
            // with it.
            let txn = db.begin_write()?;
            txn.commit()?;
            Ok(())
        })
    }

    /// Compact the store in place, reclaiming space from deleted records.
    pub fn sweep(&self) -> Result<()> {
        let mut guard = self.db.write().map_err(|_| CheckpointError::LockPoisoned)?;
        match guard.as_mut() {
            Some(db) => {
                let reclaimed = db.compact()?;
                debug!(path = %self.path.display(), reclaimed, "Swept checkpoint store");
                Ok(())
            },
            None => Err(CheckpointError::StoreClosed(
                self.path.display().to_string(),
            )),
        }
    }

    /// Close the store, releasing its file handle. Idempotent; any later
    /// operation on this handle fails with [`CheckpointError::StoreClosed`].
    pub fn close(&self) -> Result<()> {
        let mut guard = self.db.write().map_err(|_| CheckpointError::LockPoisoned)?;
        if let Some(db) = guard.take() {
            drop(db);
            debug!(path = %self.path.display(), "Closed checkpoint store");
        }
        Ok(())
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore").field("path", &self.path).finish()
    }
}

/// Single-pass iterator over a store's keys.
///
/// Produced by [`KvStore::keys`]; not restartable once consumed. An optional
/// reserved key can be excluded from iteration.
pub struct ObjectNames {
    inner: std::vec::IntoIter<String>,
    skip: Option<&'static str>,
}

impl ObjectNames {
    fn new(names: Vec<String>) -> Self {
        Self {
            inner: names.into_iter(),
            skip: None,
        }
    }

    /// Exclude one reserved key from the sequence.
    pub(crate) fn excluding(mut self, key: &'static str) -> Self {
        self.skip = Some(key);
        self
    }
}

impl Iterator for ObjectNames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            let name = self.inner.next()?;
            if self.skip != Some(name.as_str()) {
                return Some(name);
            }
        }
    }
}
