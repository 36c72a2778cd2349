//! Key checkpoint: ingestion progress for one discovered object
//!
//! A [`KeyCheckpoint`] wraps the key store of a data input's pair and tracks
//! how far one object's content has been consumed. The in-memory record is
//! the source of truth between saves; every committed mutation rewrites the
//! whole record.

use crate::error::Result;
use crate::pool::{CheckpointPool, StorePair};
use crate::records::{IngestState, KeyIngestState};
use crate::retry::{with_retries, SAVE_ATTEMPTS};
use siphon_common::{CollectionTask, RemoteObject};
use std::sync::Arc;
use tracing::debug;

/// Ingestion progress record for one object.
pub struct KeyCheckpoint {
    pair: Arc<StorePair>,
    key_name: String,
    item: KeyIngestState,
    is_new: bool,
}

impl KeyCheckpoint {
    /// Open the key checkpoint for `object` within `task`'s store pair.
    ///
    /// On a store miss a fresh record is synthesized and the instance is
    /// marked new; nothing is persisted until a mutation commits.
    pub fn open(pool: &CheckpointPool, task: &CollectionTask, object: &RemoteObject) -> Result<Self> {
        let pair = pool.get(&task.data_input, &task.checkpoint_dir)?;

        let (item, is_new) = match pair.key.get::<KeyIngestState>(&object.name)? {
            Some(item) => (item, false),
            None => {
                debug!(key = %object.name, "Creating key checkpoint record");
                (KeyIngestState::new(object), true)
            },
        };

        Ok(Self {
            pair,
            key_name: object.name.clone(),
            item,
            is_new,
        })
    }

    /// Whether this record was synthesized rather than loaded.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Object name this checkpoint belongs to.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// The full in-memory record.
    pub fn record(&self) -> &KeyIngestState {
        &self.item
    }

    pub fn etag(&self) -> &str {
        &self.item.etag
    }

    pub fn last_modified(&self) -> &str {
        &self.item.last_modified
    }

    pub fn encoding(&self) -> Option<&str> {
        self.item.encoding.as_deref()
    }

    /// Record the detected content encoding.
    pub fn set_encoding(&mut self, encoding: impl Into<String>, commit: bool) -> Result<()> {
        self.item.encoding = Some(encoding.into());
        if commit {
            self.save()?;
        }
        Ok(())
    }

    pub fn eof(&self) -> bool {
        self.item.eof
    }

    /// Mark whether the object's content has been fully consumed.
    pub fn set_eof(&mut self, eof: bool, commit: bool) -> Result<()> {
        self.item.eof = eof;
        if commit {
            self.save()?;
        }
        Ok(())
    }

    pub fn offset(&self) -> u64 {
        self.item.offset
    }

    /// Overwrite the consumed-byte offset.
    pub fn set_offset(&mut self, offset: u64, commit: bool) -> Result<()> {
        self.item.offset = offset;
        if commit {
            self.save()?;
        }
        Ok(())
    }

    /// Advance the consumed-byte offset by `delta`.
    ///
    /// Caller contract: `delta` must equal exactly the bytes durably
    /// consumed since the previous save. The record has no independent proof
    /// of consumption, so under-counting re-reads bytes on resume and
    /// over-counting silently skips unread bytes.
    pub fn increase_offset(&mut self, delta: u64, commit: bool) -> Result<()> {
        self.item.offset += delta;
        if commit {
            self.save()?;
        }
        Ok(())
    }

    pub fn error_count(&self) -> u64 {
        self.item.error_count
    }

    /// Add `count` to the error count and force the record into
    /// [`IngestState::Failed`]. Error state takes precedence over any
    /// offset/eof-implied progress in all external readings.
    pub fn increase_error_count(&mut self, count: u64, commit: bool) -> Result<()> {
        self.item.error_count += count;
        self.item.state = IngestState::Failed;
        if commit {
            self.save()?;
        }
        Ok(())
    }

    pub fn state(&self) -> IngestState {
        self.item.state
    }

    /// Transition the lifecycle state, writing through to storage
    /// immediately. `flush` maps to store durability: control-plane
    /// transitions are never left sitting in memory.
    pub fn set_state(&mut self, state: IngestState, flush: bool) -> Result<()> {
        self.item.state = state;
        self.pair.key.set(&self.key_name, &self.item, flush)
    }

    /// Persist the whole record. Retried before the final failure
    /// propagates.
    pub fn save(&mut self) -> Result<()> {
        let pair = &self.pair;
        let key_name = &self.key_name;
        let item = &self.item;
        with_retries("Key checkpoint save", SAVE_ATTEMPTS, || {
            pair.key.set(key_name, item, true)
        })
    }

    /// Remove the record: the object is fully processed and no longer
    /// tracked, or is being intentionally reset.
    pub fn delete(self) -> Result<()> {
        self.pair.key.delete(&self.key_name)
    }
}

impl std::fmt::Debug for KeyCheckpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCheckpoint")
            .field("key_name", &self.key_name)
            .field("is_new", &self.is_new)
            .field("item", &self.item)
            .finish()
    }
}
