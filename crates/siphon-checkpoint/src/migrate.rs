//! One-shot migration of legacy checkpoints into the store-pair format
//!
//! Runs once per configured task at startup, before steady-state reads.
//! Formats predating the legacy generic store are converted by an older
//! converter upstream; this module only handles the generic-store layout.
//!
//! The conversion is re-runnable: its first step is an absence check on the
//! legacy index key, and a sibling backup of the unmodified record is
//! written before anything destructive happens. A failure mid-loop leaves
//! both in place, so the next run simply starts over.

use crate::error::Result;
use crate::legacy::LegacyStateStore;
use crate::pool::CheckpointPool;
use crate::records::{BucketScanState, KeyIndexEntry, KeyIngestState, FORMAT_VERSION, META_KEY};
use serde::{Deserialize, Serialize};
use siphon_common::CollectionTask;
use std::collections::BTreeMap;
use tracing::info;

/// Suffix of the per-input legacy index key.
const LEGACY_INDEX_SUFFIX: &str = ".ckpt";

/// Suffix of the sibling backup key written before conversion.
const LEGACY_BACKUP_SUFFIX: &str = ".ckpt.bak";

/// Legacy per-input index record: discovered objects plus whatever metadata
/// the old collector kept alongside them. Unknown fields ride along so the
/// backup is byte-faithful in meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyIndexRecord {
    /// Discovered objects, keyed by object name.
    #[serde(default)]
    pub keys: BTreeMap<String, LegacyIndexEntry>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One discovered object inside a [`LegacyIndexRecord`], carrying the key of
/// its per-object checkpoint record in the legacy store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyIndexEntry {
    /// Legacy-store key of this object's checkpoint record.
    pub key_ckpt: String,

    /// Remote last-modified timestamp at discovery time.
    #[serde(default)]
    pub last_modified: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Convert every task's legacy checkpoint into the current store-pair
/// format. Tasks without a legacy index record are skipped, which makes the
/// whole pass idempotent.
pub fn migrate_legacy_checkpoints(
    pool: &CheckpointPool,
    store: &mut LegacyStateStore,
    tasks: &[CollectionTask],
) -> Result<()> {
    for task in tasks {
        migrate_task(pool, store, task)?;
    }
    Ok(())
}

fn migrate_task(
    pool: &CheckpointPool,
    store: &mut LegacyStateStore,
    task: &CollectionTask,
) -> Result<()> {
    let index_key = format!("{}{}", task.data_input, LEGACY_INDEX_SUFFIX);
    let Some(legacy) = store.get_state::<LegacyIndexRecord>(&index_key)? else {
        // Already migrated or never started.
        return Ok(());
    };

    info!(
        data_input = %task.data_input,
        objects = legacy.keys.len(),
        "Migrating legacy checkpoint"
    );

    // Back up the unmodified record before any destructive step.
    let backup_key = format!("{}{}", task.data_input, LEGACY_BACKUP_SUFFIX);
    store.update_state(&backup_key, &legacy)?;

    let pair = pool.get(&task.data_input, &task.checkpoint_dir)?;
    pair.index
        .set(META_KEY, &BucketScanState::initial(task), true)?;

    for (name, entry) in &legacy.keys {
        let index_entry = KeyIndexEntry {
            last_modified: entry.last_modified.clone(),
            extra: entry.extra.clone(),
        };
        pair.index.set(name, &index_entry, true)?;

        // The per-object legacy record may already be gone; the index entry
        // alone is still worth carrying over.
        if let Some(mut key_record) = store.get_state::<KeyIngestState>(&entry.key_ckpt)? {
            key_record.format_version = FORMAT_VERSION;
            pair.key.set(name, &key_record, true)?;
        }
    }

    // Release the file handles this migration opened, then drop the legacy
    // index key. Per-object legacy records are left in place.
    pool.clean(&task.data_input)?;
    store.delete_state(&index_key)?;

    info!(data_input = %task.data_input, "Legacy checkpoint migrated");
    Ok(())
}
