//! Durable checkpointing for incremental object-storage ingestion
//!
//! Each configured collection job ("data input") owns a pair of single-file
//! key/value stores under its checkpoint directory: an index store recording
//! which remote objects have been discovered plus the bucket scan cursor,
//! and a key store recording how far each object's content has been
//! consumed. The [`CheckpointPool`] keeps at most one open pair per input
//! within a process; [`IndexCheckpoint`] and [`KeyCheckpoint`] wrap that
//! pair with typed record access; [`migrate_legacy_checkpoints`] lifts
//! checkpoints written by the older generic state store into this layout.
//!
//! Everything here is synchronous, blocking I/O. Concurrent use of one data
//! input's pair must be serialized by the caller, and coordination across
//! separate processes is explicitly out of scope.

pub mod error;
pub mod index;
pub mod key;
pub mod legacy;
pub mod migrate;
pub mod pool;
pub mod records;
mod retry;
pub mod store;

pub use error::{CheckpointError, Result};
pub use index::IndexCheckpoint;
pub use key::KeyCheckpoint;
pub use legacy::LegacyStateStore;
pub use migrate::{migrate_legacy_checkpoints, LegacyIndexEntry, LegacyIndexRecord};
pub use pool::{delete_checkpoint_files, CheckpointPool, StorePair};
pub use records::{
    BucketScanState, IngestState, KeyIndexEntry, KeyIngestState, FORMAT_VERSION,
};
pub use store::{checkpoint_file, KvStore, ObjectNames, StoreRole};
