//! Persisted checkpoint record types
//!
//! Three record shapes live in the per-input store pair:
//!
//! - [`BucketScanState`]: exactly one per data input, stored under the
//!   reserved meta key in the index store.
//! - [`KeyIndexEntry`]: one per discovered object, keyed by object name in
//!   the index store.
//! - [`KeyIngestState`]: one per object being ingested, keyed by object
//!   name in the key store.
//!
//! All records are JSON-encoded; the store adapter decodes them uniformly so
//! components never see raw bytes.

use serde::{Deserialize, Serialize};
use siphon_common::{CollectionTask, RemoteObject};

/// Current on-disk checkpoint format version.
pub const FORMAT_VERSION: u32 = 3;

/// Reserved index-store key holding the [`BucketScanState`] meta-record.
/// Object names never collide with it; `keys()` filters it out.
pub(crate) const META_KEY: &str = "__meta__";

/// Per-input bucket scan state, stored under [`META_KEY`].
///
/// `latest_last_modified` is the discovery high-water mark; `latest_scanned`
/// is an opaque scan-resumption cursor. Mutations always rewrite the whole
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketScanState {
    /// Remote bucket this input collects from.
    pub bucket_name: String,

    /// High-water mark for object discovery. `None` until the first scan
    /// completes, unless seeded from the task configuration.
    pub latest_last_modified: Option<String>,

    /// Opaque scan-resumption cursor. Empty when no scan is in flight.
    #[serde(default)]
    pub latest_scanned: String,

    /// Checkpoint format version this record was written with.
    pub format_version: u32,
}

impl BucketScanState {
    /// Synthesize the initial meta-record for a brand-new data input.
    pub(crate) fn initial(task: &CollectionTask) -> Self {
        Self {
            bucket_name: task.bucket_name.clone(),
            latest_last_modified: task.initial_last_modified.clone(),
            latest_scanned: String::new(),
            format_version: FORMAT_VERSION,
        }
    }
}

/// Discovered-object entry in the index store, keyed by object name.
///
/// Entries migrated from the legacy format may carry extra fields beyond
/// `last_modified`; those are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyIndexEntry {
    /// Remote last-modified timestamp at discovery time.
    #[serde(default)]
    pub last_modified: String,

    #[serde(flatten, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl KeyIndexEntry {
    pub fn new(last_modified: impl Into<String>) -> Self {
        Self {
            last_modified: last_modified.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Lifecycle of one object's ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IngestState {
    /// Record was synthesized and never persisted progress.
    #[default]
    New,
    /// Content transfer is underway.
    Processing,
    /// Content was fully consumed.
    Done,
    /// An error was recorded; overrides offset/eof-implied progress.
    Failed,
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestState::New => write!(f, "new"),
            IngestState::Processing => write!(f, "processing"),
            IngestState::Done => write!(f, "done"),
            IngestState::Failed => write!(f, "failed"),
        }
    }
}

/// Per-object ingestion progress, keyed by object name in the key store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIngestState {
    /// Remote entity tag at discovery time.
    pub etag: String,

    /// Remote last-modified timestamp at discovery time.
    pub last_modified: String,

    /// Bytes durably consumed so far. Monotonic while `eof` is false.
    #[serde(default)]
    pub offset: u64,

    /// Whether the object's content has been fully consumed.
    #[serde(default)]
    pub eof: bool,

    /// Number of errors recorded against this object. Any non-zero count
    /// forces `state` to [`IngestState::Failed`].
    #[serde(default)]
    pub error_count: u64,

    /// Ingestion lifecycle state.
    #[serde(default)]
    pub state: IngestState,

    /// Detected content encoding, once known.
    #[serde(default)]
    pub encoding: Option<String>,

    /// Checkpoint format version this record was written with. Legacy
    /// records may omit it; the migrator stamps the current version.
    #[serde(default)]
    pub format_version: u32,
}

impl KeyIngestState {
    /// Synthesize a fresh record for a never-seen object.
    pub(crate) fn new(object: &RemoteObject) -> Self {
        Self {
            etag: object.etag.clone(),
            last_modified: object.last_modified.clone(),
            offset: 0,
            eof: false,
            error_count: 0,
            state: IngestState::New,
            encoding: None,
            format_version: FORMAT_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_key_ingest_state() {
        let object = RemoteObject::new("a.log", "e1", "2024-01-01");
        let state = KeyIngestState::new(&object);

        assert_eq!(state.offset, 0);
        assert!(!state.eof);
        assert_eq!(state.error_count, 0);
        assert_eq!(state.state, IngestState::New);
        assert_eq!(state.encoding, None);
        assert_eq!(state.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_meta_record_seeded_from_task() {
        let task = CollectionTask::new("job1", "/tmp/ckpt", "bucket-a")
            .with_initial_last_modified("2024-01-01");
        let meta = BucketScanState::initial(&task);

        assert_eq!(meta.bucket_name, "bucket-a");
        assert_eq!(meta.latest_last_modified.as_deref(), Some("2024-01-01"));
        assert_eq!(meta.latest_scanned, "");
        assert_eq!(meta.format_version, FORMAT_VERSION);
    }

    #[test]
    fn test_meta_record_tolerates_missing_cursor() {
        // Records written by the migrator omit latest_scanned.
        let json = r#"{"bucket_name":"b","latest_last_modified":null,"format_version":3}"#;
        let meta: BucketScanState = serde_json::from_str(json).unwrap();
        assert_eq!(meta.latest_scanned, "");
    }

    #[test]
    fn test_ingest_state_serde_names() {
        assert_eq!(
            serde_json::to_string(&IngestState::Failed).unwrap(),
            "\"failed\""
        );
        assert_eq!(
            serde_json::from_str::<IngestState>("\"new\"").unwrap(),
            IngestState::New
        );
    }

    #[test]
    fn test_index_entry_preserves_extra_fields() {
        let json = r#"{"last_modified":"2024-01-01","size":42}"#;
        let entry: KeyIndexEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.last_modified, "2024-01-01");
        assert_eq!(entry.extra["size"], 42);

        let restored = serde_json::to_value(&entry).unwrap();
        assert_eq!(restored["size"], 42);
    }

    #[test]
    fn test_legacy_key_state_defaults() {
        // Legacy records carry no format_version and may omit progress fields.
        let json = r#"{"etag":"e1","last_modified":"2023-06-01","offset":100}"#;
        let state: KeyIngestState = serde_json::from_str(json).unwrap();
        assert_eq!(state.offset, 100);
        assert_eq!(state.format_version, 0);
        assert_eq!(state.state, IngestState::New);
    }
}
