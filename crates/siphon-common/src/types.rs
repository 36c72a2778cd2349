//! Common types used across Siphon

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Descriptor of one configured collection job ("data input").
///
/// A collection task names the remote bucket being ingested and the local
/// directory its checkpoint stores live under. Tasks are independent of each
/// other: each one owns its own pair of checkpoint stores, keyed by
/// `data_input`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionTask {
    /// Name of the data input. Used to key the checkpoint pool and to derive
    /// the on-disk checkpoint file names.
    pub data_input: String,

    /// Directory the checkpoint stores for this input are created under.
    pub checkpoint_dir: PathBuf,

    /// Name of the remote bucket this input collects from.
    pub bucket_name: String,

    /// Optional initial last-modified seed for a brand-new checkpoint.
    ///
    /// When set, objects older than this timestamp are considered already
    /// ingested the first time the input runs. The value is carried as an
    /// opaque string; the collector never parses it.
    pub initial_last_modified: Option<String>,
}

impl CollectionTask {
    /// Create a task with no initial last-modified seed.
    pub fn new(
        data_input: impl Into<String>,
        checkpoint_dir: impl Into<PathBuf>,
        bucket_name: impl Into<String>,
    ) -> Self {
        Self {
            data_input: data_input.into(),
            checkpoint_dir: checkpoint_dir.into(),
            bucket_name: bucket_name.into(),
            initial_last_modified: None,
        }
    }

    /// Set the initial last-modified seed.
    pub fn with_initial_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.initial_last_modified = Some(last_modified.into());
        self
    }
}

/// Metadata for one remote object, as reported by a bucket listing.
///
/// Timestamps and entity tags are opaque strings taken verbatim from the
/// remote listing; equality is the only operation performed on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Object name (the listing key), unique within a bucket.
    pub name: String,

    /// Remote entity tag at discovery time.
    pub etag: String,

    /// Remote last-modified timestamp at discovery time.
    pub last_modified: String,
}

impl RemoteObject {
    pub fn new(
        name: impl Into<String>,
        etag: impl Into<String>,
        last_modified: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            etag: etag.into(),
            last_modified: last_modified.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let task = CollectionTask::new("inputs://s3/logs", "/var/lib/siphon/ckpt", "acme-logs")
            .with_initial_last_modified("2024-01-01T00:00:00Z");

        assert_eq!(task.data_input, "inputs://s3/logs");
        assert_eq!(task.bucket_name, "acme-logs");
        assert_eq!(
            task.initial_last_modified.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_task_serde_round_trip() {
        let task = CollectionTask::new("job1", "/tmp/ckpt", "bucket-a");
        let json = serde_json::to_string(&task).unwrap();
        let restored: CollectionTask = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, task);
    }

    #[test]
    fn test_remote_object() {
        let object = RemoteObject::new("a.log", "e1", "2024-01-01");
        assert_eq!(object.name, "a.log");
        assert_eq!(object.etag, "e1");
    }
}
