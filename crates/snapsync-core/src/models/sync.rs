//! Reconciliation payloads and results

use serde::{Deserialize, Serialize};

use super::image::{ImageId, ImageRecord};
use super::local_record::{LocalRecord, SyncStatus};

/// Minimal per-record payload sent to the comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub id: ImageId,
    pub last_modified: i64,
    pub sync_status: SyncStatus,
}

impl From<&LocalRecord> for SyncSummary {
    fn from(record: &LocalRecord) -> Self {
        Self {
            id: record.id(),
            last_modified: record.last_modified,
            sync_status: record.sync_status,
        }
    }
}

/// Body of `POST /sync`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub local_images: Vec<SyncSummary>,
}

/// Remote change that raced an uncommitted local edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictEntry {
    pub id: ImageId,
    pub remote_updated_at: i64,
    pub local_last_modified: i64,
}

/// Three-way classification produced by the comparator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub added_or_updated: Vec<ImageRecord>,
    pub removed: Vec<ImageId>,
    pub conflicts: Vec<ConflictEntry>,
}

impl ReconciliationResult {
    /// Check whether the round has nothing to apply or report
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_or_updated.is_empty() && self.removed.is_empty() && self.conflicts.is_empty()
    }
}

/// Outcome of one `run_sync` round as reported to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts: usize,
}

impl SyncResult {
    /// A round that applied cleanly
    #[must_use]
    pub const fn completed(uploaded: usize, downloaded: usize, conflicts: usize) -> Self {
        Self {
            success: true,
            error: None,
            uploaded,
            downloaded,
            conflicts,
        }
    }

    /// A round that aborted without touching the replica
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            uploaded: 0,
            downloaded: 0,
            conflicts: 0,
        }
    }
}

/// Read-only aggregate of replica health
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub pending: usize,
    pub conflicts: usize,
    pub total: usize,
    pub last_sync: Option<i64>,
}
