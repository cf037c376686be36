//! Replica-side record model

use serde::{Deserialize, Serialize};

use super::image::{ImageId, ImageRecord};

/// Replica bookkeeping state of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Matches what the last reconciliation round observed
    #[default]
    Synced,
    /// Carries a local change the remote side has not confirmed
    Pending,
    /// Flagged by an earlier round; treated like `Synced` by the comparator
    Conflict,
}

impl SyncStatus {
    /// Lowercase label used on the wire and in CLI output
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Conflict => "conflict",
        }
    }
}

/// An image as held by the local replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRecord {
    #[serde(flatten)]
    pub image: ImageRecord,
    /// Client-observed time of the last local mutation or sync (Unix ms)
    pub last_modified: i64,
    pub sync_status: SyncStatus,
}

impl LocalRecord {
    /// Wrap an image as freshly synced at `now`
    #[must_use]
    pub const fn synced(image: ImageRecord, now: i64) -> Self {
        Self {
            image,
            last_modified: now,
            sync_status: SyncStatus::Synced,
        }
    }

    /// Record identifier
    #[must_use]
    pub const fn id(&self) -> ImageId {
        self.image.id
    }

    /// Check whether the record carries an uncommitted local change
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.sync_status == SyncStatus::Pending
    }

    /// Advance `last_modified` without ever moving it backwards
    pub fn touch(&mut self, now: i64) {
        self.last_modified = self.last_modified.max(now);
    }
}
