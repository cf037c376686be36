//! Remote-side classification of a replica against the authoritative set.
//!
//! [`compare`] is pure: it reads two immutable collections and returns a
//! value, so concurrent callers against the same store never interfere.

use std::collections::{HashMap, HashSet};

use crate::models::{
    ConflictEntry, ImageId, ImageRecord, ReconciliationResult, SyncStatus, SyncSummary,
};

/// Classify every record into additions/updates, removals and conflicts.
///
/// For each authoritative record:
/// - unknown to the client → `added_or_updated`
/// - client copy `pending` and remote newer → conflict, local edit kept
/// - client copy `synced`/`conflict` and remote newer → `added_or_updated`
///
/// Client summaries missing from the authoritative set are reported as
/// `removed` unless they are `pending`.
pub fn compare(authoritative: &[ImageRecord], local: &[SyncSummary]) -> ReconciliationResult {
    let local_by_id: HashMap<ImageId, &SyncSummary> =
        local.iter().map(|summary| (summary.id, summary)).collect();

    let mut result = ReconciliationResult::default();

    for record in authoritative {
        let Some(summary) = local_by_id.get(&record.id) else {
            result.added_or_updated.push(record.clone());
            continue;
        };

        let remote_newer = record.updated_at > summary.last_modified;
        match summary.sync_status {
            SyncStatus::Pending if remote_newer => result.conflicts.push(ConflictEntry {
                id: record.id,
                remote_updated_at: record.updated_at,
                local_last_modified: summary.last_modified,
            }),
            SyncStatus::Pending => {}
            SyncStatus::Synced | SyncStatus::Conflict if remote_newer => {
                result.added_or_updated.push(record.clone());
            }
            SyncStatus::Synced | SyncStatus::Conflict => {}
        }
    }

    let remote_ids: HashSet<ImageId> = authoritative.iter().map(|record| record.id).collect();
    result.removed = local
        .iter()
        .filter(|summary| summary.sync_status != SyncStatus::Pending)
        .filter(|summary| !remote_ids.contains(&summary.id))
        .map(|summary| summary.id)
        .collect();

    result
}
