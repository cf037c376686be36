//! Local replica of the image catalog.
//!
//! The replica is a best-effort cache, not the source of truth: storage
//! failures are logged and surface as empty/default results. Every mutation
//! goes through a [`ReplicaBatch`], which holds the replica lock from read to
//! write so user edits and the sync apply phase never interleave.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{Mutex, MutexGuard};

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{
    ConflictEntry, ImageId, ImageRecord, LocalRecord, StatusSummary, SyncStatus, SyncSummary,
};
use crate::util::now_millis;
use crate::wire;

/// Storage key holding the JSON array of records
pub const IMAGES_KEY: &str = "images";
/// Storage key holding the last successful sync time (Unix ms, as text)
pub const LAST_SYNC_KEY: &str = "lastSync";

/// Outcome of [`ReplicaBatch::adopt_remote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adoption {
    /// The remote version replaced the local copy
    Adopted,
    /// A pending local edit is at least as new as the remote version
    KeptLocal,
    /// A pending local edit beat a newer remote version
    Conflict(ConflictEntry),
}

/// Client-held persistent cache of [`LocalRecord`]s
pub struct LocalReplica<S> {
    store: S,
    clock: fn() -> i64,
    lock: Mutex<()>,
}

impl<S: KeyValueStore> LocalReplica<S> {
    /// Wrap a key/value store using the system clock
    pub fn new(store: S) -> Self {
        Self::with_clock(store, now_millis)
    }

    /// Wrap a key/value store with an explicit millisecond clock
    pub fn with_clock(store: S, clock: fn() -> i64) -> Self {
        Self {
            store,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Underlying store
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// All records, ordered by id. Never fails.
    pub async fn load_all(&self) -> Vec<LocalRecord> {
        let batch = self.begin().await;
        batch.records().cloned().collect()
    }

    /// Insert or overwrite `image` as a freshly synced record.
    ///
    /// The stored `last_modified` is the largest of now, the image's
    /// `updated_at` and the previous `last_modified`.
    pub async fn upsert(&self, image: ImageRecord) {
        let mut batch = self.begin().await;
        batch.upsert(image);
        Self::finish(batch.commit(None).await, "upsert");
    }

    /// Flag a record as carrying a local change; no-op when absent
    pub async fn mark_pending(&self, id: ImageId) -> bool {
        let mut batch = self.begin().await;
        let found = batch.mark_pending(id);
        Self::finish(batch.commit(None).await, "mark_pending");
        found
    }

    /// Rename a record locally and flag it pending; no-op when absent
    pub async fn rename(&self, id: ImageId, filename: &str) -> Result<bool> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(Error::InvalidInput("filename cannot be empty".into()));
        }

        let mut batch = self.begin().await;
        let found = batch.rename(id, filename);
        Self::finish(batch.commit(None).await, "rename");
        Ok(found)
    }

    /// Delete a record; no-op when absent
    pub async fn remove(&self, id: ImageId) -> bool {
        let mut batch = self.begin().await;
        let found = batch.remove(id);
        Self::finish(batch.commit(None).await, "remove");
        found
    }

    /// Aggregate counts used to display sync health
    pub async fn status_summary(&self) -> StatusSummary {
        let batch = self.begin().await;
        let mut summary = StatusSummary {
            total: batch.records.len(),
            last_sync: self.last_sync_unlocked().await,
            ..StatusSummary::default()
        };
        for record in batch.records() {
            match record.sync_status {
                SyncStatus::Pending => summary.pending += 1,
                SyncStatus::Conflict => summary.conflicts += 1,
                SyncStatus::Synced => {}
            }
        }
        summary
    }

    /// Time of the last successful reconciliation round
    pub async fn last_sync(&self) -> Option<i64> {
        let _guard = self.lock.lock().await;
        self.last_sync_unlocked().await
    }

    /// Lock the replica and load its records for a series of mutations.
    ///
    /// Nothing is written until [`ReplicaBatch::commit`].
    pub async fn begin(&self) -> ReplicaBatch<'_, S> {
        let guard = self.lock.lock().await;
        let (records, readable) = match self.read_records().await {
            Ok(records) => (records, true),
            Err(Error::DataAnomaly(message)) => {
                tracing::warn!("Discarding unreadable replica contents: {message}");
                (BTreeMap::new(), true)
            }
            Err(Error::Serialization(error)) => {
                tracing::warn!("Discarding unreadable replica contents: {error}");
                (BTreeMap::new(), true)
            }
            Err(error) => {
                tracing::warn!("Failed to read local replica: {error}");
                (BTreeMap::new(), false)
            }
        };

        ReplicaBatch {
            replica: self,
            _guard: guard,
            records,
            readable,
            dirty: false,
            now: (self.clock)(),
        }
    }

    async fn read_records(&self) -> Result<BTreeMap<ImageId, LocalRecord>> {
        let Some(raw) = self.store.get(IMAGES_KEY).await? else {
            return Ok(BTreeMap::new());
        };
        let decoded = wire::decode_local_records(&raw)?;
        Ok(decoded
            .items
            .into_iter()
            .map(|record| (record.id(), record))
            .collect())
    }

    async fn last_sync_unlocked(&self) -> Option<i64> {
        match self.store.get(LAST_SYNC_KEY).await {
            Ok(Some(raw)) => raw.trim().parse().map_or_else(
                |_| {
                    tracing::warn!("Ignoring malformed lastSync value: {raw}");
                    None
                },
                Some,
            ),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!("Failed to read lastSync: {error}");
                None
            }
        }
    }

    fn finish(outcome: Result<()>, operation: &str) {
        if let Err(error) = outcome {
            tracing::warn!(operation, "Failed to persist local replica: {error}");
        }
    }
}

/// Locked, in-memory view of the replica used to stage mutations
pub struct ReplicaBatch<'a, S> {
    replica: &'a LocalReplica<S>,
    _guard: MutexGuard<'a, ()>,
    records: BTreeMap<ImageId, LocalRecord>,
    readable: bool,
    dirty: bool,
    now: i64,
}

impl<S: KeyValueStore> ReplicaBatch<'_, S> {
    /// Staged records, ordered by id
    pub fn records(&self) -> impl Iterator<Item = &LocalRecord> {
        self.records.values()
    }

    /// Look up a staged record
    pub fn get(&self, id: ImageId) -> Option<&LocalRecord> {
        self.records.get(&id)
    }

    /// Wire summaries of the staged records
    pub fn summaries(&self) -> Vec<SyncSummary> {
        self.records().map(SyncSummary::from).collect()
    }

    /// Insert or overwrite `image` as synced.
    ///
    /// `last_modified` never moves backwards and never trails the image's
    /// `updated_at`, so an adopted version is not offered again next round.
    pub fn upsert(&mut self, image: ImageRecord) {
        let floor = self.now.max(image.updated_at);
        let last_modified = self
            .records
            .get(&image.id)
            .map_or(floor, |existing| existing.last_modified.max(floor));

        self.records.insert(
            image.id,
            LocalRecord {
                image,
                last_modified,
                sync_status: SyncStatus::Synced,
            },
        );
        self.dirty = true;
    }

    /// Adopt a remote version unless the local copy is pending.
    ///
    /// A pending record that the remote version is newer than stays local and
    /// advances `last_modified` to the beaten `updated_at`, like a conflict
    /// reported by the comparator.
    pub fn adopt_remote(&mut self, image: ImageRecord) -> Adoption {
        let Some(record) = self
            .records
            .get_mut(&image.id)
            .filter(|record| record.is_pending())
        else {
            self.upsert(image);
            return Adoption::Adopted;
        };

        if image.updated_at <= record.last_modified {
            tracing::debug!(id = %image.id, "Keeping pending local edit over remote version");
            return Adoption::KeptLocal;
        }

        let conflict = ConflictEntry {
            id: image.id,
            remote_updated_at: image.updated_at,
            local_last_modified: record.last_modified,
        };
        record.touch(image.updated_at);
        self.dirty = true;
        Adoption::Conflict(conflict)
    }

    /// Flag a record pending; returns whether it exists
    pub fn mark_pending(&mut self, id: ImageId) -> bool {
        let now = self.now;
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.sync_status = SyncStatus::Pending;
        record.touch(now);
        self.dirty = true;
        true
    }

    /// Change a record's filename and flag it pending; returns whether it exists
    pub fn rename(&mut self, id: ImageId, filename: &str) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.image.filename = filename.to_string();
        self.mark_pending(id)
    }

    /// Delete a record; returns whether it existed
    pub fn remove(&mut self, id: ImageId) -> bool {
        let removed = self.records.remove(&id).is_some();
        self.dirty |= removed;
        removed
    }

    /// Delete a record the remote side dropped, unless it is pending.
    ///
    /// Returns whether the record was removed.
    pub fn drop_remote(&mut self, id: ImageId) -> bool {
        if self.records.get(&id).is_some_and(LocalRecord::is_pending) {
            tracing::debug!(id = %id, "Keeping pending record absent from remote");
            return false;
        }
        self.remove(id)
    }

    /// Commit every pending record as synced (local wins).
    ///
    /// Records named in `conflicts` advance `last_modified` to the remote
    /// timestamp they won against, so the next round sees them as current.
    /// Returns the number of records committed.
    pub fn commit_pending(&mut self, conflicts: &[ConflictEntry]) -> usize {
        let won_against: HashMap<ImageId, i64> = conflicts
            .iter()
            .map(|conflict| (conflict.id, conflict.remote_updated_at))
            .collect();

        let mut committed = 0;
        for record in self.records.values_mut().filter(|record| record.is_pending()) {
            record.sync_status = SyncStatus::Synced;
            if let Some(remote_updated_at) = won_against.get(&record.id()) {
                record.touch(*remote_updated_at);
            }
            committed += 1;
        }
        self.dirty |= committed > 0;
        committed
    }

    /// Persist staged records and, when given, a new `lastSync` marker.
    ///
    /// Refuses to write when the replica could not be read, so a transient
    /// storage failure never clobbers persisted records.
    pub async fn commit(self, last_sync: Option<i64>) -> Result<()> {
        if !self.dirty && last_sync.is_none() {
            return Ok(());
        }
        if !self.readable {
            return Err(Error::Database(
                "local replica could not be read; refusing to overwrite it".to_string(),
            ));
        }

        let store = &self.replica.store;
        if self.dirty {
            let records: Vec<&LocalRecord> = self.records.values().collect();
            store
                .set(IMAGES_KEY, &serde_json::to_string(&records)?)
                .await?;
        }
        if let Some(timestamp) = last_sync {
            store.set(LAST_SYNC_KEY, &timestamp.to_string()).await?;
        }
        Ok(())
    }

    /// Clock reading taken when the batch was opened
    pub const fn now(&self) -> i64 {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;

    fn fixed_clock() -> i64 {
        1_000
    }

    fn image(id: i64, updated_at: i64) -> ImageRecord {
        ImageRecord {
            id: ImageId::new(id),
            filename: format!("img-{id}.png"),
            size: 10,
            mime_type: "image/png".to_string(),
            created_at: 1,
            updated_at,
        }
    }

    fn replica() -> LocalReplica<MemoryKeyValueStore> {
        LocalReplica::with_clock(MemoryKeyValueStore::new(), fixed_clock)
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::Io(std::io::Error::other("disk unavailable")))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk unavailable")))
        }

        async fn remove(&self, _key: &str) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk unavailable")))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_all_on_empty_store_is_empty() {
        assert!(replica().load_all().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_stores_synced_record() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;

        let records = replica.load_all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sync_status, SyncStatus::Synced);
        assert_eq!(records[0].last_modified, 1_000);
        assert_eq!(records[0].image, image(1, 10));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_overwrites_without_duplicates() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;
        let mut renamed = image(1, 20);
        renamed.filename = "renamed.png".to_string();
        replica.upsert(renamed).await;

        let records = replica.load_all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].image.filename, "renamed.png");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upsert_never_trails_remote_timestamp() {
        let replica = replica();
        replica.upsert(image(1, 5_000)).await;
        assert_eq!(replica.load_all().await[0].last_modified, 5_000);

        // Older remote version and clock: the previous value is kept
        replica.upsert(image(1, 20)).await;
        assert_eq!(replica.load_all().await[0].last_modified, 5_000);

        replica.upsert(image(2, 20)).await;
        assert_eq!(replica.load_all().await[1].last_modified, 1_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_pending_and_absent_ids() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;

        assert!(replica.mark_pending(ImageId::new(1)).await);
        assert!(!replica.mark_pending(ImageId::new(2)).await);

        let records = replica.load_all().await;
        assert_eq!(records.len(), 1);
        assert!(records[0].is_pending());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_marks_pending() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;

        assert!(replica.rename(ImageId::new(1), " beach.png ").await.unwrap());
        assert!(!replica.rename(ImageId::new(9), "x.png").await.unwrap());
        assert!(replica.rename(ImageId::new(1), "  ").await.is_err());

        let record = &replica.load_all().await[0];
        assert_eq!(record.image.filename, "beach.png");
        assert!(record.is_pending());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_is_idempotent() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;

        assert!(replica.remove(ImageId::new(1)).await);
        assert!(!replica.remove(ImageId::new(1)).await);
        assert!(replica.load_all().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_summary_counts_states() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;
        replica.upsert(image(2, 10)).await;
        replica.upsert(image(3, 10)).await;
        replica.mark_pending(ImageId::new(2)).await;

        let summary = replica.status_summary().await;
        assert_eq!(
            summary,
            StatusSummary {
                pending: 1,
                conflicts: 0,
                total: 3,
                last_sync: None,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_records_last_sync() {
        let replica = replica();
        let batch = replica.begin().await;
        batch.commit(Some(42)).await.unwrap();

        assert_eq!(replica.last_sync().await, Some(42));
        assert_eq!(replica.status_summary().await.last_sync, Some(42));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_entries_are_filtered_on_load() {
        let store = MemoryKeyValueStore::new();
        store
            .set(
                IMAGES_KEY,
                r#"[
                    {"id": 1, "filename": "a.png", "size": 1, "mimeType": "image/png",
                     "createdAt": 1, "updatedAt": 2, "lastModified": 3, "syncStatus": "conflict"},
                    {"filename": "no-id.png"}
                ]"#,
            )
            .await
            .unwrap();
        let replica = LocalReplica::with_clock(store, fixed_clock);

        let records = replica.load_all().await;
        assert_eq!(records.len(), 1);
        assert_eq!(replica.status_summary().await.conflicts, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupted_payload_reads_as_empty() {
        let store = MemoryKeyValueStore::new();
        store.set(IMAGES_KEY, "{not json").await.unwrap();
        store.set(LAST_SYNC_KEY, "yesterday").await.unwrap();
        let replica = LocalReplica::with_clock(store, fixed_clock);

        assert!(replica.load_all().await.is_empty());
        assert_eq!(replica.last_sync().await, None);

        replica.upsert(image(1, 10)).await;
        assert_eq!(replica.load_all().await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn storage_failures_degrade_to_defaults() {
        let replica = LocalReplica::with_clock(BrokenStore, fixed_clock);

        assert!(replica.load_all().await.is_empty());
        replica.upsert(image(1, 10)).await;
        assert!(!replica.mark_pending(ImageId::new(1)).await);
        assert_eq!(replica.status_summary().await, StatusSummary::default());

        let mut batch = replica.begin().await;
        batch.upsert(image(2, 10));
        assert!(batch.commit(None).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn batch_keeps_pending_records_from_remote_changes() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;
        replica.upsert(image(2, 10)).await;
        replica.mark_pending(ImageId::new(1)).await;
        replica.mark_pending(ImageId::new(2)).await;

        let mut batch = replica.begin().await;
        assert_eq!(batch.adopt_remote(image(2, 500)), Adoption::KeptLocal);
        assert!(!batch.drop_remote(ImageId::new(2)));
        assert_eq!(batch.get(ImageId::new(2)).unwrap().image.updated_at, 10);
        assert_eq!(batch.get(ImageId::new(2)).unwrap().last_modified, 1_000);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_record_beaten_by_newer_remote_reports_conflict() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;
        replica.mark_pending(ImageId::new(1)).await;

        let mut batch = replica.begin().await;
        assert_eq!(
            batch.adopt_remote(image(1, 5_000)),
            Adoption::Conflict(ConflictEntry {
                id: ImageId::new(1),
                remote_updated_at: 5_000,
                local_last_modified: 1_000,
            })
        );
        let record = batch.get(ImageId::new(1)).unwrap();
        assert_eq!(record.image.updated_at, 10);
        assert_eq!(record.last_modified, 5_000);
        assert!(record.is_pending());

        assert_eq!(batch.adopt_remote(image(3, 20)), Adoption::Adopted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commit_pending_advances_conflicted_records() {
        let replica = replica();
        replica.upsert(image(1, 10)).await;
        replica.upsert(image(2, 10)).await;
        replica.mark_pending(ImageId::new(1)).await;
        replica.mark_pending(ImageId::new(2)).await;

        let mut batch = replica.begin().await;
        let committed = batch.commit_pending(&[ConflictEntry {
            id: ImageId::new(2),
            remote_updated_at: 9_000,
            local_last_modified: 1_000,
        }]);
        batch.commit(None).await.unwrap();

        assert_eq!(committed, 2);
        let records = replica.load_all().await;
        assert!(records.iter().all(|record| record.sync_status == SyncStatus::Synced));
        assert_eq!(records[0].last_modified, 1_000);
        assert_eq!(records[1].last_modified, 9_000);
    }
}
