//! Client-side driver of one reconciliation round.
//!
//! Policy: local always wins. Pending edits are committed as synced at the end
//! of every successful round, even when the comparator flagged them as
//! conflicts; conflicts are counted for audit only.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::{SyncRequest, SyncResult};
use crate::replica::{Adoption, LocalReplica};
use crate::transport::SyncTransport;

/// Owns the replica handle and the transport used to reach the comparator
pub struct SyncCoordinator<S, T> {
    replica: Arc<LocalReplica<S>>,
    transport: T,
    in_flight: Mutex<()>,
}

impl<S: KeyValueStore, T: SyncTransport> SyncCoordinator<S, T> {
    pub fn new(replica: Arc<LocalReplica<S>>, transport: T) -> Self {
        Self {
            replica,
            transport,
            in_flight: Mutex::new(()),
        }
    }

    /// Replica shared with callers for local edits
    pub const fn replica(&self) -> &Arc<LocalReplica<S>> {
        &self.replica
    }

    /// Run one reconciliation round.
    ///
    /// A call made while another round is in flight is rejected. Transport
    /// failures abort the round before the replica is touched. Dropping the
    /// returned future before the response arrives leaves the replica as it
    /// was; callers that need the round to outlive them should spawn it.
    pub async fn run_sync(&self) -> SyncResult {
        let Ok(_round) = self.in_flight.try_lock() else {
            tracing::warn!("Rejected sync request while another round is in flight");
            return SyncResult::failed(Error::SyncInProgress.to_string());
        };

        match self.reconcile_round().await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!("Sync round aborted: {error}");
                SyncResult::failed(error.to_string())
            }
        }
    }

    async fn reconcile_round(&self) -> Result<SyncResult> {
        let request = SyncRequest {
            local_images: self.replica.begin().await.summaries(),
        };
        tracing::debug!(local = request.local_images.len(), "Starting sync round");

        let result = self.transport.reconcile(&request).await?;
        tracing::debug!(
            added_or_updated = result.added_or_updated.len(),
            removed = result.removed.len(),
            conflicts = result.conflicts.len(),
            "Received reconciliation result"
        );

        let mut batch = self.replica.begin().await;

        let mut downloaded = 0;
        let mut conflicts = result.conflicts;
        for image in result.added_or_updated {
            match batch.adopt_remote(image) {
                Adoption::Adopted => downloaded += 1,
                Adoption::KeptLocal => {}
                Adoption::Conflict(conflict) => conflicts.push(conflict),
            }
        }

        for id in result.removed {
            batch.drop_remote(id);
        }

        let uploaded = batch.commit_pending(&conflicts);
        for conflict in &conflicts {
            tracing::info!(
                id = %conflict.id,
                remote_updated_at = conflict.remote_updated_at,
                local_last_modified = conflict.local_last_modified,
                "Kept local edit over newer remote version"
            );
        }

        let completed_at = batch.now();
        batch.commit(Some(completed_at)).await.map_err(|error| {
            Error::Database(format!("failed to persist sync result: {error}"))
        })?;

        let conflicts = conflicts.len();
        tracing::info!(uploaded, downloaded, conflicts, "Sync round completed");
        Ok(SyncResult::completed(uploaded, downloaded, conflicts))
    }
}
