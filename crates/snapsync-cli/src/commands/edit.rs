//! Local-only edits: touch, rename, forget.
//!
//! An id missing from the replica is a no-op that only logs a warning.

use snapsync_core::ImageId;

use crate::commands::common::CliReplica;
use crate::error::CliError;

pub async fn run_touch(replica: &CliReplica, id: ImageId) -> Result<(), CliError> {
    if replica.mark_pending(id).await {
        println!("Marked image {id} as pending");
    } else {
        tracing::warn!(id = %id, "Image is not in the local replica; nothing to touch");
    }
    Ok(())
}

pub async fn run_rename(replica: &CliReplica, id: ImageId, filename: &str) -> Result<(), CliError> {
    if replica.rename(id, filename).await? {
        println!("Renamed image {id} to {}", filename.trim());
    } else {
        tracing::warn!(id = %id, "Image is not in the local replica; nothing to rename");
    }
    Ok(())
}

pub async fn run_forget(replica: &CliReplica, id: ImageId) -> Result<(), CliError> {
    if replica.remove(id).await {
        println!("Removed image {id} from the local replica");
    } else {
        tracing::warn!(id = %id, "Image is not in the local replica; nothing to forget");
    }
    Ok(())
}
