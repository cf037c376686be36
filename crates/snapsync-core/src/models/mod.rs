//! Data models for snapsync

mod image;
mod local_record;
mod sync;

pub use image::{ImageId, ImageRecord, ImageUpdate, NewImage};
pub use local_record::{LocalRecord, SyncStatus};
pub use sync::{
    ConflictEntry, ReconciliationResult, StatusSummary, SyncRequest, SyncResult, SyncSummary,
};
