//! snapsync-core - Core library for snapsync
//!
//! This crate contains the image models, the local replica, the remote
//! comparator, and the sync coordinator shared by the CLI and the API server.

pub mod comparator;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod replica;
pub mod transport;
pub mod util;
pub mod wire;

pub use comparator::compare;
pub use coordinator::SyncCoordinator;
pub use error::{Error, Result};
pub use models::{ImageId, ImageRecord, LocalRecord, SyncStatus};
pub use replica::{Adoption, LocalReplica};
