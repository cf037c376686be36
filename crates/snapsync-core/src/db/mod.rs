//! Database layer for snapsync

mod connection;
mod image_repository;
mod kv_store;
mod migrations;

pub use connection::Database;
pub use image_repository::{ImageRepository, LibSqlImageRepository};
pub use kv_store::{KeyValueStore, LibSqlKeyValueStore, MemoryKeyValueStore};
pub use migrations::Schema;
