//! Storage layer for studysync.
//!
//! `SQLite` persistence for the three keyed blobs of the sync subsystem:
//! - Offline action queue
//! - Sync configuration
//! - Temp-id mapping table

mod database;
mod kv;
mod migrations;

pub use database::Database;
pub use kv::{KeyValueStore, MemoryStore, SqliteStore, ID_MAPPINGS_KEY, QUEUE_KEY, SYNC_CONFIG_KEY};
