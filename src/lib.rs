//! studysync - offline-first sync queue for a study planner
//!
//! Mutations made while the device is offline are persisted in a local
//! queue and replayed against the planner API once connectivity returns.
//! Replays are ordered by priority, retried with exponential backoff, and
//! guarded by a circuit breaker. Records created offline get temp ids that
//! are swapped for server ids as soon as their creation syncs.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::SyncError;
pub use sync::SyncManager;
