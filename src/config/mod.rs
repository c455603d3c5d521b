//! Configuration management for studysync.
//!
//! This module handles loading and saving configuration from `~/.studysync/`.

mod paths;
mod settings;

pub use paths::{Paths, HOME_ENV};
pub use settings::{CircuitConfig, Config, LoggingConfig, RemoteConfig};
