//! Command implementations for studysync.
//!
//! Every command opens the local store, builds the [`SyncManager`], and
//! returns the text to print.

mod queue;
mod run;
mod settings;

pub use queue::{add, clear, list, remove, resolve, retry, status};
pub use run::run;
pub use settings::{settings, SettingsChange};

use std::sync::Arc;

use crate::config::{Config, Paths};
use crate::error::SyncError;
use crate::storage::{Database, SqliteStore};
use crate::sync::{HttpMutationApi, LogInvalidator, ManagerConfig, SyncManager};

/// Everything a command needs.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub manager: Arc<SyncManager>,
}

impl Context {
    /// Resolve the data directory and read `config.yaml` without touching
    /// the database, so logging can be set up before the queue is opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the
    /// configuration is invalid.
    pub fn load_config() -> Result<(Paths, Config), SyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        let config = Config::load_from_path(&paths.config_file)?;
        Ok((paths, config))
    }

    /// Open the store with an already loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or the HTTP client cannot be set up.
    pub fn with_config(paths: Paths, config: Config) -> Result<Self, SyncError> {
        let kv = Arc::new(SqliteStore::new(Database::open_at(&paths.database)?));
        let api = Arc::new(HttpMutationApi::new(&config.remote)?);
        let manager = SyncManager::new(
            kv,
            api,
            ManagerConfig {
                breaker: (&config.circuit).into(),
                timeout: config.remote.timeout(),
                cache: Arc::new(LogInvalidator),
            },
        )?;

        Ok(Self {
            paths,
            config,
            manager,
        })
    }
}
