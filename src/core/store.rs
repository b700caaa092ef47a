//! Store handle for the roadmap state directory.
//!
//! A store is a directory holding the SQLite database, the audit event log,
//! and the optional `roadmap.toml` configuration.

use crate::core::broker::DbBroker;
use crate::core::schemas;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Store handle representing a roadmap state directory.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory
    pub root: PathBuf,
    /// How long a connection waits on a locked database before failing
    pub busy_timeout: Duration,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.root.join(schemas::ROADMAP_DB_NAME)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(schemas::ROADMAP_EVENTS_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(schemas::ROADMAP_CONFIG_NAME)
    }

    pub fn broker(&self) -> DbBroker {
        DbBroker::new(&self.db_path(), &self.events_path(), self.busy_timeout)
    }
}

/// Walks up from `start_dir` looking for a `.roadmap` directory.
pub fn find_store_root(start_dir: &Path) -> Option<PathBuf> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        let candidate = current_dir.join(".roadmap");
        if candidate.is_dir() {
            return Some(candidate);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}
