use crate::core::db;
use crate::core::error::RoadmapError;
use crate::core::time;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The DB Broker is the single path to the roadmap database.
///
/// Every call opens its own connection; there is no in-process lock. Writers
/// are serialized by SQLite itself (`BEGIN IMMEDIATE` plus the busy timeout),
/// and each operation appends one audit event to the JSONL log.
#[derive(Debug, Clone)]
pub struct DbBroker {
    db_path: PathBuf,
    audit_log_path: PathBuf,
    busy_timeout: Duration,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

impl DbBroker {
    pub fn new(db_path: &Path, audit_log_path: &Path, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            audit_log_path: audit_log_path.to_path_buf(),
            busy_timeout,
        }
    }

    /// Execute a read or single-statement closure on a fresh connection.
    pub fn with_conn<F, R>(&self, actor: &str, op: &str, f: F) -> Result<R, RoadmapError>
    where
        F: FnOnce(&Connection) -> Result<R, RoadmapError>,
    {
        let result = db::db_connect(&self.db_path, self.busy_timeout)
            .and_then(|conn| f(&conn))
            .map_err(|e| e.in_op(op));
        self.record(actor, op, &result);
        result
    }

    /// Execute a closure inside an IMMEDIATE transaction.
    ///
    /// The transaction commits only if the closure returns `Ok` and the commit
    /// itself succeeds. Any error drops the `Transaction`, which rolls back.
    pub fn with_tx<F, R>(&self, actor: &str, op: &str, f: F) -> Result<R, RoadmapError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, RoadmapError>,
    {
        let result = self.run_tx(f).map_err(|e| e.in_op(op));
        self.record(actor, op, &result);
        result
    }

    fn run_tx<F, R>(&self, f: F) -> Result<R, RoadmapError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<R, RoadmapError>,
    {
        let mut conn = db::db_connect(&self.db_path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // Audit failures never change the outcome of an operation that already
    // committed; they are reported on stderr instead.
    fn record<R>(&self, actor: &str, op: &str, result: &Result<R, RoadmapError>) {
        let (status, detail) = match result {
            Ok(_) => ("success", None),
            Err(e) => ("error", Some(e.to_string())),
        };
        if let Err(e) = self.log_event(actor, op, status, detail) {
            eprintln!("roadmap: failed to append audit event for {op}: {e}");
        }
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        status: &str,
        detail: Option<String>,
    ) -> Result<(), RoadmapError> {
        let ev = BrokerEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            db_id: self
                .db_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            status: status.to_string(),
            detail,
        };

        let mut line = serde_json::to_string(&ev)?;
        line.push('\n');
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)?;
        // One write per event keeps concurrent appends from interleaving.
        f.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Reads the audit log back, skipping lines that fail to parse.
pub fn read_events(audit_log_path: &Path) -> Result<Vec<BrokerEvent>, RoadmapError> {
    if !audit_log_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(audit_log_path)?;
    Ok(content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
