//! Vote ledger.
//!
//! Owns two facts that must move together:
//! - at most one `votes` row per (feature, voter), enforced by `UNIQUE(feature_id, voter)`;
//! - `features.votes` equals the number of `votes` rows for that feature.
//!
//! Both are only ever written inside [`VoteLedger::toggle_vote`], in one
//! IMMEDIATE transaction, using `votes = votes ± 1` in SQL rather than a value
//! computed in Rust. Everything else here is read-only.

use crate::core::broker::DbBroker;
use crate::core::error::RoadmapError;
use crate::core::store::Store;
use crate::core::time::now_epoch_z;
use crate::services::features::{FeatureId, feature_exists, not_found};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// Stays well under SQLite's bound-parameter limit, with room for the voter.
const BATCH_CHUNK: usize = 500;

/// Outcome of one toggle, reflecting the committed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteToggle {
    pub vote_added: bool,
    pub vote_count: i64,
}

#[derive(Debug, Clone)]
pub struct VoteLedger {
    broker: DbBroker,
}

impl VoteLedger {
    pub fn new(store: &Store) -> Self {
        Self {
            broker: store.broker(),
        }
    }

    /// Adds the voter's vote if absent, removes it if present.
    ///
    /// Not idempotent: calling twice restores the original state. Fails with
    /// `NotFound` when the feature does not exist (nothing is written) and with
    /// `Conflict` when the store rejects any step; either way the transaction
    /// is rolled back in full. Never retried here.
    pub fn toggle_vote(&self, feature_id: FeatureId, voter: &str) -> Result<VoteToggle, RoadmapError> {
        let ts = now_epoch_z();
        self.broker.with_tx(voter, "votes.toggle", |tx| {
            if !feature_exists(tx, feature_id)? {
                return Err(not_found(feature_id));
            }

            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM votes WHERE feature_id = ?1 AND voter = ?2",
                    params![feature_id, voter],
                    |row| row.get(0),
                )
                .optional()?;

            let vote_added = match existing {
                Some(vote_id) => {
                    tx.execute("DELETE FROM votes WHERE id = ?1", params![vote_id])?;
                    tx.execute(
                        "UPDATE features SET votes = votes - 1 WHERE id = ?1",
                        params![feature_id],
                    )?;
                    false
                }
                None => {
                    tx.execute(
                        "INSERT INTO votes(feature_id, voter, created_at, updated_at) VALUES(?1, ?2, ?3, ?4)",
                        params![feature_id, voter, ts, ts],
                    )?;
                    tx.execute(
                        "UPDATE features SET votes = votes + 1 WHERE id = ?1",
                        params![feature_id],
                    )?;
                    true
                }
            };

            let vote_count: i64 = tx.query_row(
                "SELECT votes FROM features WHERE id = ?1",
                params![feature_id],
                |row| row.get(0),
            )?;

            Ok(VoteToggle {
                vote_added,
                vote_count,
            })
        })
    }

    /// Current counter value. Unknown features read as 0.
    pub fn get_vote_count(&self, feature_id: FeatureId) -> Result<i64, RoadmapError> {
        self.broker.with_conn("roadmap", "votes.count", |conn| {
            let votes: Option<i64> = conn
                .query_row(
                    "SELECT votes FROM features WHERE id = ?1",
                    params![feature_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(votes.unwrap_or(0))
        })
    }

    /// Counter values for every requested id; unknown ids map to 0.
    /// An empty request returns an empty map without touching the store.
    pub fn get_vote_counts(&self, feature_ids: &[FeatureId]) -> Result<BTreeMap<FeatureId, i64>, RoadmapError> {
        let ids: BTreeSet<FeatureId> = feature_ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.broker.with_conn("roadmap", "votes.counts", |conn| {
            let mut out: BTreeMap<FeatureId, i64> = ids.iter().map(|id| (*id, 0)).collect();
            let ids: Vec<FeatureId> = ids.into_iter().collect();
            for chunk in ids.chunks(BATCH_CHUNK) {
                let sql = format!(
                    "SELECT id, votes FROM features WHERE id IN ({})",
                    placeholders(chunk.len(), 1)
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((row.get::<_, FeatureId>(0)?, row.get::<_, i64>(1)?))
                })?;
                for r in rows {
                    let (id, votes) = r?;
                    out.insert(id, votes);
                }
            }
            Ok(out)
        })
    }

    pub fn has_voted(&self, feature_id: FeatureId, voter: &str) -> Result<bool, RoadmapError> {
        self.broker
            .with_conn(voter, "votes.has_voted", |conn| vote_exists(conn, feature_id, voter))
    }

    /// Per-id "has this voter voted" flags. Empty input skips the store.
    pub fn has_voted_batch(
        &self,
        feature_ids: &[FeatureId],
        voter: &str,
    ) -> Result<BTreeMap<FeatureId, bool>, RoadmapError> {
        let ids: BTreeSet<FeatureId> = feature_ids.iter().copied().collect();
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        self.broker.with_conn(voter, "votes.has_voted_batch", |conn| {
            let mut out: BTreeMap<FeatureId, bool> = ids.iter().map(|id| (*id, false)).collect();
            let ids: Vec<FeatureId> = ids.into_iter().collect();
            for chunk in ids.chunks(BATCH_CHUNK) {
                let sql = format!(
                    "SELECT feature_id FROM votes WHERE voter = ?1 AND feature_id IN ({})",
                    placeholders(chunk.len(), 2)
                );
                let mut stmt = conn.prepare(&sql)?;
                let mut bound: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(chunk.len() + 1);
                bound.push(&voter);
                for id in chunk {
                    bound.push(id);
                }
                let rows = stmt.query_map(bound.as_slice(), |row| row.get::<_, FeatureId>(0))?;
                for r in rows {
                    out.insert(r?, true);
                }
            }
            Ok(out)
        })
    }

    /// Recounts vote rows and compares them with each feature's counter.
    /// Returns the features whose counter disagrees, as (id, counter, rows).
    pub fn audit_counters(&self) -> Result<Vec<(FeatureId, i64, i64)>, RoadmapError> {
        self.broker.with_conn("roadmap", "votes.audit", |conn| {
            let mut stmt = conn.prepare(
                "SELECT f.id, f.votes, COUNT(v.id)
                 FROM features f LEFT JOIN votes v ON v.feature_id = f.id
                 GROUP BY f.id, f.votes
                 HAVING f.votes != COUNT(v.id)
                 ORDER BY f.id",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}

fn vote_exists(conn: &Connection, feature_id: FeatureId, voter: &str) -> Result<bool, RoadmapError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM votes WHERE feature_id = ?1 AND voter = ?2",
            params![feature_id, voter],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// `?start, ?start+1, ...` for `count` parameters.
fn placeholders(count: usize, start: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
