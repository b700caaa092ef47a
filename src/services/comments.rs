use crate::core::config::LimitsConfig;
use crate::core::error::RoadmapError;
use crate::core::output::char_len;
use crate::core::store::Store;
use crate::core::time::now_epoch_z;
use crate::services::features::{FeatureId, feature_exists, not_found};
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "featureId")]
    pub feature_id: FeatureId,
    pub text: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(rename = "featureId")]
    pub feature_id: FeatureId,
    pub text: String,
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        feature_id: row.get(1)?,
        text: row.get(2)?,
        author: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn validate_comment_text(text: &str, limits: &LimitsConfig) -> Result<(), RoadmapError> {
    if text.trim().is_empty() {
        return Err(RoadmapError::InputError(
            "Comment text cannot be empty".to_string(),
        ));
    }
    if limits.max_comment_len > 0 && char_len(text) > limits.max_comment_len {
        return Err(RoadmapError::InputError(format!(
            "Comment cannot be longer than {} characters",
            limits.max_comment_len
        )));
    }
    Ok(())
}

/// Appends a comment. The feature check and the insert share one transaction
/// so a concurrent delete cannot leave an orphan behind.
pub fn add_comment(
    store: &Store,
    limits: &LimitsConfig,
    comment: &NewComment,
    author: &str,
) -> Result<Comment, RoadmapError> {
    validate_comment_text(&comment.text, limits)?;
    let ts = now_epoch_z();

    store.broker().with_tx(author, "comments.add", |tx| {
        if !feature_exists(tx, comment.feature_id)? {
            return Err(not_found(comment.feature_id));
        }
        tx.execute(
            "INSERT INTO comments(feature_id, text, author, created_at, updated_at)
             VALUES(?1, ?2, ?3, ?4, ?5)",
            params![comment.feature_id, comment.text, author, ts, ts],
        )?;
        let id = tx.last_insert_rowid();
        Ok(tx.query_row(
            "SELECT id, feature_id, text, author, created_at, updated_at FROM comments WHERE id = ?1",
            params![id],
            comment_from_row,
        )?)
    })
}

/// Comments in insertion order. An unknown feature simply has none.
pub fn comments_for_feature(store: &Store, feature_id: FeatureId) -> Result<Vec<Comment>, RoadmapError> {
    store.broker().with_conn("roadmap", "comments.list", |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, feature_id, text, author, created_at, updated_at
             FROM comments WHERE feature_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![feature_id], comment_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}
