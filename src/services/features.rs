use crate::core::config::LimitsConfig;
use crate::core::error::RoadmapError;
use crate::core::output::char_len;
use crate::core::store::Store;
use crate::core::time::now_epoch_z;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned feature id. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(pub i64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FeatureId {
    type Err = RoadmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<i64>() {
            Ok(id) if id > 0 => Ok(FeatureId(id)),
            _ => Err(RoadmapError::InputError(format!(
                "invalid feature id: {:?}",
                s
            ))),
        }
    }
}

impl ToSql for FeatureId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for FeatureId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(FeatureId)
    }
}

/// Parses a comma separated id list such as `1,2,3`. Blank entries are skipped.
pub fn parse_feature_ids(raw: &str) -> Result<Vec<FeatureId>, RoadmapError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(FeatureId::from_str)
        .collect()
}

/// Closed set of roadmap states. Older data used `Won't Do` and `Released`;
/// those labels still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureStatus {
    Suggested,
    Planned,
    InProgress,
    #[serde(alias = "Released")]
    Completed,
    #[serde(alias = "Won't Do", alias = "WontDo")]
    Declined,
}

impl FeatureStatus {
    pub const ALL: [FeatureStatus; 5] = [
        FeatureStatus::Suggested,
        FeatureStatus::Planned,
        FeatureStatus::InProgress,
        FeatureStatus::Completed,
        FeatureStatus::Declined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureStatus::Suggested => "Suggested",
            FeatureStatus::Planned => "Planned",
            FeatureStatus::InProgress => "InProgress",
            FeatureStatus::Completed => "Completed",
            FeatureStatus::Declined => "Declined",
        }
    }

    /// Human-readable column title.
    pub fn label(&self) -> &'static str {
        match self {
            FeatureStatus::InProgress => "In Progress",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureStatus {
    type Err = RoadmapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Suggested" => Ok(FeatureStatus::Suggested),
            "Planned" => Ok(FeatureStatus::Planned),
            "InProgress" | "In Progress" => Ok(FeatureStatus::InProgress),
            "Completed" | "Released" => Ok(FeatureStatus::Completed),
            "Declined" | "Won't Do" | "WontDo" => Ok(FeatureStatus::Declined),
            other => Err(RoadmapError::InputError(format!(
                "Invalid status value {:?}. Must be one of: {}",
                other,
                FeatureStatus::ALL.map(|s| s.as_str()).join(", ")
            ))),
        }
    }
}

impl ToSql for FeatureStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for FeatureStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: RoadmapError| FromSqlError::Other(e.to_string().into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub title: String,
    pub description: String,
    pub status: FeatureStatus,
    pub votes: i64,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeature {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A board column: every feature in one status, most voted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub status: FeatureStatus,
    pub title: String,
    pub features: Vec<Feature>,
}

const FEATURE_COLUMNS: &str =
    "id, title, description, status, votes, author, created_at, updated_at";

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<Feature> {
    Ok(Feature {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: row.get(3)?,
        votes: row.get(4)?,
        author: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn fetch_feature(
    conn: &Connection,
    id: FeatureId,
) -> Result<Option<Feature>, RoadmapError> {
    let feature = conn
        .query_row(
            &format!("SELECT {FEATURE_COLUMNS} FROM features WHERE id = ?1"),
            params![id],
            feature_from_row,
        )
        .optional()?;
    Ok(feature)
}

pub(crate) fn feature_exists(conn: &Connection, id: FeatureId) -> Result<bool, RoadmapError> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM features WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn not_found(id: FeatureId) -> RoadmapError {
    RoadmapError::NotFound(format!("feature {} does not exist", id))
}

pub fn validate_new_feature(feature: &NewFeature, limits: &LimitsConfig) -> Result<(), RoadmapError> {
    if feature.title.trim().is_empty() || feature.description.trim().is_empty() {
        return Err(RoadmapError::InputError(
            "Missing required fields: title and description are required".to_string(),
        ));
    }
    if limits.max_title_len > 0 && char_len(&feature.title) > limits.max_title_len {
        return Err(RoadmapError::InputError(format!(
            "Title cannot be longer than {} characters",
            limits.max_title_len
        )));
    }
    Ok(())
}

/// Records a suggestion. New features always start as `Suggested` with no votes.
pub fn add_feature(
    store: &Store,
    limits: &LimitsConfig,
    feature: &NewFeature,
    author: &str,
) -> Result<Feature, RoadmapError> {
    validate_new_feature(feature, limits)?;
    let ts = now_epoch_z();

    store.broker().with_tx(author, "features.add", |tx| {
        tx.execute(
            "INSERT INTO features(title, description, status, votes, author, created_at, updated_at)
             VALUES(?1, ?2, ?3, 0, ?4, ?5, ?6)",
            params![
                feature.title.trim(),
                feature.description,
                FeatureStatus::Suggested,
                author,
                ts,
                ts
            ],
        )?;
        let id = FeatureId(tx.last_insert_rowid());
        fetch_feature(tx, id)?.ok_or_else(|| not_found(id))
    })
}

pub fn list_features(store: &Store) -> Result<Vec<Feature>, RoadmapError> {
    store.broker().with_conn("roadmap", "features.list", |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {FEATURE_COLUMNS} FROM features ORDER BY id"
        ))?;
        let rows = stmt.query_map([], feature_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub fn get_feature(store: &Store, id: FeatureId) -> Result<Feature, RoadmapError> {
    store
        .broker()
        .with_conn("roadmap", "features.get", |conn| {
            fetch_feature(conn, id)?.ok_or_else(|| not_found(id))
        })
}

/// Moves a feature to a new status. Permission checks happen at the caller.
pub fn update_feature_status(
    store: &Store,
    id: FeatureId,
    status: FeatureStatus,
    actor: &str,
) -> Result<Feature, RoadmapError> {
    let ts = now_epoch_z();
    store.broker().with_tx(actor, "features.status", |tx| {
        let changed = tx.execute(
            "UPDATE features SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status, ts],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        fetch_feature(tx, id)?.ok_or_else(|| not_found(id))
    })
}

/// Removes a feature together with its comments and votes.
pub fn delete_feature(store: &Store, id: FeatureId, actor: &str) -> Result<(), RoadmapError> {
    store.broker().with_tx(actor, "features.delete", |tx| {
        let changed = tx.execute("DELETE FROM features WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(not_found(id));
        }
        Ok(())
    })
}

/// Groups features into one column per status, in lifecycle order.
pub fn board(features: Vec<Feature>) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = FeatureStatus::ALL
        .iter()
        .map(|status| BoardColumn {
            status: *status,
            title: status.label().to_string(),
            features: Vec::new(),
        })
        .collect();
    for feature in features {
        if let Some(column) = columns.iter_mut().find(|c| c.status == feature.status) {
            column.features.push(feature);
        }
    }
    for column in &mut columns {
        column
            .features
            .sort_by(|a, b| b.votes.cmp(&a.votes).then(a.id.cmp(&b.id)));
    }
    columns
}
