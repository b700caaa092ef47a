//! Database schema definitions for the roadmap store.
//!
//! A single SQLite database holds three tables:
//! 1. features: roadmap items with a denormalized `votes` counter.
//! 2. comments: append-only discussion per feature.
//! 3. votes: at most one row per (feature, voter).
//!
//! Comments and votes cascade when their feature is deleted, so
//! `PRAGMA foreign_keys=ON` must be set on every connection.

pub const ROADMAP_DB_NAME: &str = "roadmap.db";
pub const ROADMAP_EVENTS_NAME: &str = "roadmap.events.jsonl";
pub const ROADMAP_CONFIG_NAME: &str = "roadmap.toml";

pub const FEATURES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS features (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Suggested'
            CHECK(status IN ('Suggested', 'Planned', 'InProgress', 'Completed', 'Declined')),
        votes INTEGER NOT NULL DEFAULT 0 CHECK(votes >= 0),
        author TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const COMMENTS_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feature_id INTEGER NOT NULL,
        text TEXT NOT NULL,
        author TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(feature_id) REFERENCES features(id) ON DELETE CASCADE
    )
";
pub const COMMENTS_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_comments_feature ON comments(feature_id)";

pub const VOTES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        feature_id INTEGER NOT NULL,
        voter TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(feature_id, voter),
        FOREIGN KEY(feature_id) REFERENCES features(id) ON DELETE CASCADE
    )
";
pub const VOTES_SCHEMA_VOTER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_votes_voter ON votes(voter)";

/// All schema statements in creation order.
pub fn all_statements() -> [&'static str; 5] {
    [
        FEATURES_SCHEMA,
        COMMENTS_SCHEMA,
        COMMENTS_SCHEMA_INDEX,
        VOTES_SCHEMA,
        VOTES_SCHEMA_VOTER_INDEX,
    ]
}
