use crate::core::error::RoadmapError;
use crate::core::schemas;
use crate::core::store::Store;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Opens a connection with WAL journaling and foreign keys enabled. Writers
/// that find the database locked wait up to `busy_timeout`.
pub fn db_connect(db_path: &Path, busy_timeout: Duration) -> Result<Connection, RoadmapError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

pub fn ensure_schema(conn: &Connection) -> Result<(), RoadmapError> {
    for statement in schemas::all_statements() {
        conn.execute(statement, [])?;
    }
    Ok(())
}

/// Creates the store directory and tables. Safe to call repeatedly.
pub fn initialize_roadmap_db(store: &Store) -> Result<(), RoadmapError> {
    fs::create_dir_all(&store.root)?;
    store
        .broker()
        .with_conn("roadmap", "roadmap.init", |conn| ensure_schema(conn))
}
