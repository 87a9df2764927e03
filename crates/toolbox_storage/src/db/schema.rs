//! Default `NoteStorage` schema for ephemeral stores.
//!
//! # Invariants
//! - Every statement uses `IF NOT EXISTS`; applying the script twice is a no-op.
//! - `PRAGMA user_version` belongs to the caller and is never read or written here.

use crate::db::DbResult;
use rusqlite::Connection;

const DEFAULT_SCHEMA_SQL: &str = include_str!("default_schema.sql");

/// Creates the default `NoteStorage` table when it does not exist yet.
pub fn apply_default_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(DEFAULT_SCHEMA_SQL)?;
    Ok(())
}
