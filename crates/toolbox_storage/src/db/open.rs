//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by repository behavior.
//! - Bootstrap the default schema when the configuration asks for it.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - A connection is only returned after bootstrap fully succeeded.

use super::schema::apply_default_schema;
use super::{DbResult, StoreLocation};
use crate::config::StoreConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file, creating it when absent.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_store(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with_config(&StoreConfig::file(path.as_ref()))
}

/// Opens a fresh in-memory SQLite database with the default schema.
///
/// Every call returns an independent database.
pub fn open_store_in_memory() -> DbResult<Connection> {
    open_with_config(&StoreConfig::ephemeral())
}

pub(crate) fn open_with_config(config: &StoreConfig) -> DbResult<Connection> {
    let started_at = Instant::now();
    let location = config.store_location();
    let mode = location.mode();
    info!("event=db_open module=db status=start mode={mode}");

    let opened = match &location {
        StoreLocation::File(path) => Connection::open(path),
        StoreLocation::Ephemeral => Connection::open_in_memory(),
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &Connection, config: &StoreConfig) -> DbResult<()> {
    // Forces SQLite to touch the file so unwritable locations fail here.
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(config.busy_timeout())?;
    conn.query_row("PRAGMA schema_version;", [], |row| row.get::<_, i64>(0))?;
    if config.should_bootstrap() {
        apply_default_schema(conn)?;
    }
    Ok(())
}
