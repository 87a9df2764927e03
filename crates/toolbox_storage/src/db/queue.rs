//! Serialized access to one SQLite connection.
//!
//! # Responsibility
//! - Own exactly one connection and hand it out for one read or one
//!   transaction at a time.
//! - Expose the `read` / `write` / `execute` primitives repositories build on.
//!
//! # Invariants
//! - `write` commits only when the closure returns `Ok`; any error rolls the
//!   whole transaction back.
//! - The connection is never handed out beyond the closure that borrows it.

use super::open::open_with_config;
use super::{DbResult, StoreLocation};
use crate::config::StoreConfig;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Connection queue bound to one backing store.
pub struct DbQueue {
    conn: Mutex<Connection>,
    location: StoreLocation,
}

impl DbQueue {
    /// Opens the store described by `config`.
    pub fn open(config: &StoreConfig) -> DbResult<Self> {
        let conn = open_with_config(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: config.store_location(),
        })
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Runs `f` against the connection outside of an explicit transaction.
    pub fn read<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` inside one immediate transaction.
    pub fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> DbResult<T>) -> DbResult<T> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Executes a raw statement verbatim inside one transaction.
    ///
    /// Without `args` the text may hold several `;`-separated statements.
    pub fn execute(&self, sql: &str, args: &[Value]) -> DbResult<()> {
        self.write(|tx| {
            if args.is_empty() {
                tx.execute_batch(sql)?;
            } else {
                tx.execute(sql, params_from_iter(args.iter()))?;
            }
            Ok(())
        })
    }

    // A panicking caller leaves no open transaction behind, so the
    // connection is still usable after poisoning.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
