//! Typed repository layer over one record table.
//!
//! # Responsibility
//! - Define the blocking CRUD contract every record store offers.
//! - Map storage failures to the repository error taxonomy.
//!
//! # Invariants
//! - Every operation runs exactly one read or one write transaction.
//! - "Not found" is an absent result, never an error.
//! - A failed batch write leaves no row of the batch behind.

use crate::db::DbError;
use crate::model::record::Record;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod filter;
pub mod observer;
pub mod repository;
mod sql;

pub use filter::Filter;
pub use observer::ObservationError;
pub use repository::Repository;
pub use sql::quote_identifier;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository-level failure.
#[derive(Debug)]
pub enum RepoError {
    /// Store could not be created or opened at the requested location.
    StoreOpen(DbError),
    /// Operation attempted on a repository whose store failed to open.
    StoreUnavailable,
    /// I/O or decode error while reading.
    ReadFailed(DbError),
    /// I/O, constraint or serialization error while writing; the whole
    /// transaction was rolled back.
    WriteFailed(DbError),
    /// Background task running the operation did not complete.
    TaskFailed(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreOpen(err) => write!(f, "failed to open store: {err}"),
            Self::StoreUnavailable => write!(f, "store is unavailable"),
            Self::ReadFailed(err) => write!(f, "read failed: {err}"),
            Self::WriteFailed(err) => write!(f, "write failed: {err}"),
            Self::TaskFailed(message) => write!(f, "storage task failed: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StoreOpen(err) | Self::ReadFailed(err) | Self::WriteFailed(err) => Some(err),
            Self::StoreUnavailable | Self::TaskFailed(_) => None,
        }
    }
}

/// Blocking CRUD contract for one record type.
pub trait RecordStore<R: Record> {
    /// Upserts by key, assigning an id when the record has none.
    fn save(&self, item: &mut R) -> RepoResult<R::Key>;
    /// Inserts unless a row with the same key exists. Returns whether it inserted.
    fn save_if_absent(&self, item: &mut R) -> RepoResult<bool>;
    /// Applies `save_if_absent` to every item, in order, in one transaction.
    fn save_all(&self, items: &mut [R]) -> RepoResult<usize>;
    /// Runs a raw statement verbatim inside one transaction.
    fn execute(&self, sql: &str, args: &[Value]) -> RepoResult<()>;
    fn get(&self, key: &R::Key) -> RepoResult<Option<R>>;
    /// All rows ordered by key ascending.
    fn get_all(&self) -> RepoResult<Vec<R>>;
    /// Rows matching `filter`, ordered by key ascending.
    fn get_filtered(&self, filter: &Filter) -> RepoResult<Vec<R>>;
    fn delete(&self, key: &R::Key) -> RepoResult<bool>;
    fn delete_all(&self) -> RepoResult<usize>;
    fn count(&self) -> RepoResult<u64>;
}
