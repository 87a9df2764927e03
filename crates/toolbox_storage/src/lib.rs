//! Generic local persistence client over embedded SQLite.
//!
//! A [`Repository`] stores one [`Record`] type in one table and offers
//! key-addressed CRUD, bulk insert-if-absent, filtered reads, raw SQL and a
//! live subscription to the full record set.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::StoreConfig;
pub use db::{DbError, DbResult, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::NoteStorage;
pub use model::record::{Record, RecordKey};
pub use repo::{Filter, ObservationError, RecordStore, RepoError, RepoResult, Repository};

/// Returns the crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
