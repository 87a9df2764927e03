//! SQLite storage bootstrap, connection queue and schema bootstrap.
//!
//! # Responsibility
//! - Open and configure SQLite connections for file or ephemeral stores.
//! - Serialize access to one connection through [`DbQueue`].
//! - Bootstrap the default note schema for ephemeral stores.
//!
//! # Invariants
//! - One [`DbQueue`] owns exactly one connection to one backing store.
//! - `PRAGMA user_version` is left to callers; the store never uses it.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

mod open;
mod queue;
pub mod schema;

pub use open::{open_store, open_store_in_memory};
pub use queue::DbQueue;

pub type DbResult<T> = Result<T, DbError>;

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Persistent database file.
    File(PathBuf),
    /// Private `:memory:` database scoped to one connection.
    Ephemeral,
}

impl StoreLocation {
    pub fn from_path(path: Option<impl AsRef<Path>>) -> Self {
        match path {
            Some(path) => Self::File(path.as_ref().to_path_buf()),
            None => Self::Ephemeral,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Self::Ephemeral)
    }

    /// Short label used in log events.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Ephemeral => "memory",
        }
    }
}

impl Display for StoreLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Ephemeral => write!(f, ":memory:"),
        }
    }
}

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Json(serde_json::Error),
    /// Table or column name is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// Persisted value cannot be decoded into the record type.
    InvalidData(String),
    /// Record has no id and its key type cannot be assigned by the store.
    MissingKey(&'static str),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "json column error: {err}"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingKey(table) => write!(
                f,
                "record for table `{table}` has no id and its key type cannot be store-assigned"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::InvalidIdentifier(_)
            | Self::InvalidData(_)
            | Self::MissingKey(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::StoreLocation;
    use std::path::{Path, PathBuf};

    #[test]
    fn location_from_missing_path_is_ephemeral() {
        let location = StoreLocation::from_path(None::<&Path>);
        assert!(location.is_ephemeral());
        assert_eq!(location.mode(), "memory");
        assert_eq!(location.to_string(), ":memory:");
    }

    #[test]
    fn location_from_path_is_file() {
        let location = StoreLocation::from_path(Some("/tmp/notes.sqlite3"));
        assert_eq!(
            location,
            StoreLocation::File(PathBuf::from("/tmp/notes.sqlite3"))
        );
        assert_eq!(location.mode(), "file");
    }
}
