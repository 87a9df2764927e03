//! Record contract for storage-eligible types.
//!
//! # Responsibility
//! - Define the capability set a payload type implements to live in one table.
//! - Define key types the store can compare, bind and optionally assign.
//!
//! # Invariants
//! - `COLUMNS` lists non-key columns in the exact order `to_columns` returns.
//! - Column names stay stable across versions of a type.
//! - `id` is `None` only before the first successful save.

use crate::db::{DbError, DbResult};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, Value, ValueRef};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use uuid::Uuid;

/// Identity scalar of a record.
pub trait RecordKey: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Storage representation bound into statements.
    fn to_sql(&self) -> Value;

    /// Decodes a key from a stored column value.
    fn from_sql(value: ValueRef<'_>) -> FromSqlResult<Self>;

    /// Client-side identity for records saved without an id.
    fn generate() -> Option<Self> {
        None
    }

    /// Engine-assigned identity derived from the inserted rowid.
    fn from_rowid(_rowid: i64) -> Option<Self> {
        None
    }
}

impl RecordKey for Uuid {
    fn to_sql(&self) -> Value {
        Value::Text(self.to_string())
    }

    fn from_sql(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        Uuid::parse_str(text).map_err(|err| FromSqlError::Other(Box::new(err)))
    }

    fn generate() -> Option<Self> {
        Some(Uuid::new_v4())
    }
}

impl RecordKey for String {
    fn to_sql(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_sql(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value)
    }

    fn generate() -> Option<Self> {
        Some(Uuid::new_v4().to_string())
    }
}

impl RecordKey for i64 {
    fn to_sql(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_sql(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value)
    }

    fn from_rowid(rowid: i64) -> Option<Self> {
        Some(rowid)
    }
}

/// A type that maps to exactly one row of one table.
///
/// Equality is structural over every mapped field, `id` included. It is
/// used by callers and tests, never by the store itself.
pub trait Record: Clone + PartialEq + Send + 'static {
    type Key: RecordKey;

    /// Table name. Must be a plain SQL identifier.
    const TABLE: &'static str;
    /// Primary key column.
    const KEY_COLUMN: &'static str = "id";
    /// Non-key columns in bind order.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> Option<&Self::Key>;

    fn set_id(&mut self, id: Self::Key);

    /// Serializes non-key fields, one value per entry of `COLUMNS`.
    fn to_columns(&self) -> DbResult<Vec<Value>>;

    /// Deserializes one row selected with the key column followed by `COLUMNS`.
    fn from_row(row: &Row<'_>) -> DbResult<Self>;
}

/// Reads a nullable key column.
pub fn read_key<K: RecordKey>(row: &Row<'_>, column: &str) -> DbResult<Option<K>> {
    let value = row.get_ref(column)?;
    if matches!(value, ValueRef::Null) {
        return Ok(None);
    }
    K::from_sql(value)
        .map(Some)
        .map_err(|err| DbError::InvalidData(format!("invalid key in column `{column}`: {err}")))
}

/// Encodes a nested value as a JSON text column.
pub fn json_column<T: Serialize>(value: &T) -> DbResult<Value> {
    Ok(Value::Text(serde_json::to_string(value)?))
}

/// Decodes a JSON text column written by [`json_column`].
pub fn parse_json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> DbResult<T> {
    let text: String = row.get(column)?;
    Ok(serde_json::from_str(&text)?)
}

/// Maps a `bool` to the integer SQLite stores.
pub fn bool_column(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

/// Decodes an integer flag written by [`bool_column`].
pub fn parse_bool_column(row: &Row<'_>, column: &str) -> DbResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DbError::InvalidData(format!(
            "invalid flag value `{other}` in column `{column}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        bool_column, json_column, parse_bool_column, parse_json_column, read_key, RecordKey,
    };
    use crate::db::DbError;
    use rusqlite::types::{Value, ValueRef};
    use rusqlite::Connection;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Meta {
        tags: Vec<String>,
        pinned: bool,
    }

    #[test]
    fn uuid_key_is_stored_as_text() {
        let id = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
        assert_eq!(
            id.to_sql(),
            Value::Text("00000000-0000-4000-8000-000000000001".to_string())
        );
        let parsed =
            Uuid::from_sql(ValueRef::Text(b"00000000-0000-4000-8000-000000000001")).unwrap();
        assert_eq!(parsed, id);
        assert!(Uuid::from_sql(ValueRef::Text(b"not-a-uuid")).is_err());
    }

    #[test]
    fn key_assignment_strategies() {
        assert!(Uuid::generate().is_some());
        assert!(String::generate().is_some());
        assert_eq!(i64::generate(), None);
        assert_eq!(i64::from_rowid(7), Some(7));
        assert_eq!(Uuid::from_rowid(7), None);
    }

    #[test]
    fn column_helpers_decode_what_they_encode() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id TEXT, meta TEXT, flag INTEGER);")
            .unwrap();
        let meta = Meta {
            tags: vec!["work".to_string()],
            pinned: true,
        };
        conn.execute(
            "INSERT INTO t (id, meta, flag) VALUES (NULL, ?1, ?2);",
            [json_column(&meta).unwrap(), bool_column(true)],
        )
        .unwrap();

        let (key, decoded, flag) = conn
            .query_row("SELECT id, meta, flag FROM t;", [], |row| {
                Ok((
                    read_key::<String>(row, "id").unwrap(),
                    parse_json_column::<Meta>(row, "meta").unwrap(),
                    parse_bool_column(row, "flag").unwrap(),
                ))
            })
            .unwrap();

        assert_eq!(key, None);
        assert_eq!(decoded, meta);
        assert!(flag);
    }

    #[test]
    fn parse_bool_column_rejects_unknown_values() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 2 AS flag;", [], |row| {
                Ok(parse_bool_column(row, "flag"))
            })
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidData(_)));
    }
}
