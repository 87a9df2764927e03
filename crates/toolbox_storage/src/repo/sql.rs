//! SQL statement builders for one record table.
//!
//! # Invariants
//! - Every table/column name is validated as a plain identifier and quoted
//!   before it reaches SQL text.
//! - Row values are always bound, never interpolated.
//! - Scans are ordered by the key column ascending.

use crate::db::{DbError, DbResult};
use crate::model::record::Record;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Validates and double-quotes one SQL identifier.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    if !IDENTIFIER_RE.is_match(name) {
        return Err(DbError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{name}\""))
}

/// Prebuilt statements for one `Record` type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TableSql {
    pub table: &'static str,
    pub select: String,
    pub order_by: String,
    pub get_by_key: String,
    pub upsert: String,
    pub insert_if_absent: String,
    pub insert_without_key: String,
    pub delete_by_key: String,
    pub delete_all: String,
    pub count: String,
}

impl TableSql {
    pub fn for_record<R: Record>() -> DbResult<Self> {
        let table = quote_identifier(R::TABLE)?;
        let key = quote_identifier(R::KEY_COLUMN)?;
        let columns = R::COLUMNS
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<DbResult<Vec<_>>>()?;

        let mut all_columns = Vec::with_capacity(columns.len() + 1);
        all_columns.push(key.clone());
        all_columns.extend(columns.iter().cloned());

        let select = format!("SELECT {} FROM {table}", all_columns.join(", "));
        let keyed_insert = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            all_columns.join(", "),
            placeholders(all_columns.len())
        );

        let upsert = if columns.is_empty() {
            format!("{keyed_insert} ON CONFLICT({key}) DO NOTHING;")
        } else {
            let assignments = columns
                .iter()
                .map(|column| format!("{column} = excluded.{column}"))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{keyed_insert} ON CONFLICT({key}) DO UPDATE SET {assignments};")
        };

        let insert_without_key = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES;")
        } else {
            format!(
                "INSERT INTO {table} ({}) VALUES ({});",
                columns.join(", "),
                placeholders(columns.len())
            )
        };

        Ok(Self {
            table: R::TABLE,
            get_by_key: format!("{select} WHERE {key} = ?1;"),
            order_by: format!(" ORDER BY {key} ASC"),
            insert_if_absent: format!("{keyed_insert} ON CONFLICT({key}) DO NOTHING;"),
            upsert,
            insert_without_key,
            delete_by_key: format!("DELETE FROM {table} WHERE {key} = ?1;"),
            delete_all: format!("DELETE FROM {table};"),
            count: format!("SELECT COUNT(*) FROM {table};"),
            select,
        })
    }

    pub fn select_all(&self) -> String {
        format!("{}{};", self.select, self.order_by)
    }

    pub fn select_where(&self, clause: &str) -> String {
        format!("{} WHERE {clause}{};", self.select, self.order_by)
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}
