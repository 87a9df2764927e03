//! Engine-native predicate used by `get_filtered`.
//!
//! A [`Filter`] is a SQLite `WHERE` fragment with anonymous `?` placeholders
//! plus the values bound to them, in order. Builders validate column names;
//! [`Filter::sql`] passes its clause through untouched, so callers must keep
//! untrusted input in `args`.

use super::sql::quote_identifier;
use crate::db::DbResult;
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    clause: String,
    args: Vec<Value>,
}

impl Filter {
    /// Raw clause, e.g. `Filter::sql("length(title) > ?", [Value::Integer(3)])`.
    pub fn sql(clause: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            clause: clause.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn eq(column: &str, value: impl Into<Value>) -> DbResult<Self> {
        Self::compare(column, "=", value.into())
    }

    pub fn ne(column: &str, value: impl Into<Value>) -> DbResult<Self> {
        Self::compare(column, "<>", value.into())
    }

    pub fn like(column: &str, pattern: impl Into<String>) -> DbResult<Self> {
        Self::compare(column, "LIKE", Value::Text(pattern.into()))
    }

    pub fn is_null(column: &str) -> DbResult<Self> {
        Ok(Self::sql(format!("{} IS NULL", quote_identifier(column)?), []))
    }

    pub fn is_not_null(column: &str) -> DbResult<Self> {
        Ok(Self::sql(
            format!("{} IS NOT NULL", quote_identifier(column)?),
            [],
        ))
    }

    pub fn and(self, other: Filter) -> Self {
        self.combine("AND", other)
    }

    pub fn or(self, other: Filter) -> Self {
        self.combine("OR", other)
    }

    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn compare(column: &str, operator: &str, value: Value) -> DbResult<Self> {
        Ok(Self::sql(
            format!("{} {operator} ?", quote_identifier(column)?),
            [value],
        ))
    }

    fn combine(mut self, operator: &str, other: Filter) -> Self {
        self.clause = format!("({}) {operator} ({})", self.clause, other.clause);
        self.args.extend(other.args);
        self
    }
}
