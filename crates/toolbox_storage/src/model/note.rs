//! Default note payload backing the ephemeral schema.

use crate::db::DbResult;
use crate::model::record::{read_key, Record};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal note row stored in the `NoteStorage` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteStorage {
    /// Assigned by the store on first save when absent.
    pub id: Option<Uuid>,
    pub title: String,
}

impl NoteStorage {
    /// Creates an unsaved note. The store assigns its id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
        }
    }

    /// Creates a note with a caller-provided id.
    pub fn with_id(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: title.into(),
        }
    }
}

impl Record for NoteStorage {
    type Key = Uuid;

    const TABLE: &'static str = "NoteStorage";
    const COLUMNS: &'static [&'static str] = &["title"];

    fn id(&self) -> Option<&Uuid> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn to_columns(&self) -> DbResult<Vec<Value>> {
        Ok(vec![Value::Text(self.title.clone())])
    }

    fn from_row(row: &Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: read_key(row, Self::KEY_COLUMN)?,
            // Bootstrap schema leaves `title` nullable.
            title: row.get::<_, Option<String>>("title")?.unwrap_or_default(),
        })
    }
}
