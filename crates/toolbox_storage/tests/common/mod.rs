#![allow(dead_code)]

use rusqlite::types::Value;
use rusqlite::Row;
use std::sync::mpsc::Receiver;
use std::time::Duration;
use toolbox_storage::model::record::{
    bool_column, json_column, parse_bool_column, parse_json_column, read_key,
};
use toolbox_storage::{DbResult, Record, RecordStore, Repository};

pub const WAIT: Duration = Duration::from_secs(5);

pub const TASKS_SCHEMA: &str = "CREATE TABLE tasks (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(title) > 0),
    done INTEGER NOT NULL DEFAULT 0,
    labels TEXT NOT NULL DEFAULT '[]'
);";

/// Record with an engine-assigned integer key and a JSON column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Option<i64>,
    pub title: String,
    pub done: bool,
    pub labels: Vec<String>,
}

impl Task {
    pub fn new(title: &str) -> Self {
        Self {
            id: None,
            title: title.to_string(),
            done: false,
            labels: Vec::new(),
        }
    }
}

impl Record for Task {
    type Key = i64;

    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &["title", "done", "labels"];

    fn id(&self) -> Option<&i64> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn to_columns(&self) -> DbResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.title.clone()),
            bool_column(self.done),
            json_column(&self.labels)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: read_key(row, Self::KEY_COLUMN)?,
            title: row.get("title")?,
            done: parse_bool_column(row, "done")?,
            labels: parse_json_column(row, "labels")?,
        })
    }
}

pub fn task_repo() -> Repository<Task> {
    let repo = Repository::open_in_memory().unwrap();
    repo.execute(TASKS_SCHEMA, &[]).unwrap();
    repo
}

/// Receives snapshots until one satisfies `done`, returning it with the
/// number of snapshots consumed.
pub fn wait_for<R>(rx: &Receiver<Vec<R>>, done: impl Fn(&[R]) -> bool) -> (Vec<R>, usize) {
    let mut received = 0;
    loop {
        let snapshot = rx
            .recv_timeout(WAIT)
            .expect("observer should deliver a snapshot");
        received += 1;
        if done(&snapshot) {
            return (snapshot, received);
        }
    }
}
