mod common;

use common::{task_repo, Task};
use rusqlite::Connection;
use toolbox_storage::db::{open_store, open_store_in_memory};
use toolbox_storage::{
    DbError, Filter, NoteStorage, RecordStore, RepoError, Repository, StoreConfig, StoreLocation,
};
use uuid::Uuid;

#[test]
fn open_store_in_memory_bootstraps_default_table() {
    let conn = open_store_in_memory().unwrap();

    assert_table_exists(&conn, "NoteStorage");
    assert_eq!(user_version(&conn), 0);
}

#[test]
fn ephemeral_repository_starts_empty() {
    let repo = Repository::<NoteStorage>::open(None).unwrap();

    assert!(repo.is_available());
    assert_eq!(repo.location(), Some(&StoreLocation::Ephemeral));
    assert!(repo.get_all().unwrap().is_empty());
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn file_repository_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.sqlite3");
    let config = StoreConfig {
        bootstrap_default_schema: Some(true),
        ..StoreConfig::file(&path)
    };
    let mut note = NoteStorage::with_id(Uuid::new_v4(), "kept");

    {
        let repo = Repository::<NoteStorage>::open_with_config(&config).unwrap();
        repo.save(&mut note).unwrap();
    }

    assert!(path.exists());
    let reopened = Repository::<NoteStorage>::open(Some(path.as_path())).unwrap();
    assert_eq!(
        reopened.location(),
        Some(&StoreLocation::File(path.clone()))
    );
    assert_eq!(reopened.get(&note.id.unwrap()).unwrap(), Some(note));
}

#[test]
fn file_store_without_bootstrap_has_no_default_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.sqlite3");

    let conn = open_store(&path).unwrap();
    assert!(!table_exists(&conn, "NoteStorage"));
    drop(conn);

    let repo = Repository::<NoteStorage>::open(Some(path.as_path())).unwrap();
    let err = repo.get_all().unwrap_err();
    assert!(matches!(err, RepoError::ReadFailed(DbError::Sqlite(_))));

    repo.execute(
        "CREATE TABLE NoteStorage (id TEXT PRIMARY KEY, title TEXT);",
        &[],
    )
    .unwrap();
    assert!(repo.get_all().unwrap().is_empty());
}

#[test]
fn opening_unwritable_location_returns_store_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-parent").join("notes.sqlite3");

    let result = Repository::<NoteStorage>::open(Some(path.as_path()));
    assert!(matches!(result, Err(RepoError::StoreOpen(_))));
}

#[test]
fn bootstrap_ignores_caller_user_version() {
    let dir = tempfile::tempdir().unwrap();

    for version in [1, 999] {
        let path = dir.path().join(format!("versioned-{version}.sqlite3"));
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE other (id INTEGER PRIMARY KEY); PRAGMA user_version = {version};"
        ))
        .unwrap();
        drop(conn);

        let config = StoreConfig {
            bootstrap_default_schema: Some(true),
            ..StoreConfig::file(&path)
        };
        let repo = Repository::<NoteStorage>::open_with_config(&config).unwrap();
        let mut note = NoteStorage::new("bootstrapped");
        repo.save(&mut note).unwrap();
        assert_eq!(repo.get_all().unwrap(), vec![note]);
        drop(repo);

        let conn = Connection::open(&path).unwrap();
        assert_eq!(user_version(&conn), version);
        assert!(table_exists(&conn, "other"));
    }
}

#[test]
fn bootstrap_keeps_existing_default_table_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.sqlite3");
    let config = StoreConfig {
        bootstrap_default_schema: Some(true),
        ..StoreConfig::file(&path)
    };
    let mut note = NoteStorage::new("kept across bootstrap");
    {
        let repo = Repository::<NoteStorage>::open_with_config(&config).unwrap();
        repo.save(&mut note).unwrap();
    }

    let reopened = Repository::<NoteStorage>::open_with_config(&config).unwrap();
    assert_eq!(reopened.get_all().unwrap(), vec![note]);
}

#[test]
fn unavailable_repository_rejects_every_operation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing-parent").join("notes.sqlite3");
    let repo = Repository::<NoteStorage>::open_or_unavailable(Some(path.as_path()));
    let mut note = NoteStorage::new("never stored");
    let key = Uuid::new_v4();

    assert!(!repo.is_available());
    assert_eq!(repo.location(), None);
    assert!(matches!(repo.save(&mut note), Err(RepoError::StoreUnavailable)));
    assert!(matches!(
        repo.save_if_absent(&mut note),
        Err(RepoError::StoreUnavailable)
    ));
    assert!(matches!(
        repo.save_all(std::slice::from_mut(&mut note)),
        Err(RepoError::StoreUnavailable)
    ));
    assert!(matches!(
        repo.execute("DELETE FROM NoteStorage;", &[]),
        Err(RepoError::StoreUnavailable)
    ));
    assert!(matches!(repo.get(&key), Err(RepoError::StoreUnavailable)));
    assert!(matches!(repo.get_all(), Err(RepoError::StoreUnavailable)));
    assert!(matches!(
        repo.get_filtered(&Filter::is_null("title").unwrap()),
        Err(RepoError::StoreUnavailable)
    ));
    assert!(matches!(repo.delete(&key), Err(RepoError::StoreUnavailable)));
    assert!(matches!(repo.delete_all(), Err(RepoError::StoreUnavailable)));
    assert!(matches!(repo.count(), Err(RepoError::StoreUnavailable)));
    assert!(matches!(
        repo.subscribe(|_| {}, |_| {}),
        Err(RepoError::StoreUnavailable)
    ));
    assert!(note.id.is_none());
    assert_eq!(repo.snapshot(), None);

    repo.unsubscribe();
    repo.save_detached(note);
}

#[test]
fn invalid_record_table_name_fails_at_open() {
    use rusqlite::types::Value;
    use rusqlite::Row;
    use toolbox_storage::{DbResult, Record};

    #[derive(Debug, Clone, PartialEq)]
    struct Broken;

    impl Record for Broken {
        type Key = String;
        const TABLE: &'static str = "broken-table";
        const COLUMNS: &'static [&'static str] = &[];

        fn id(&self) -> Option<&String> {
            None
        }

        fn set_id(&mut self, _id: String) {}

        fn to_columns(&self) -> DbResult<Vec<Value>> {
            Ok(Vec::new())
        }

        fn from_row(_row: &Row<'_>) -> DbResult<Self> {
            Ok(Self)
        }
    }

    let result = Repository::<Broken>::open_in_memory();
    assert!(matches!(
        result,
        Err(RepoError::StoreOpen(DbError::InvalidIdentifier(_)))
    ));
}

#[test]
fn custom_table_can_be_created_through_execute() {
    let repo = task_repo();
    let mut task = Task::new("write tests");

    let id = repo.save(&mut task).unwrap();

    assert_eq!(repo.get(&id).unwrap(), Some(task));
}

fn user_version(conn: &Connection) -> i64 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    assert!(table_exists(conn, table_name), "table {table_name} does not exist");
}

fn table_exists(conn: &Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    exists == 1
}
