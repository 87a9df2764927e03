//! Generic SQLite repository with a live record subscription.
//!
//! # Responsibility
//! - Provide key-addressed CRUD, bulk insert-if-absent, raw execute and
//!   filtered reads for one `Record` type.
//! - Offer blocking, async and fire-and-forget forms of the same routines.
//! - Refresh the live subscription after every commit made through this
//!   repository.
//!
//! # Invariants
//! - One repository owns at most one store; ephemeral stores are private to
//!   the instance.
//! - Async forms run the blocking routine unchanged on tokio's blocking pool
//!   and must be awaited inside a Tokio runtime.
//! - A record's id is only assigned after its transaction committed.
//! - Commits made through another repository on the same file are not
//!   observed here: SQLite change hooks are per connection.

use super::filter::Filter;
use super::observer::{ObservationError, ObserverSlot};
use super::sql::TableSql;
use super::{RecordStore, RepoError, RepoResult};
use crate::config::StoreConfig;
use crate::db::{DbError, DbQueue, DbResult, StoreLocation};
use crate::model::record::{Record, RecordKey};
use log::{debug, error, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Typed store bound to one backing database and one record type.
pub struct Repository<R: Record> {
    inner: Option<Arc<StoreInner<R>>>,
}

impl<R: Record> Repository<R> {
    /// Opens a store at `location`, or a fresh ephemeral store when `None`.
    ///
    /// Ephemeral stores get the default `NoteStorage` table.
    pub fn open(location: Option<&Path>) -> RepoResult<Self> {
        let config = match location {
            Some(path) => StoreConfig::file(path),
            None => StoreConfig::ephemeral(),
        };
        Self::open_with_config(&config)
    }

    pub fn open_in_memory() -> RepoResult<Self> {
        Self::open_with_config(&StoreConfig::ephemeral())
    }

    pub fn open_with_config(config: &StoreConfig) -> RepoResult<Self> {
        let sql = TableSql::for_record::<R>().map_err(RepoError::StoreOpen)?;
        let queue = DbQueue::open(config).map_err(RepoError::StoreOpen)?;
        Ok(Self {
            inner: Some(Arc::new(StoreInner {
                queue: Arc::new(queue),
                sql: Arc::new(sql),
                observer: ObserverSlot::new(R::TABLE),
            })),
        })
    }

    /// Opens like [`open`](Self::open) but never fails.
    ///
    /// A failed open is logged and yields a repository whose every
    /// operation returns [`RepoError::StoreUnavailable`].
    pub fn open_or_unavailable(location: Option<&Path>) -> Self {
        match Self::open(location) {
            Ok(repo) => repo,
            Err(err) => {
                error!(
                    "event=repo_open module=repo status=error table={} error_code=store_unavailable error={}",
                    R::TABLE,
                    err
                );
                Self { inner: None }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.is_some()
    }

    pub fn location(&self) -> Option<&StoreLocation> {
        self.inner.as_ref().map(|inner| inner.queue.location())
    }

    /// Registers the single observer of this repository.
    ///
    /// `on_change` receives the current records right away and again after
    /// every commit made through this repository. Both handlers run on a
    /// dedicated worker thread. Subscribing again replaces the previous
    /// observer.
    pub fn subscribe<C, E>(&self, on_change: C, on_error: E) -> RepoResult<()>
    where
        C: FnMut(Vec<R>) + Send + 'static,
        E: FnMut(ObservationError) + Send + 'static,
    {
        let inner = self.inner()?;
        inner
            .observer
            .subscribe(inner.scanner(), on_change, on_error)
    }

    /// Stops the live subscription. No-op when not subscribed.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.observer.unsubscribe();
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.observer.is_active())
    }

    /// Last record set delivered to the observer, if any scan ran yet.
    pub fn snapshot(&self) -> Option<Vec<R>> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.observer.snapshot())
    }

    /// Returns the saved record with its id assigned.
    ///
    /// # Panics
    /// Like every `*_async` form, panics when awaited outside a Tokio
    /// runtime, because the work runs through `tokio::task::spawn_blocking`.
    pub async fn save_async(&self, item: R) -> RepoResult<R> {
        self.run_blocking("save", move |inner| {
            let mut item = item;
            inner.save(&mut item)?;
            Ok(item)
        })
        .await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn save_if_absent_async(&self, item: R) -> RepoResult<(R, bool)> {
        self.run_blocking("save_if_absent", move |inner| {
            let mut item = item;
            let inserted = inner.save_if_absent(&mut item)?;
            Ok((item, inserted))
        })
        .await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn save_all_async(&self, items: Vec<R>) -> RepoResult<(Vec<R>, usize)> {
        self.run_blocking("save_all", move |inner| {
            let mut items = items;
            let inserted = inner.save_all(&mut items)?;
            Ok((items, inserted))
        })
        .await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn execute_async(&self, sql: String, args: Vec<Value>) -> RepoResult<()> {
        self.run_blocking("execute", move |inner| inner.execute(&sql, &args))
            .await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn get_async(&self, key: R::Key) -> RepoResult<Option<R>> {
        self.run_blocking("get", move |inner| inner.get(&key)).await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn get_all_async(&self) -> RepoResult<Vec<R>> {
        self.run_blocking("get_all", |inner| inner.get_all()).await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn get_filtered_async(&self, filter: Filter) -> RepoResult<Vec<R>> {
        self.run_blocking("get_filtered", move |inner| inner.get_filtered(&filter))
            .await
    }

    /// Requires a Tokio runtime, see [`save_async`](Self::save_async).
    pub async fn delete_all_async(&self) -> RepoResult<usize> {
        self.run_blocking("delete_all", |inner| inner.delete_all())
            .await
    }

    /// Saves on a background thread and discards the outcome.
    ///
    /// Failures are only logged. Callers that need to know whether the
    /// write happened must use [`save`](RecordStore::save) or
    /// [`save_async`](Self::save_async).
    pub fn save_detached(&self, item: R) {
        let Some(inner) = self.inner.clone() else {
            warn!(
                "event=repo_write module=repo status=error op=save_detached table={} error_code=store_unavailable",
                R::TABLE
            );
            return;
        };

        let spawned = thread::Builder::new()
            .name(format!("save-{}", R::TABLE))
            .spawn(move || {
                let mut item = item;
                if let Err(err) = inner.save(&mut item) {
                    warn!(
                        "event=repo_write module=repo status=error op=save_detached table={} error={}",
                        R::TABLE,
                        err
                    );
                }
            });
        if let Err(err) = spawned {
            warn!(
                "event=repo_write module=repo status=error op=save_detached table={} error_code=spawn_failed error={}",
                R::TABLE,
                err
            );
        }
    }

    fn inner(&self) -> RepoResult<&Arc<StoreInner<R>>> {
        self.inner.as_ref().ok_or(RepoError::StoreUnavailable)
    }

    async fn run_blocking<T, F>(&self, op: &'static str, f: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&StoreInner<R>) -> RepoResult<T> + Send + 'static,
    {
        let inner = Arc::clone(self.inner()?);
        tokio::task::spawn_blocking(move || f(&*inner))
            .await
            .map_err(|err| {
                error!(
                    "event=repo_task module=repo status=error op={} table={} error={}",
                    op,
                    R::TABLE,
                    err
                );
                RepoError::TaskFailed(format!("{op}: {err}"))
            })?
    }
}

impl<R: Record> RecordStore<R> for Repository<R> {
    fn save(&self, item: &mut R) -> RepoResult<R::Key> {
        self.inner()?.save(item)
    }

    fn save_if_absent(&self, item: &mut R) -> RepoResult<bool> {
        self.inner()?.save_if_absent(item)
    }

    fn save_all(&self, items: &mut [R]) -> RepoResult<usize> {
        self.inner()?.save_all(items)
    }

    fn execute(&self, sql: &str, args: &[Value]) -> RepoResult<()> {
        self.inner()?.execute(sql, args)
    }

    fn get(&self, key: &R::Key) -> RepoResult<Option<R>> {
        self.inner()?.get(key)
    }

    fn get_all(&self) -> RepoResult<Vec<R>> {
        self.inner()?.get_all()
    }

    fn get_filtered(&self, filter: &Filter) -> RepoResult<Vec<R>> {
        self.inner()?.get_filtered(filter)
    }

    fn delete(&self, key: &R::Key) -> RepoResult<bool> {
        self.inner()?.delete(key)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.inner()?.delete_all()
    }

    fn count(&self) -> RepoResult<u64> {
        self.inner()?.count()
    }
}

impl<R: Record> Drop for Repository<R> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct StoreInner<R: Record> {
    queue: Arc<DbQueue>,
    sql: Arc<TableSql>,
    observer: ObserverSlot<R>,
}

impl<R: Record> StoreInner<R> {
    fn save(&self, item: &mut R) -> RepoResult<R::Key> {
        let record: &R = item;
        let (key, _) = self.write("save", |queue| {
            queue.write(|tx| insert_record(tx, &self.sql, record, &self.sql.upsert))
        })?;
        item.set_id(key.clone());
        Ok(key)
    }

    fn save_if_absent(&self, item: &mut R) -> RepoResult<bool> {
        let record: &R = item;
        let (key, changed) = self.write("save_if_absent", |queue| {
            queue.write(|tx| insert_record(tx, &self.sql, record, &self.sql.insert_if_absent))
        })?;
        if changed > 0 {
            item.set_id(key);
        }
        Ok(changed > 0)
    }

    fn save_all(&self, items: &mut [R]) -> RepoResult<usize> {
        let records: &[R] = items;
        let (inserted, keys) = self.write("save_all", |queue| {
            queue.write(|tx| {
                let mut inserted = 0;
                let mut keys = Vec::with_capacity(records.len());
                for record in records {
                    let (key, changed) =
                        insert_record(tx, &self.sql, record, &self.sql.insert_if_absent)?;
                    inserted += changed;
                    keys.push((key, changed > 0));
                }
                Ok((inserted, keys))
            })
        })?;

        for (item, (key, was_inserted)) in items.iter_mut().zip(keys) {
            if was_inserted {
                item.set_id(key);
            }
        }
        Ok(inserted)
    }

    fn execute(&self, sql: &str, args: &[Value]) -> RepoResult<()> {
        self.write("execute", |queue| queue.execute(sql, args))
    }

    fn get(&self, key: &R::Key) -> RepoResult<Option<R>> {
        self.read("get", |conn| {
            let mut stmt = conn.prepare(&self.sql.get_by_key)?;
            let mut rows = stmt.query([key.to_sql()])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(R::from_row(row)?));
            }
            Ok(None)
        })
    }

    fn get_all(&self) -> RepoResult<Vec<R>> {
        self.read("get_all", |conn| {
            query_records(conn, &self.sql.select_all(), &[])
        })
    }

    fn get_filtered(&self, filter: &Filter) -> RepoResult<Vec<R>> {
        self.read("get_filtered", |conn| {
            query_records(conn, &self.sql.select_where(filter.clause()), filter.args())
        })
    }

    fn delete(&self, key: &R::Key) -> RepoResult<bool> {
        let changed = self.write("delete", |queue| {
            queue.write(|tx| Ok(tx.execute(&self.sql.delete_by_key, [key.to_sql()])?))
        })?;
        Ok(changed > 0)
    }

    fn delete_all(&self) -> RepoResult<usize> {
        self.write("delete_all", |queue| {
            queue.write(|tx| Ok(tx.execute(&self.sql.delete_all, [])?))
        })
    }

    fn count(&self) -> RepoResult<u64> {
        self.read("count", |conn| {
            let count = conn.query_row(&self.sql.count, [], |row| row.get::<_, i64>(0))?;
            u64::try_from(count)
                .map_err(|_| DbError::InvalidData(format!("negative row count `{count}`")))
        })
    }

    /// Full-table scan usable from the observer worker.
    fn scanner(&self) -> impl Fn() -> RepoResult<Vec<R>> + Send + 'static {
        let queue = Arc::clone(&self.queue);
        let sql = Arc::clone(&self.sql);
        move || {
            queue
                .read(|conn| query_records::<R>(conn, &sql.select_all(), &[]))
                .map_err(RepoError::ReadFailed)
        }
    }

    fn write<T>(
        &self,
        op: &'static str,
        run: impl FnOnce(&DbQueue) -> DbResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        match run(&self.queue) {
            Ok(value) => {
                debug!(
                    "event=repo_write module=repo status=ok op={} table={} duration_ms={}",
                    op,
                    self.sql.table,
                    started_at.elapsed().as_millis()
                );
                self.observer.notify();
                Ok(value)
            }
            Err(err) => {
                warn!(
                    "event=repo_write module=repo status=error op={} table={} duration_ms={} error={}",
                    op,
                    self.sql.table,
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(RepoError::WriteFailed(err))
            }
        }
    }

    fn read<T>(
        &self,
        op: &'static str,
        run: impl FnOnce(&Connection) -> DbResult<T>,
    ) -> RepoResult<T> {
        self.queue.read(run).map_err(|err| {
            warn!(
                "event=repo_read module=repo status=error op={} table={} error={}",
                op, self.sql.table, err
            );
            RepoError::ReadFailed(err)
        })
    }
}

/// Inserts one record with `statement`, resolving its key first.
///
/// Returns the key the row is stored under and the number of changed rows.
fn insert_record<R: Record>(
    tx: &Transaction<'_>,
    sql: &TableSql,
    record: &R,
    statement: &str,
) -> DbResult<(R::Key, usize)> {
    let columns = record.to_columns()?;
    if columns.len() != R::COLUMNS.len() {
        return Err(DbError::InvalidData(format!(
            "record for table `{}` produced {} column values, expected {}",
            R::TABLE,
            columns.len(),
            R::COLUMNS.len()
        )));
    }

    let key = match record.id().cloned().or_else(R::Key::generate) {
        Some(key) => key,
        None => {
            let changed = tx.execute(&sql.insert_without_key, params_from_iter(columns))?;
            let key = R::Key::from_rowid(tx.last_insert_rowid())
                .ok_or(DbError::MissingKey(R::TABLE))?;
            return Ok((key, changed));
        }
    };

    let values = std::iter::once(key.to_sql()).chain(columns);
    let changed = tx.execute(statement, params_from_iter(values))?;
    Ok((key, changed))
}

fn query_records<R: Record>(conn: &Connection, sql: &str, args: &[Value]) -> DbResult<Vec<R>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(args.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(R::from_row(row)?);
    }
    Ok(records)
}
