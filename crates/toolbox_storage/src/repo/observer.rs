//! Single-slot live subscription to a table's full record set.
//!
//! # Responsibility
//! - Run the initial scan and every post-commit re-scan on a worker thread.
//! - Keep the last delivered snapshot.
//!
//! # Invariants
//! - At most one active subscription per slot; subscribing again replaces it.
//! - Pending change signals are drained before a re-scan, so a burst of
//!   commits may collapse into one delivery, but the last delivery always
//!   reflects the state after the burst.
//! - A commit that lands after `subscribe` starts is either seen by the
//!   initial scan or signals a re-scan.
//! - Scan failures and handler panics never end the subscription.
//! - Nothing is delivered after `unsubscribe` returns, except when it is
//!   called from inside a handler.

use super::{RepoError, RepoResult};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Failure while refreshing a live snapshot.
#[derive(Debug)]
pub struct ObservationError {
    source: RepoError,
}

impl ObservationError {
    pub fn new(source: RepoError) -> Self {
        Self { source }
    }

    pub fn repo_error(&self) -> &RepoError {
        &self.source
    }
}

impl Display for ObservationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "live snapshot refresh failed: {}", self.source)
    }
}

impl Error for ObservationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

struct Subscription {
    signal: Sender<()>,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    fn cancel(self, table: &str) {
        let Self {
            signal,
            cancelled,
            worker,
        } = self;
        cancelled.store(true, Ordering::Release);
        drop(signal);

        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("event=observe_stop module=repo status=error table={table} error_code=handler_panicked");
            }
        }
    }
}

/// Observer registry owned by one repository.
pub(crate) struct ObserverSlot<R> {
    table: &'static str,
    active: Mutex<Option<Subscription>>,
    snapshot: Arc<Mutex<Option<Vec<R>>>>,
}

impl<R: Clone + Send + 'static> ObserverSlot<R> {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            active: Mutex::new(None),
            snapshot: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts a worker that delivers the current records now and after every
    /// [`notify`](Self::notify).
    pub fn subscribe<S, C, E>(&self, scan: S, on_change: C, on_error: E) -> RepoResult<()>
    where
        S: Fn() -> RepoResult<Vec<R>> + Send + 'static,
        C: FnMut(Vec<R>) + Send + 'static,
        E: FnMut(ObservationError) + Send + 'static,
    {
        self.unsubscribe();

        let (signal, signals) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            table: self.table,
            scan,
            on_change,
            on_error,
            signals,
            cancelled: Arc::clone(&cancelled),
            snapshot: Arc::clone(&self.snapshot),
        };

        // The slot stays locked until the subscription is registered, so a
        // `notify` racing with the initial scan waits and then signals.
        let mut active = lock(&self.active);
        let handle = thread::Builder::new()
            .name(format!("observe-{}", self.table))
            .spawn(move || worker.run())
            .map_err(|err| RepoError::TaskFailed(format!("failed to start observer: {err}")))?;
        let replaced = active.replace(Subscription {
            signal,
            cancelled,
            worker: Some(handle),
        });
        drop(active);

        if let Some(previous) = replaced {
            previous.cancel(self.table);
        }

        info!(
            "event=observe_start module=repo status=ok table={}",
            self.table
        );
        Ok(())
    }

    /// Stops delivery. Safe to call when not subscribed.
    pub fn unsubscribe(&self) {
        let current = lock(&self.active).take();
        if let Some(subscription) = current {
            subscription.cancel(self.table);
            info!(
                "event=observe_stop module=repo status=ok table={}",
                self.table
            );
        }
    }

    /// Signals that a write committed.
    pub fn notify(&self) {
        if let Some(subscription) = lock(&self.active).as_ref() {
            // A closed channel means the worker already stopped.
            let _ = subscription.signal.send(());
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn snapshot(&self) -> Option<Vec<R>> {
        lock(&self.snapshot).clone()
    }
}

struct Worker<R, S, C, E> {
    table: &'static str,
    scan: S,
    on_change: C,
    on_error: E,
    signals: Receiver<()>,
    cancelled: Arc<AtomicBool>,
    snapshot: Arc<Mutex<Option<Vec<R>>>>,
}

impl<R, S, C, E> Worker<R, S, C, E>
where
    R: Clone,
    S: Fn() -> RepoResult<Vec<R>>,
    C: FnMut(Vec<R>),
    E: FnMut(ObservationError),
{
    fn run(mut self) {
        self.refresh();
        while self.signals.recv().is_ok() {
            while self.signals.try_recv().is_ok() {}
            if self.is_cancelled() {
                break;
            }
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        match (self.scan)() {
            Ok(records) => {
                if self.is_cancelled() {
                    return;
                }
                *lock(&self.snapshot) = Some(records.clone());
                let on_change = &mut self.on_change;
                let delivered = panic::catch_unwind(AssertUnwindSafe(|| on_change(records)));
                if delivered.is_err() {
                    self.log_handler_panic("on_change");
                }
            }
            Err(err) => {
                warn!(
                    "event=observe_refresh module=repo status=error table={} error={}",
                    self.table, err
                );
                if !self.is_cancelled() {
                    let on_error = &mut self.on_error;
                    let reported = panic::catch_unwind(AssertUnwindSafe(|| {
                        on_error(ObservationError::new(err))
                    }));
                    if reported.is_err() {
                        self.log_handler_panic("on_error");
                    }
                }
            }
        }
    }

    fn log_handler_panic(&self, handler: &str) {
        error!(
            "event=observe_refresh module=repo status=error table={} handler={} error_code=handler_panicked",
            self.table, handler
        );
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
