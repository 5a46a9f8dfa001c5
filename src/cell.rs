//! Observable cells.
//!
//! An [`ObservableCell`] wraps a value and runs registered callbacks around
//! every assignment, synchronously on the assigning thread:
//!
//! 1. every before-change callback, in registration order, with the new value;
//! 2. the stored value is replaced;
//! 3. every after-change callback, in registration order, with the new value.
//!
//! The first failing callback aborts the sequence and its error propagates to
//! the caller. A failure in step 1 leaves the old value in place; a failure in
//! step 3 leaves the new value in place. A panicking callback unwinds through
//! the same points, and the cell stays usable afterwards.
//!
//! Assignments are serialized per cell. A callback that assigns to the cell
//! whose sequence it is running in is rejected with
//! `ExecutionError::ReentrantAssignment`; the outer assignment continues.
//! Callbacks are snapshotted when an assignment starts, so observers
//! registered from inside a callback first run on the next assignment.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};
use uuid::Uuid;

use crate::config::CellConfig;
use crate::error::{ExecutionError, ObserverError, SwitchResult};

/// Which side of an assignment a callback runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePhase {
    /// Before the stored value is replaced.
    Before,
    /// After the stored value is replaced.
    After,
}

impl fmt::Display for ChangePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

/// Unique identifier for a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Creates a new random observer id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change delivered to watch streams.
#[derive(Debug, PartialEq)]
pub struct ChangeEvent<T> {
    /// 1-based count of assignments to the cell, this one included.
    pub sequence: u64,
    /// The value stored by this assignment.
    pub value: Arc<T>,
    /// When the value was replaced.
    pub changed_at: DateTime<Utc>,
}

impl<T> Clone for ChangeEvent<T> {
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence,
            value: Arc::clone(&self.value),
            changed_at: self.changed_at,
        }
    }
}

type ObserverFn<T> = dyn Fn(&T) -> Result<(), ObserverError> + Send + Sync;

struct Observer<T> {
    id: ObserverId,
    callback: Arc<ObserverFn<T>>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Arc::clone(&self.callback),
        }
    }
}

struct Observers<T> {
    before: Vec<Observer<T>>,
    after: Vec<Observer<T>>,
    watchers: Vec<Sender<ChangeEvent<T>>>,
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            watchers: Vec::new(),
        }
    }
}

/// Clears the active writer when an assignment ends, including by panic.
struct WriterGuard<'a> {
    writer: &'a Mutex<Option<ThreadId>>,
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// A value with before/after change callbacks.
///
/// # Example
/// ```
/// use std::sync::{Arc, Mutex};
/// use switchboard::ObservableCell;
///
/// let log = Arc::new(Mutex::new(Vec::new()));
/// let cell = ObservableCell::new(0);
///
/// let before = Arc::clone(&log);
/// cell.on_before_change(move |v| before.lock().unwrap().push(format!("will set {v}")));
/// let after = Arc::clone(&log);
/// cell.on_after_change(move |v| after.lock().unwrap().push(format!("did set {v}")));
///
/// cell.set(1).unwrap();
/// assert_eq!(*log.lock().unwrap(), vec!["will set 1", "did set 1"]);
/// ```
pub struct ObservableCell<T> {
    config: CellConfig,
    value: RwLock<Arc<T>>,
    observers: RwLock<Observers<T>>,
    write_gate: Mutex<()>,
    writer: Mutex<Option<ThreadId>>,
    sequence: AtomicU64,
    dropped_events: AtomicU64,
}

impl<T> ObservableCell<T> {
    /// Creates a cell holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self::with_config(initial, CellConfig::default())
    }

    /// Creates a cell with explicit configuration.
    #[must_use]
    pub fn with_config(initial: T, config: CellConfig) -> Self {
        Self {
            config,
            value: RwLock::new(Arc::new(initial)),
            observers: RwLock::new(Observers::default()),
            write_gate: Mutex::new(()),
            writer: Mutex::new(None),
            sequence: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        }
    }

    /// The cell name from its configuration.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// A shared snapshot of the current value.
    #[must_use]
    pub fn snapshot(&self) -> Arc<T> {
        Arc::clone(&self.value.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// A copy of the current value.
    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        (*self.snapshot()).clone()
    }

    /// Number of assignments that replaced the value.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Watch events dropped because a subscriber's buffer was full.
    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Registers a before-change callback.
    pub fn on_before_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.try_on_before_change(move |v| {
            callback(v);
            Ok(())
        })
    }

    /// Registers an after-change callback.
    pub fn on_after_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.try_on_after_change(move |v| {
            callback(v);
            Ok(())
        })
    }

    /// Registers a fallible before-change callback. An error vetoes the assignment.
    pub fn try_on_before_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.register(ChangePhase::Before, Arc::new(callback))
    }

    /// Registers a fallible after-change callback.
    pub fn try_on_after_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.register(ChangePhase::After, Arc::new(callback))
    }

    fn register(&self, phase: ChangePhase, callback: Arc<ObserverFn<T>>) -> ObserverId {
        let id = ObserverId::new();
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let list = match phase {
            ChangePhase::Before => &mut observers.before,
            ChangePhase::After => &mut observers.after,
        };
        list.push(Observer { id, callback });
        id
    }

    /// Removes a callback. Returns false if `id` was not registered.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        let before = observers.before.len() + observers.after.len();
        observers.before.retain(|o| o.id != id);
        observers.after.retain(|o| o.id != id);
        before != observers.before.len() + observers.after.len()
    }

    /// Number of registered callbacks in `phase`.
    #[must_use]
    pub fn observer_count(&self, phase: ChangePhase) -> usize {
        let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
        match phase {
            ChangePhase::Before => observers.before.len(),
            ChangePhase::After => observers.after.len(),
        }
    }

    /// Subscribes to changes.
    ///
    /// Every assignment that replaces the value emits one [`ChangeEvent`].
    /// A subscriber whose buffer (`CellConfig::watch_capacity`) is full
    /// misses the event; the assignment never blocks on it.
    pub fn watch(&self) -> ChangeStream<T> {
        let (tx, rx) = bounded(self.config.watch_capacity.max(1));
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .watchers
            .push(tx);
        ChangeStream { rx }
    }

    /// Assigns `value`, running callbacks around the replacement.
    ///
    /// # Errors
    /// - `ExecutionError::Callback` if a callback fails (see module docs).
    /// - `ExecutionError::ReentrantAssignment` if called from one of this
    ///   cell's callbacks during an assignment.
    ///
    /// # Panics
    /// Propagates a panic from a callback. A panic in a before-change
    /// callback leaves the old value in place.
    pub fn set(&self, value: T) -> SwitchResult<()> {
        self.assign(move |_| value)
    }

    /// Assigns `f(current)` within the same exclusive region as the read.
    pub fn update<F>(&self, f: F) -> SwitchResult<()>
    where
        F: FnOnce(&T) -> T,
    {
        self.assign(f)
    }

    fn assign<F>(&self, compute: F) -> SwitchResult<()>
    where
        F: FnOnce(&T) -> T,
    {
        let me = thread::current().id();
        if *self.writer.lock().unwrap_or_else(PoisonError::into_inner) == Some(me) {
            warn!(cell = %self.config.name, "re-entrant assignment rejected");
            return Err(ExecutionError::ReentrantAssignment {
                cell: self.config.name.clone(),
            }
            .into());
        }

        // A callback that panicked poisons the gate but leaves no partial
        // state behind: the value is only ever swapped whole.
        let _gate = self.write_gate.lock().unwrap_or_else(PoisonError::into_inner);
        *self.writer.lock().unwrap_or_else(PoisonError::into_inner) = Some(me);
        let _writer = WriterGuard {
            writer: &self.writer,
        };

        let current = self.snapshot();
        let next = Arc::new(compute(&*current));
        let (before, after) = {
            let observers = self.observers.read().unwrap_or_else(PoisonError::into_inner);
            (observers.before.clone(), observers.after.clone())
        };

        trace!(cell = %self.config.name, callbacks = before.len(), "running before-change callbacks");
        self.run_phase(ChangePhase::Before, &before, &next)?;

        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        self.notify_watchers(sequence, &next);

        trace!(cell = %self.config.name, callbacks = after.len(), sequence, "running after-change callbacks");
        self.run_phase(ChangePhase::After, &after, &next)
    }

    fn run_phase(&self, phase: ChangePhase, observers: &[Observer<T>], value: &T) -> SwitchResult<()> {
        for observer in observers {
            if let Err(e) = (observer.callback)(value) {
                warn!(
                    cell = %self.config.name,
                    %phase,
                    observer = %observer.id,
                    error = %e,
                    "change callback failed"
                );
                return Err(ExecutionError::Callback {
                    phase,
                    message: e.message().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn notify_watchers(&self, sequence: u64, value: &Arc<T>) {
        let mut observers = self.observers.write().unwrap_or_else(PoisonError::into_inner);
        if observers.watchers.is_empty() {
            return;
        }

        let event = ChangeEvent {
            sequence,
            value: Arc::clone(value),
            changed_at: Utc::now(),
        };
        observers.watchers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                warn!(cell = %self.config.name, sequence, "watch buffer full; event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

impl<T> fmt::Debug for ObservableCell<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableCell")
            .field("name", &self.config.name)
            .field("value", &self.snapshot())
            .field("sequence", &self.sequence())
            .finish_non_exhaustive()
    }
}

/// Receiving side of [`ObservableCell::watch`].
///
/// Dropping the stream unsubscribes it on the next assignment.
#[derive(Debug)]
pub struct ChangeStream<T> {
    rx: Receiver<ChangeEvent<T>>,
}

impl<T> ChangeStream<T> {
    /// Returns the next buffered event, if any.
    #[must_use]
    pub fn try_recv(&self) -> Option<ChangeEvent<T>> {
        self.rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> SwitchResult<ChangeEvent<T>> {
        self.rx.recv_timeout(timeout).map_err(|err| {
            let err = match err {
                RecvTimeoutError::Timeout => ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                },
                RecvTimeoutError::Disconnected => ExecutionError::Disconnected {
                    path: "cell_watch".to_string(),
                },
            };
            err.into()
        })
    }

    /// Drains every buffered event.
    pub fn drain(&self) -> Vec<ChangeEvent<T>> {
        self.rx.try_iter().collect()
    }
}
