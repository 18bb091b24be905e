//! Append-only action log with fan-out readers.
//!
//! An [`ActionLog`] is written by exactly one recording and read by any
//! number of [`LogReader`]s and players. Each reader owns its own cursor, so
//! attaching late still replays from the first event, and nothing a reader
//! does is visible to other readers. Growth is signalled over a
//! `tokio::sync::watch` channel carrying the current [`LogStatus`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;

use crate::error::{ReplayError, Result};
use crate::event::{Event, Timestamp};

/// Length and freeze state of a log, as broadcast to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogStatus {
    /// Number of events appended so far.
    pub len: usize,
    /// Whether the log has been frozen.
    pub frozen: bool,
}

struct LogInner {
    events: RwLock<Vec<Event>>,
    frozen: AtomicBool,
    status: watch::Sender<LogStatus>,
}

/// A shared, append-only log of interaction events.
///
/// Cloning an `ActionLog` clones the handle, not the events.
#[derive(Clone)]
pub struct ActionLog {
    inner: Arc<LogInner>,
}

impl ActionLog {
    /// Create an empty, live log.
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(LogStatus::default());
        Self {
            inner: Arc::new(LogInner {
                events: RwLock::new(Vec::new()),
                frozen: AtomicBool::new(false),
                status,
            }),
        }
    }

    /// Create a frozen log holding the given events.
    ///
    /// Timestamps are clamped the same way [`append`](Self::append) clamps
    /// them, so a regressing time is raised to the one before it.
    #[must_use]
    pub fn from_events(mut events: Vec<Event>) -> Self {
        let mut floor = Timestamp::MIN;
        for event in &mut events {
            floor = floor.max(event.time);
            event.time = floor;
        }

        let log = Self::new();
        let len = events.len();
        *log.write() = events;
        log.inner.frozen.store(true, Ordering::Release);
        log.inner.status.send_replace(LogStatus { len, frozen: true });
        log
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Event>> {
        self.inner.events.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Event>> {
        self.inner
            .events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event and return its index.
    ///
    /// A timestamp lower than the last appended one is raised to it, so the
    /// log stays time-ordered in arrival order.
    pub fn append(&self, mut event: Event) -> Result<usize> {
        let mut events = self.write();
        if self.is_frozen() {
            return Err(ReplayError::LogFrozen);
        }

        let last_time = events.last().map(|last| last.time);
        if let Some(last_time) = last_time.filter(|&t| event.time < t) {
            tracing::debug!(
                kind = %event.kind,
                time = event.time,
                clamped_to = last_time,
                "Clamping regressing event timestamp"
            );
            event.time = last_time;
        }

        events.push(event);
        let len = events.len();
        // Published under the lock so a concurrent freeze is never overwritten.
        self.inner.status.send_replace(LogStatus { len, frozen: false });
        drop(events);
        Ok(len - 1)
    }

    /// Freeze the log. Later appends fail with [`ReplayError::LogFrozen`].
    pub fn freeze(&self) {
        let events = self.write();
        if self.inner.frozen.swap(true, Ordering::AcqRel) {
            return;
        }
        let len = events.len();
        self.inner.status.send_replace(LogStatus { len, frozen: true });
        drop(events);
    }

    /// Check whether the log is frozen.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Acquire)
    }

    /// Number of events appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the log has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current length and freeze state.
    #[must_use]
    pub fn status(&self) -> LogStatus {
        *self.inner.status.borrow()
    }

    /// Timestamp of the first event.
    #[must_use]
    pub fn first_time(&self) -> Option<Timestamp> {
        self.read().first().map(|e| e.time)
    }

    /// Timestamp of the last event.
    #[must_use]
    pub fn last_time(&self) -> Option<Timestamp> {
        self.read().last().map(|e| e.time)
    }

    /// Copy all events currently in the log.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.read().clone()
    }

    /// Copy the events in `from..to`, clamped to the current length.
    #[must_use]
    pub fn range(&self, from: usize, to: usize) -> Vec<Event> {
        let events = self.read();
        let to = to.min(events.len());
        events.get(from..to).map(<[Event]>::to_vec).unwrap_or_default()
    }

    /// Copy the events starting at `from` (and before `limit`) whose time is
    /// at or before `until`.
    ///
    /// Stops at the first event that is not yet due, so order is preserved
    /// even if a later event carries an earlier timestamp.
    #[must_use]
    pub fn due(&self, from: usize, limit: usize, until: f64) -> Vec<Event> {
        let events = self.read();
        let limit = limit.min(events.len());
        events
            .get(from..limit)
            .unwrap_or_default()
            .iter()
            .take_while(|e| e.time as f64 <= until)
            .cloned()
            .collect()
    }

    /// Take an immutable view of the events appended so far.
    #[must_use]
    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            len: self.len(),
            log: self.clone(),
        }
    }

    /// Create a reader positioned at the first event.
    #[must_use]
    pub fn reader(&self) -> LogReader {
        LogReader {
            log: self.clone(),
            cursor: 0,
            status: self.inner.status.subscribe(),
        }
    }

    /// Subscribe to length and freeze changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<LogStatus> {
        self.inner.status.subscribe()
    }

    /// Check if two handles refer to the same log.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("ActionLog")
            .field("len", &status.len)
            .field("frozen", &status.frozen)
            .finish()
    }
}

/// An immutable prefix of an [`ActionLog`].
///
/// The log is append-only, so the first `len` events never change; no copy
/// is taken.
#[derive(Debug, Clone)]
pub struct LogSnapshot {
    log: ActionLog,
    len: usize,
}

impl LogSnapshot {
    /// Number of events in the snapshot.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The log this snapshot views.
    #[must_use]
    pub const fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Timestamp of the first event.
    #[must_use]
    pub fn first_time(&self) -> Option<Timestamp> {
        if self.is_empty() {
            None
        } else {
            self.log.first_time()
        }
    }

    /// Copy the events of the snapshot.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.log.range(0, self.len)
    }
}

impl From<Vec<Event>> for LogSnapshot {
    fn from(events: Vec<Event>) -> Self {
        ActionLog::from_events(events).snapshot()
    }
}

/// A cursor over an [`ActionLog`] that sees every event exactly once.
#[derive(Debug)]
pub struct LogReader {
    log: ActionLog,
    cursor: usize,
    status: watch::Receiver<LogStatus>,
}

impl LogReader {
    /// Index of the next event this reader will return.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// The log being read.
    #[must_use]
    pub const fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Take every event appended since the last read, without waiting.
    pub fn drain_available(&mut self) -> Vec<Event> {
        let events = self.log.range(self.cursor, usize::MAX);
        self.cursor += events.len();
        events
    }

    /// Check if the log is frozen and this reader has seen all of it.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        let status = self.log.status();
        status.frozen && self.cursor >= status.len
    }

    /// Wait for new events and take them.
    ///
    /// Returns `None` once the log is frozen and fully read.
    pub async fn next_batch(&mut self) -> Option<Vec<Event>> {
        loop {
            self.status.borrow_and_update();
            let events = self.drain_available();
            if !events.is_empty() {
                return Some(events);
            }
            if self.log.is_frozen() {
                return None;
            }
            if self.status.changed().await.is_err() {
                return None;
            }
        }
    }
}
