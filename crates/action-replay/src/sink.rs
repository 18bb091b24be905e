//! Rendering collaborators.
//!
//! The engine never draws. It hands each delivered [`Batch`] to a
//! [`BatchSink`], which owns all visual state, including the last rendered
//! pointer position used for incremental strokes. The controller calls
//! [`BatchSink::reset`] on every session start and after a playback
//! completes.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SinkError;
use crate::event::Event;
use crate::player::Batch;

/// Receives batches of events for rendering.
///
/// Called synchronously from the session loop; implementations must not
/// block.
pub trait BatchSink: Send {
    /// Render one batch.
    fn deliver(&mut self, batch: &Batch) -> Result<(), SinkError>;

    /// Drop per-session render state.
    fn reset(&mut self) {}
}

impl<S: BatchSink + ?Sized> BatchSink for Box<S> {
    fn deliver(&mut self, batch: &Batch) -> Result<(), SinkError> {
        (**self).deliver(batch)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl BatchSink for NullSink {
    fn deliver(&mut self, _batch: &Batch) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink built from a closure.
pub struct FnSink<F> {
    deliver: F,
}

impl<F> FnSink<F>
where
    F: FnMut(&Batch) -> Result<(), SinkError> + Send,
{
    /// Wrap a closure.
    pub const fn new(deliver: F) -> Self {
        Self { deliver }
    }
}

impl<F> BatchSink for FnSink<F>
where
    F: FnMut(&Batch) -> Result<(), SinkError> + Send,
{
    fn deliver(&mut self, batch: &Batch) -> Result<(), SinkError> {
        (self.deliver)(batch)
    }
}

impl<F> std::fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSink").finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Collected {
    batches: Vec<Batch>,
    resets: usize,
}

/// A sink that keeps every batch, for inspection from another handle.
#[derive(Debug, Clone, Default)]
pub struct CollectingSink {
    inner: Arc<Mutex<Collected>>,
    fail_after: Option<usize>,
}

impl CollectingSink {
    /// Create an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every delivery after `count` successful ones.
    #[must_use]
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collected> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Batches delivered so far.
    #[must_use]
    pub fn batches(&self) -> Vec<Batch> {
        self.lock().batches.clone()
    }

    /// All delivered events, flattened in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock()
            .batches
            .iter()
            .flat_map(|b| b.events.iter().cloned())
            .collect()
    }

    /// Number of resets received.
    #[must_use]
    pub fn resets(&self) -> usize {
        self.lock().resets
    }

    /// Forget everything delivered so far.
    pub fn clear(&self) {
        self.lock().batches.clear();
    }
}

impl BatchSink for CollectingSink {
    fn deliver(&mut self, batch: &Batch) -> Result<(), SinkError> {
        let mut collected = self.lock();
        if self
            .fail_after
            .is_some_and(|limit| collected.batches.len() >= limit)
        {
            return Err(SinkError::new("collecting sink refused batch"));
        }
        collected.batches.push(batch.clone());
        Ok(())
    }

    fn reset(&mut self) {
        self.lock().resets += 1;
    }
}
