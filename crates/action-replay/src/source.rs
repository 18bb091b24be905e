//! Event sources.
//!
//! A source is the capture side of a recording: it is attached exactly once
//! per recording and turned into a stream of timestamped events. Concrete
//! capture (pointer devices, windowing callbacks) lives outside the engine;
//! this module provides the trait plus the sources the engine and its tests
//! need: a push-based [`ChannelSource`], a timed [`ScriptedSource`] and a
//! seeded random [`WanderSource`].

pub mod channel;
pub mod scripted;
pub mod wander;

use futures::stream::BoxStream;

use crate::error::SourceError;
use crate::event::Event;
use crate::util::CaptureClock;

pub use channel::{ChannelSource, SourceHandle};
pub use scripted::{ScriptStep, ScriptedSource};
pub use wander::WanderSource;

/// Stream produced by an attached source.
pub type EventStream = BoxStream<'static, Result<Event, SourceError>>;

/// A producer of interaction events.
pub trait EventSource: Send {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Attach to the source for one recording.
    ///
    /// `clock` is the recording's capture clock; sources that stamp live
    /// events must use it so every source in a recording shares one origin.
    fn attach(self: Box<Self>, clock: CaptureClock) -> EventStream;
}

/// Supplies a fresh set of sources for every recording.
pub trait SourceProvider: Send {
    /// Create the sources for a new recording.
    fn sources(&mut self) -> Vec<Box<dyn EventSource>>;
}

impl<F> SourceProvider for F
where
    F: FnMut() -> Vec<Box<dyn EventSource>> + Send,
{
    fn sources(&mut self) -> Vec<Box<dyn EventSource>> {
        self()
    }
}
