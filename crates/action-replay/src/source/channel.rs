//! Push-based source fed by a capture layer.

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{EventSource, EventStream};
use crate::error::SourceError;
use crate::event::{Event, EventKind};
use crate::util::CaptureClock;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
enum Capture {
    /// Stamp with the recording clock on delivery.
    Live(EventKind, Value),
    /// Keep the supplied timestamp.
    Timed(Event),
    /// Report a capture failure.
    Failed(String),
}

/// A source that receives events pushed through a [`SourceHandle`].
#[derive(Debug)]
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<Capture>,
}

impl ChannelSource {
    /// Create a source and the handle that feeds it.
    #[must_use]
    pub fn new(name: impl Into<String>) -> (Self, SourceHandle) {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    /// Create a source with a specific channel capacity.
    #[must_use]
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> (Self, SourceHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let name = name.into();
        (
            Self {
                name: name.clone(),
                rx,
            },
            SourceHandle { name, tx },
        )
    }
}

impl EventSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(self: Box<Self>, clock: CaptureClock) -> EventStream {
        ReceiverStream::new(self.rx)
            .map(move |capture| match capture {
                Capture::Live(kind, data) => Ok(Event::new(clock.now(), kind, data)),
                Capture::Timed(event) => Ok(event),
                Capture::Failed(message) => Err(SourceError::new(message)),
            })
            .boxed()
    }
}

/// Sending half of a [`ChannelSource`].
///
/// Sends fail once the recording that attached the source has stopped.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    name: String,
    tx: mpsc::Sender<Capture>,
}

impl SourceHandle {
    /// Name of the source this handle feeds.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, capture: Capture) -> Result<(), SourceError> {
        self.tx
            .send(capture)
            .await
            .map_err(|_| SourceError::new(format!("source '{}' is detached", self.name)))
    }

    /// Emit an event stamped with the recording clock.
    pub async fn emit(&self, kind: EventKind, data: Value) -> Result<(), SourceError> {
        self.send(Capture::Live(kind, data)).await
    }

    /// Emit an event that already carries its capture timestamp.
    pub async fn emit_event(&self, event: Event) -> Result<(), SourceError> {
        self.send(Capture::Timed(event)).await
    }

    /// Emit without waiting; fails if the channel is full or detached.
    pub fn try_emit(&self, kind: EventKind, data: Value) -> Result<(), SourceError> {
        self.tx
            .try_send(Capture::Live(kind, data))
            .map_err(|e| SourceError::new(format!("source '{}': {e}", self.name)))
    }

    /// Emit a pointer move.
    pub async fn pointer_move(&self, x: f64, y: f64) -> Result<(), SourceError> {
        self.emit(EventKind::Move, serde_json::json!({ "x": x, "y": y }))
            .await
    }

    /// Emit a click.
    pub async fn click(&self, x: f64, y: f64) -> Result<(), SourceError> {
        self.emit(EventKind::Click, serde_json::json!({ "x": x, "y": y }))
            .await
    }

    /// Emit a scroll to the given offsets.
    pub async fn scroll(&self, x: f64, y: f64) -> Result<(), SourceError> {
        self.emit(EventKind::Scroll, serde_json::json!({ "x": x, "y": y }))
            .await
    }

    /// Report a capture failure, aborting the recording.
    pub async fn fail(&self, message: impl Into<String>) -> Result<(), SourceError> {
        self.send(Capture::Failed(message.into())).await
    }

    /// Check if the source has been detached.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
