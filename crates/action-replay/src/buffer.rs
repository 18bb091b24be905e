//! Recording buffer.
//!
//! [`ActionBuffer::start`] attaches every source once and spawns a single
//! merge task that appends their events, in arrival order, to a fresh
//! [`ActionLog`]. Readers fan out from that log; sources are never attached
//! twice. The merge task is the only writer and freezes the log when it
//! ends, whatever the reason.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::SelectAll;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::RecordingLimits;
use crate::error::{ReplayError, Result};
use crate::log::ActionLog;
use crate::source::EventSource;
use crate::util::{CancelToken, CaptureClock};

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingEnd {
    /// Stopped on request.
    Stopped,
    /// Every source finished.
    SourcesExhausted,
    /// The event or duration limit was reached.
    LimitReached,
}

/// Starts recordings.
#[derive(Debug, Clone, Default)]
pub struct ActionBuffer {
    limits: RecordingLimits,
}

impl ActionBuffer {
    /// Create a buffer without recording limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with recording limits.
    #[must_use]
    pub const fn with_limits(limits: RecordingLimits) -> Self {
        Self { limits }
    }

    /// The limits applied to each recording.
    #[must_use]
    pub const fn limits(&self) -> &RecordingLimits {
        &self.limits
    }

    /// Start a recording over the given sources.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(&self, sources: Vec<Box<dyn EventSource>>) -> Recording {
        let log = ActionLog::new();
        let cancel = CancelToken::new();
        let clock = CaptureClock::start();

        tracing::info!(sources = sources.len(), "Recording started");

        let task = tokio::spawn(merge(
            sources,
            log.clone(),
            cancel.clone(),
            self.limits.clone(),
            clock,
        ));

        Recording {
            log,
            cancel,
            clock,
            task: Some(task),
        }
    }
}

/// A live recording.
///
/// Dropping the recording cancels it; the log stays readable through any
/// other handle.
#[derive(Debug)]
pub struct Recording {
    log: ActionLog,
    cancel: CancelToken,
    clock: CaptureClock,
    task: Option<JoinHandle<Result<RecordingEnd>>>,
}

impl Recording {
    /// The log being recorded into.
    #[must_use]
    pub const fn log(&self) -> &ActionLog {
        &self.log
    }

    /// Token that stops the recording when cancelled.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// The capture clock shared by this recording's sources.
    #[must_use]
    pub const fn clock(&self) -> CaptureClock {
        self.clock
    }

    /// Check if the merge task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the recording to end on its own.
    ///
    /// Resolves once, with the reason or the source failure; pends forever
    /// on later calls. Cancel-safe, so it can sit in a `select!` loop.
    pub async fn finished(&mut self) -> Result<RecordingEnd> {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.task = None;
        flatten(joined)
    }

    /// Stop the recording and return the frozen log.
    ///
    /// A source failure that happened before the stop is returned as the
    /// error; the events captured up to it stay in the log.
    pub async fn stop(mut self) -> Result<ActionLog> {
        self.cancel.cancel();
        let outcome = match self.task.take() {
            Some(task) => flatten(task.await).map(|_| ()),
            None => Ok(()),
        };
        self.log.freeze();
        tracing::info!(events = self.log.len(), "Recording stopped");
        outcome.map(|()| self.log.clone())
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn flatten(
    joined: std::result::Result<Result<RecordingEnd>, tokio::task::JoinError>,
) -> Result<RecordingEnd> {
    joined.map_err(|e| ReplayError::RecordingTaskFailed {
        message: e.to_string(),
    })?
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn merge(
    sources: Vec<Box<dyn EventSource>>,
    log: ActionLog,
    cancel: CancelToken,
    limits: RecordingLimits,
    clock: CaptureClock,
) -> Result<RecordingEnd> {
    let mut streams = SelectAll::new();
    for source in sources {
        let name: Arc<str> = Arc::from(source.name());
        tracing::debug!(source = %name, "Attaching event source");
        streams.push(
            source
                .attach(clock)
                .map(move |item| (Arc::clone(&name), item))
                .boxed(),
        );
    }

    let deadline = limits
        .max_duration
        .map(|limit: Duration| clock.origin() + limit);

    let end = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break Ok(RecordingEnd::Stopped),
            () = sleep_until(deadline) => {
                tracing::info!("Recording duration limit reached");
                break Ok(RecordingEnd::LimitReached);
            }
            next = streams.next() => match next {
                None => break Ok(RecordingEnd::SourcesExhausted),
                Some((_, Ok(event))) => {
                    let len = match log.append(event) {
                        Ok(index) => index + 1,
                        Err(e) => break Err(e),
                    };
                    if limits.max_events.is_some_and(|max| len >= max) {
                        tracing::info!(events = len, "Recording event limit reached");
                        break Ok(RecordingEnd::LimitReached);
                    }
                }
                Some((name, Err(error))) => {
                    tracing::warn!(source = %name, error = %error, "Event source failed");
                    break Err(ReplayError::source_delivery(name.as_ref(), &error));
                }
            },
        }
    };

    // Dropping the streams detaches every source.
    drop(streams);
    log.freeze();
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::source::ScriptedSource;

    #[tokio::test]
    async fn no_sources_gives_empty_log() {
        let mut recording = ActionBuffer::new().start(Vec::new());
        assert_eq!(
            recording.finished().await.unwrap(),
            RecordingEnd::SourcesExhausted
        );
        let log = recording.stop().await.unwrap();
        assert!(log.is_empty());
        assert!(log.is_frozen());
    }

    #[tokio::test(start_paused = true)]
    async fn event_limit_ends_recording() {
        let script = ScriptedSource::from_events(
            "script",
            (0..10).map(|i| Event::pointer_move(i, 0.0, 0.0)),
        )
        .hold_open();
        let buffer = ActionBuffer::with_limits(RecordingLimits::default().max_events(3));
        let mut recording = buffer.start(vec![Box::new(script)]);

        assert_eq!(recording.finished().await.unwrap(), RecordingEnd::LimitReached);
        assert_eq!(recording.log().len(), 3);
        assert!(recording.log().is_frozen());
    }

    #[tokio::test(start_paused = true)]
    async fn duration_limit_ends_recording() {
        let script = ScriptedSource::new("idle").hold_open();
        let buffer = ActionBuffer::with_limits(
            RecordingLimits::default().max_duration(Duration::from_millis(500)),
        );
        let mut recording = buffer.start(vec![Box::new(script)]);
        assert_eq!(recording.finished().await.unwrap(), RecordingEnd::LimitReached);
    }
}
