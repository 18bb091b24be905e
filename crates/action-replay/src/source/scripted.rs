//! Timed synthetic sources for tests and demos.
//!
//! A script is a list of steps, each waiting a delay before producing an
//! event (or a failure). Delays run on tokio time, so paused test runtimes
//! replay scripts instantly and deterministically.

use std::collections::VecDeque;
use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use serde_json::Value;

use super::{EventSource, EventStream};
use crate::error::SourceError;
use crate::event::{Event, EventKind};
use crate::util::CaptureClock;

/// A step in a script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit an event stamped with the recording clock.
    Live {
        /// Delay before the event.
        delay: Duration,
        /// Event kind.
        kind: EventKind,
        /// Event payload.
        data: Value,
    },
    /// Emit an event keeping its own timestamp.
    Exact {
        /// Delay before the event.
        delay: Duration,
        /// The event.
        event: Event,
    },
    /// Fail the source.
    Fail {
        /// Delay before the failure.
        delay: Duration,
        /// Failure message.
        message: String,
    },
}

impl ScriptStep {
    const fn delay(&self) -> Duration {
        match self {
            Self::Live { delay, .. } | Self::Exact { delay, .. } | Self::Fail { delay, .. } => {
                *delay
            }
        }
    }
}

/// A source that plays a fixed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    name: String,
    steps: VecDeque<ScriptStep>,
    hold_open: bool,
}

impl ScriptedSource {
    /// Create an empty script.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a script that emits the given events as-is, with no delays.
    #[must_use]
    pub fn from_events(name: impl Into<String>, events: impl IntoIterator<Item = Event>) -> Self {
        events
            .into_iter()
            .fold(Self::new(name), |script, event| script.exact(Duration::ZERO, event))
    }

    /// Add a step.
    #[must_use]
    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push_back(step);
        self
    }

    /// Emit a clock-stamped event after `delay`.
    #[must_use]
    pub fn after(self, delay: Duration, kind: EventKind, data: Value) -> Self {
        self.step(ScriptStep::Live { delay, kind, data })
    }

    /// Emit a clock-stamped event after `ms` milliseconds.
    #[must_use]
    pub fn after_ms(self, ms: u64, kind: EventKind, data: Value) -> Self {
        self.after(Duration::from_millis(ms), kind, data)
    }

    /// Emit an event with its own timestamp after `delay`.
    #[must_use]
    pub fn exact(self, delay: Duration, event: Event) -> Self {
        self.step(ScriptStep::Exact { delay, event })
    }

    /// Fail after `delay`.
    #[must_use]
    pub fn fail_after(self, delay: Duration, message: impl Into<String>) -> Self {
        self.step(ScriptStep::Fail {
            delay,
            message: message.into(),
        })
    }

    /// Keep the stream open after the last step instead of ending it.
    ///
    /// Real capture sources never end on their own; this mimics them.
    #[must_use]
    pub const fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Number of steps in the script.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if the script has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl EventSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(self: Box<Self>, clock: CaptureClock) -> EventStream {
        let hold_open = self.hold_open;
        let steps = stream::unfold(self.steps, move |mut steps| async move {
            let step = steps.pop_front()?;
            let delay = step.delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let item = match step {
                ScriptStep::Live { kind, data, .. } => Ok(Event::new(clock.now(), kind, data)),
                ScriptStep::Exact { event, .. } => Ok(event),
                ScriptStep::Fail { message, .. } => Err(SourceError::new(message)),
            };
            Some((item, steps))
        });

        if hold_open {
            steps.chain(stream::pending()).boxed()
        } else {
            steps.boxed()
        }
    }
}
