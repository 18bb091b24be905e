//! Capture clock for stamping live events.

use tokio::time::Instant;

use crate::event::Timestamp;

/// Milliseconds elapsed since a fixed origin.
///
/// Built on `tokio::time::Instant`, so paused test runtimes stamp events
/// deterministically. Clones share the origin.
#[derive(Debug, Clone, Copy)]
pub struct CaptureClock {
    origin: Instant,
}

impl CaptureClock {
    /// Start a clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Start a clock at the given instant.
    #[must_use]
    pub const fn from_origin(origin: Instant) -> Self {
        Self { origin }
    }

    /// The origin instant.
    #[must_use]
    pub const fn origin(&self) -> Instant {
        self.origin
    }

    /// Current capture timestamp.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

impl Default for CaptureClock {
    fn default() -> Self {
        Self::start()
    }
}
