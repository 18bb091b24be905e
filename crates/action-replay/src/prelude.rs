//! Convenient re-exports for common action-replay usage.
//!
//! ```ignore
//! use action_replay::prelude::*;
//! ```

// Configuration
pub use crate::config::{LoggingConfig, RecordingLimits, ReplayConfig};

// Error handling
pub use crate::error::{ReplayError, Result, SinkError, SourceError};

// Events and logs
pub use crate::event::{Event, EventKind, Point, Timestamp};
pub use crate::log::{ActionLog, LogReader, LogSnapshot};

// Recording
pub use crate::buffer::{ActionBuffer, Recording, RecordingEnd};
pub use crate::source::{
    ChannelSource, EventSource, ScriptedSource, SourceHandle, SourceProvider, WanderSource,
};

// Playback
pub use crate::player::{Batch, Playback, PlaybackEnd, Player};
pub use crate::sink::{BatchSink, CollectingSink, FnSink, NullSink};

// Sessions
pub use crate::session::{
    ControlRequest, ExitReason, SessionController, SessionHooks, SessionMode,
};
