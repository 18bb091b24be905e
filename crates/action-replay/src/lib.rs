//! action-replay: interaction recording and time-paced replay
//!
//! This crate records timestamped pointer interaction from one or more
//! event sources into an append-only log, and replays that log through a
//! rendering sink at an adjustable speed, preserving the original relative
//! timing.
//!
//! # Features
//!
//! - **Single-attach recording**: every source is attached once per
//!   recording and merged by one task ([`ActionBuffer`])
//! - **Fan-out log**: any number of readers and players, each with its own
//!   cursor ([`ActionLog`])
//! - **Tick-driven playback** with coalesced batches and a virtual clock
//!   ([`Player`])
//! - **Session state machine** for record/play/stop ([`SessionController`])
//! - **Layered configuration** from defaults, TOML and `ACTION_REPLAY_*`
//!   environment variables
//! - **Tracing subscriber setup** (feature: `subscriber`)
//!
//! # Example
//!
//! ```ignore
//! use action_replay::prelude::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let log = ActionLog::from_events(vec![
//!         Event::pointer_move(0, 10.0, 10.0),
//!         Event::click(50, 12.0, 14.0),
//!     ]);
//!     let mut sink = CollectingSink::new();
//!     let mut playback = Player::new().play(log.snapshot(), 2.0)?;
//!     playback.run(&mut sink).await?;
//!     assert_eq!(sink.events().len(), 2);
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod event;
pub mod log;
pub mod player;
pub mod prelude;
pub mod session;
pub mod sink;
pub mod source;
pub mod util;

/// Tracing subscriber installation.
#[cfg(feature = "subscriber")]
pub mod logging;

pub use buffer::{ActionBuffer, Recording, RecordingEnd};
pub use config::{LoggingConfig, RecordingLimits, ReplayConfig};
pub use error::{ReplayError, Result, SinkError, SourceError};
pub use event::{Event, EventKind, Point, Timestamp};
pub use log::{ActionLog, LogReader, LogSnapshot, LogStatus};
pub use player::{Batch, Playback, PlaybackEnd, Player, VirtualClock};
pub use session::{
    CallbackHooks, ControlRequest, ExitReason, LifecycleEvent, NoHooks, SessionController,
    SessionHooks, SessionMode,
};
pub use sink::{BatchSink, CollectingSink, FnSink, NullSink};
pub use source::{
    ChannelSource, EventSource, ScriptStep, ScriptedSource, SourceHandle, SourceProvider,
    WanderSource,
};
pub use util::{CancelToken, CaptureClock};
