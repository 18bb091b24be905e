//! Session state machine.
//!
//! The [`SessionController`] owns the only live session and moves it
//! between [`SessionMode::Idle`], [`SessionMode::Recording`] and
//! [`SessionMode::Playing`]. Recording and playback are variants of one
//! enum, so both can never be active at once. All session state is mutated
//! from one logical task: [`SessionController::run`] multiplexes control
//! requests with playback ticks, live-echo reads and recording termination.
//!
//! Surface clearing and UI affordances are delegated to [`SessionHooks`];
//! drawing is delegated to a [`BatchSink`]. The controller only decides when
//! they happen.

use std::fmt;

use tokio::sync::mpsc;

use crate::buffer::{ActionBuffer, Recording, RecordingEnd};
use crate::config::ReplayConfig;
use crate::error::{ReplayError, Result, check_speed};
use crate::event::Event;
use crate::log::{ActionLog, LogReader};
use crate::player::{Batch, Playback, PlaybackEnd, Player};
use crate::sink::BatchSink;
use crate::source::SourceProvider;

/// The active mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Nothing active.
    #[default]
    Idle,
    /// Capturing events.
    Recording,
    /// Replaying the last recording.
    Playing,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Recording => f.write_str("recording"),
            Self::Playing => f.write_str("playing"),
        }
    }
}

/// Requests raised by the control collaborator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    /// Record button: start a recording, or stop whatever is active.
    Record,
    /// Play button: start playback, or stop whatever is active.
    Play,
    /// Speed selection changed.
    SpeedChanged(f64),
}

/// Why a mode was left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// A recording was stopped on request.
    Stopped,
    /// A recording ended on its own.
    Ended(RecordingEnd),
    /// A playback was interrupted by a request.
    Interrupted,
    /// A playback emitted every event.
    Completed,
    /// A collaborator failed and the run was aborted.
    Failed(String),
}

/// Entry and exit actions for session transitions.
pub trait SessionHooks: Send {
    /// Clear the drawing surface. Called before a recording or playback starts.
    fn clear_surface(&mut self) {}

    /// A mode became active.
    fn on_enter(&mut self, _mode: SessionMode) {}

    /// A mode ended and the session is idle again.
    fn on_exit(&mut self, _mode: SessionMode, _reason: &ExitReason) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SessionHooks for NoHooks {}

/// Lifecycle notifications, as delivered to [`CallbackHooks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The surface should be cleared.
    SurfaceCleared,
    /// A mode was entered.
    Entered(SessionMode),
    /// A mode was left.
    Exited(SessionMode, ExitReason),
}

/// Hooks that forward every lifecycle notification to a closure.
pub struct CallbackHooks<F> {
    callback: F,
}

impl<F> CallbackHooks<F>
where
    F: FnMut(LifecycleEvent) + Send,
{
    /// Wrap a closure.
    pub const fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> SessionHooks for CallbackHooks<F>
where
    F: FnMut(LifecycleEvent) + Send,
{
    fn clear_surface(&mut self) {
        (self.callback)(LifecycleEvent::SurfaceCleared);
    }

    fn on_enter(&mut self, mode: SessionMode) {
        (self.callback)(LifecycleEvent::Entered(mode));
    }

    fn on_exit(&mut self, mode: SessionMode, reason: &ExitReason) {
        (self.callback)(LifecycleEvent::Exited(mode, reason.clone()));
    }
}

impl<F> fmt::Debug for CallbackHooks<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHooks").finish_non_exhaustive()
    }
}

struct ActiveRecording {
    recording: Recording,
    echo: Option<LogReader>,
}

enum Session {
    Idle,
    Recording(ActiveRecording),
    Playing(Playback),
}

impl Session {
    const fn mode(&self) -> SessionMode {
        match self {
            Self::Idle => SessionMode::Idle,
            Self::Recording(_) => SessionMode::Recording,
            Self::Playing(_) => SessionMode::Playing,
        }
    }
}

/// Something the active session produced.
#[derive(Debug)]
enum Activity {
    RecordingEnded(Result<RecordingEnd>),
    Echo(Vec<Event>),
    Batch(Batch),
    PlaybackEnded(PlaybackEnd),
}

async fn next_echo(echo: &mut Option<LogReader>) -> Option<Vec<Event>> {
    match echo {
        Some(reader) => reader.next_batch().await,
        None => std::future::pending().await,
    }
}

fn echo_batch(reader: &LogReader, events: Vec<Event>) -> Batch {
    let start = reader.cursor() - events.len();
    let virtual_time = events.last().map_or(0.0, |e| e.time as f64);
    Batch::new(events, virtual_time, start)
}

/// Coordinates recording and playback.
pub struct SessionController<H, S> {
    buffer: ActionBuffer,
    player: Player,
    provider: Box<dyn SourceProvider>,
    hooks: H,
    sink: S,
    live_echo: bool,
    speed: f64,
    session: Session,
    last_recording: Option<ActionLog>,
}

impl<H, S> SessionController<H, S>
where
    H: SessionHooks,
    S: BatchSink,
{
    /// Create an idle controller.
    pub fn new(
        config: &ReplayConfig,
        provider: impl SourceProvider + 'static,
        hooks: H,
        sink: S,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            buffer: ActionBuffer::with_limits(config.recording.clone()),
            player: Player::from_config(config),
            provider: Box::new(provider),
            hooks,
            sink,
            live_echo: config.live_echo,
            speed: config.default_speed,
            session: Session::Idle,
            last_recording: None,
        })
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.session.mode()
    }

    /// Speed the next playback will use.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// The log of the last finished recording.
    #[must_use]
    pub const fn last_recording(&self) -> Option<&ActionLog> {
        self.last_recording.as_ref()
    }

    /// The log currently being recorded, if any.
    #[must_use]
    pub fn live_log(&self) -> Option<&ActionLog> {
        match &self.session {
            Session::Recording(active) => Some(active.recording.log()),
            _ => None,
        }
    }

    /// The lifecycle hooks.
    #[must_use]
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The rendering sink.
    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Handle one control request.
    ///
    /// Returns the mode after the request. Play without a usable recording
    /// is a no-op.
    pub async fn handle(&mut self, request: ControlRequest) -> Result<SessionMode> {
        tracing::debug!(?request, mode = %self.mode(), "Control request");
        match request {
            ControlRequest::Record => self.request_record().await,
            ControlRequest::Play => self.request_play().await,
            ControlRequest::SpeedChanged(speed) => {
                self.speed_changed(speed)?;
                Ok(self.mode())
            }
        }
    }

    /// Record button.
    pub async fn request_record(&mut self) -> Result<SessionMode> {
        match self.mode() {
            SessionMode::Idle => self.start_recording(),
            SessionMode::Recording => self.stop_recording(ExitReason::Stopped).await?,
            SessionMode::Playing => self.interrupt_playback(),
        }
        Ok(self.mode())
    }

    /// Play button.
    pub async fn request_play(&mut self) -> Result<SessionMode> {
        match self.mode() {
            SessionMode::Idle => self.start_playback()?,
            SessionMode::Recording => self.stop_recording(ExitReason::Stopped).await?,
            SessionMode::Playing => self.interrupt_playback(),
        }
        Ok(self.mode())
    }

    /// Select the speed for the next playback.
    ///
    /// A running playback keeps the speed it started with.
    pub fn speed_changed(&mut self, speed: f64) -> Result<()> {
        self.speed = check_speed(speed)?;
        tracing::debug!(speed, "Playback speed selected");
        Ok(())
    }

    fn start_recording(&mut self) {
        self.hooks.clear_surface();
        self.sink.reset();

        let recording = self.buffer.start(self.provider.sources());
        let echo = self.live_echo.then(|| recording.log().reader());
        self.session = Session::Recording(ActiveRecording { recording, echo });

        tracing::info!("Session entered recording");
        self.hooks.on_enter(SessionMode::Recording);
    }

    fn flush_echo(&mut self, echo: Option<LogReader>) -> Result<()> {
        let Some(mut reader) = echo else {
            return Ok(());
        };
        let events = reader.drain_available();
        if events.is_empty() {
            return Ok(());
        }
        let batch = echo_batch(&reader, events);
        self.sink.deliver(&batch).map_err(ReplayError::Sink)
    }

    /// Leave recording, keeping the log as the last recording.
    async fn stop_recording(&mut self, reason: ExitReason) -> Result<()> {
        let Session::Recording(active) = std::mem::replace(&mut self.session, Session::Idle)
        else {
            return Ok(());
        };
        let ActiveRecording { recording, echo } = active;
        let log = recording.log().clone();

        let stopped = recording.stop().await;
        self.last_recording = Some(log);
        let flushed = self.flush_echo(echo);

        let outcome = stopped.map(|_| ()).and(flushed);
        self.exit_recording(reason, outcome)
    }

    fn exit_recording(&mut self, reason: ExitReason, outcome: Result<()>) -> Result<()> {
        let events = self.last_recording.as_ref().map_or(0, ActionLog::len);
        match outcome {
            Ok(()) => {
                tracing::info!(events, ?reason, "Session left recording");
                self.hooks.on_exit(SessionMode::Recording, &reason);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(events, error = %e, "Recording aborted");
                self.hooks
                    .on_exit(SessionMode::Recording, &ExitReason::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    fn start_playback(&mut self) -> Result<()> {
        let Some(log) = self.last_recording.as_ref().filter(|log| !log.is_empty()) else {
            tracing::debug!("No recording to play; ignoring play request");
            return Ok(());
        };
        let snapshot = log.snapshot();
        let playback = self.player.play(snapshot, self.speed)?;

        self.hooks.clear_surface();
        self.sink.reset();
        self.session = Session::Playing(playback);

        tracing::info!(speed = self.speed, "Session entered playback");
        self.hooks.on_enter(SessionMode::Playing);
        Ok(())
    }

    fn interrupt_playback(&mut self) {
        if let Session::Playing(mut playback) = std::mem::replace(&mut self.session, Session::Idle)
        {
            playback.cancel();
            tracing::info!(delivered = playback.position(), "Playback interrupted");
            self.hooks.on_exit(SessionMode::Playing, &ExitReason::Interrupted);
        }
    }

    async fn next_activity(&mut self) -> Activity {
        match &mut self.session {
            Session::Idle => std::future::pending().await,
            Session::Recording(active) => {
                tokio::select! {
                    end = active.recording.finished() => Activity::RecordingEnded(end),
                    Some(events) = next_echo(&mut active.echo) => Activity::Echo(events),
                }
            }
            Session::Playing(playback) => match playback.next_batch().await {
                Some(batch) => Activity::Batch(batch),
                None => Activity::PlaybackEnded(playback.end().unwrap_or(PlaybackEnd::Cancelled)),
            },
        }
    }

    async fn apply(&mut self, activity: Activity) -> Result<SessionMode> {
        match activity {
            Activity::Echo(events) => {
                let batch = match &self.session {
                    Session::Recording(ActiveRecording {
                        echo: Some(reader), ..
                    }) => echo_batch(reader, events),
                    _ => return Ok(self.mode()),
                };
                if let Err(e) = self.sink.deliver(&batch) {
                    let error = ReplayError::Sink(e);
                    let message = error.to_string();
                    self.stop_recording(ExitReason::Failed(message)).await?;
                    return Err(error);
                }
            }
            Activity::RecordingEnded(end) => {
                let Session::Recording(active) =
                    std::mem::replace(&mut self.session, Session::Idle)
                else {
                    return Ok(self.mode());
                };
                let ActiveRecording { recording, echo } = active;
                let log = recording.log().clone();
                log.freeze();
                self.last_recording = Some(log);
                drop(recording);

                let flushed = self.flush_echo(echo);
                let reason = match &end {
                    Ok(end) => ExitReason::Ended(*end),
                    Err(_) => ExitReason::Stopped,
                };
                self.exit_recording(reason, end.map(|_| ()).and(flushed))?;
            }
            Activity::Batch(batch) => {
                if let Err(e) = self.sink.deliver(&batch) {
                    let error = ReplayError::Sink(e);
                    if let Session::Playing(mut playback) =
                        std::mem::replace(&mut self.session, Session::Idle)
                    {
                        playback.cancel();
                    }
                    tracing::warn!(error = %error, "Playback aborted");
                    self.hooks
                        .on_exit(SessionMode::Playing, &ExitReason::Failed(error.to_string()));
                    return Err(error);
                }
            }
            Activity::PlaybackEnded(PlaybackEnd::Completed) => {
                self.session = Session::Idle;
                tracing::info!("Playback completed");
                self.hooks.on_exit(SessionMode::Playing, &ExitReason::Completed);
                self.sink.reset();
            }
            Activity::PlaybackEnded(PlaybackEnd::Cancelled) => {
                self.session = Session::Idle;
                self.hooks.on_exit(SessionMode::Playing, &ExitReason::Interrupted);
            }
        }
        Ok(self.mode())
    }

    /// Wait for the active session to make progress and apply it.
    ///
    /// Delivers one batch, or handles one termination. Pends forever while
    /// idle.
    pub async fn advance(&mut self) -> Result<SessionMode> {
        let activity = self.next_activity().await;
        self.apply(activity).await
    }

    /// Drive the session from a request channel until it closes.
    ///
    /// Errors are logged and the loop continues; failed runs have already
    /// returned the session to idle. Whatever is active when the channel
    /// closes is stopped.
    pub async fn run(&mut self, mut requests: mpsc::Receiver<ControlRequest>) {
        loop {
            let result = tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                activity = self.next_activity() => self.apply(activity).await,
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, mode = %self.mode(), "Session request failed");
            }
        }
        self.shutdown().await;
    }

    /// Stop whatever is active.
    pub async fn shutdown(&mut self) {
        match self.mode() {
            SessionMode::Idle => {}
            SessionMode::Recording => {
                if let Err(e) = self.stop_recording(ExitReason::Stopped).await {
                    tracing::warn!(error = %e, "Recording failed during shutdown");
                }
            }
            SessionMode::Playing => self.interrupt_playback(),
        }
    }
}

impl<H, S> fmt::Debug for SessionController<H, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("mode", &self.session.mode())
            .field("speed", &self.speed)
            .field("live_echo", &self.live_echo)
            .field("last_recording", &self.last_recording)
            .finish()
    }
}
