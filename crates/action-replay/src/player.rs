//! Time-paced playback.
//!
//! A [`Playback`] samples a [`VirtualClock`] on a fixed tick. On every tick
//! it takes all pending events whose recorded time is at or before the
//! virtual time and yields them as one [`Batch`], in log order. Events are
//! read through the playback's own cursor; the shared log is never touched,
//! so any number of playbacks can run over the same log.
//!
//! Completion is reported one tick after the last batch. Cancellation ends
//! the playback without a completion, and [`Playback::end`] tells the two
//! apart.

use std::time::Duration;

use futures::Stream;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::{DEFAULT_TICK, ReplayConfig};
use crate::error::{ReplayError, Result, check_speed};
use crate::event::{Event, Timestamp};
use crate::log::{ActionLog, LogSnapshot};
use crate::sink::BatchSink;
use crate::util::CancelToken;

/// Maps wall-clock time onto recorded time.
///
/// `virtual(w) = origin_time + (w - started) * speed`, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VirtualClock {
    origin_time: Timestamp,
    started: Instant,
    speed: f64,
}

impl VirtualClock {
    /// Start a clock at `origin_time`, now.
    #[must_use]
    pub fn start(origin_time: Timestamp, speed: f64) -> Self {
        Self::at(origin_time, Instant::now(), speed)
    }

    /// Create a clock with an explicit wall-clock origin.
    #[must_use]
    pub const fn at(origin_time: Timestamp, started: Instant, speed: f64) -> Self {
        Self {
            origin_time,
            started,
            speed,
        }
    }

    /// Recorded time the clock started from.
    #[must_use]
    pub const fn origin_time(&self) -> Timestamp {
        self.origin_time
    }

    /// Speed multiplier.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Virtual time at the given wall-clock instant.
    #[must_use]
    pub fn time_at(&self, instant: Instant) -> f64 {
        let elapsed = instant.saturating_duration_since(self.started);
        let elapsed_ms = elapsed.as_nanos() as f64 / 1e6;
        elapsed_ms.mul_add(self.speed, self.origin_time as f64)
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.time_at(Instant::now())
    }

    /// Wall-clock time needed to reach recorded time `time`.
    #[must_use]
    pub fn wall_time_until(&self, time: Timestamp) -> Duration {
        let delta_ms = time.saturating_sub(self.origin_time).max(0) as f64;
        Duration::from_nanos((delta_ms * 1e6 / self.speed).round() as u64)
    }
}

/// Events that became due on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Due events, in log order.
    pub events: Vec<Event>,
    /// Virtual time the batch was cut at.
    pub virtual_time: f64,
    /// Log index of the first event.
    pub start: usize,
}

impl Batch {
    /// Create a batch.
    #[must_use]
    pub const fn new(events: Vec<Event>, virtual_time: f64, start: usize) -> Self {
        Self {
            events,
            virtual_time,
            start,
        }
    }

    /// Number of events in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterate over the events.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Every event was emitted.
    Completed,
    /// The playback was cancelled first.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackState {
    Running,
    /// Everything emitted; completion fires on the next tick.
    Draining,
    Ended(PlaybackEnd),
}

#[derive(Debug, Clone, Copy)]
enum Target {
    /// Play the first `n` events.
    Snapshot(usize),
    /// Play until the log is frozen and drained.
    Live,
}

/// Creates playbacks.
#[derive(Debug, Clone)]
pub struct Player {
    tick: Duration,
}

impl Default for Player {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl Player {
    /// Create a player with the default 10 ms tick.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a player with a custom tick. Zero is raised to one millisecond.
    #[must_use]
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Create a player from the engine configuration.
    #[must_use]
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self::with_tick(config.tick)
    }

    /// The tick interval.
    #[must_use]
    pub const fn tick(&self) -> Duration {
        self.tick
    }

    /// Play a snapshot at `speed`.
    ///
    /// Fails with [`ReplayError::InvalidSpeed`] before any timer starts.
    /// Must be called from within a tokio runtime.
    pub fn play(&self, snapshot: LogSnapshot, speed: f64) -> Result<Playback> {
        let speed = check_speed(speed)?;
        let clock = snapshot.first_time().map(|t0| VirtualClock::start(t0, speed));
        let len = snapshot.len();
        tracing::info!(events = len, speed, "Playback started");

        let state = if len == 0 {
            PlaybackState::Ended(PlaybackEnd::Completed)
        } else {
            PlaybackState::Running
        };
        Ok(self.build(snapshot.log().clone(), Target::Snapshot(len), clock, speed, state))
    }

    /// Play a log that may still be growing.
    ///
    /// The clock starts at the first event, on the first tick that sees one.
    /// The playback completes once the log is frozen and fully emitted.
    pub fn follow(&self, log: ActionLog, speed: f64) -> Result<Playback> {
        let speed = check_speed(speed)?;
        tracing::info!(events = log.len(), speed, "Live playback started");
        Ok(self.build(log, Target::Live, None, speed, PlaybackState::Running))
    }

    fn build(
        &self,
        log: ActionLog,
        target: Target,
        clock: Option<VirtualClock>,
        speed: f64,
        state: PlaybackState,
    ) -> Playback {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Playback {
            log,
            target,
            cursor: 0,
            clock,
            speed,
            interval,
            cancel: CancelToken::new(),
            state,
        }
    }
}

/// A running playback.
#[derive(Debug)]
pub struct Playback {
    log: ActionLog,
    target: Target,
    cursor: usize,
    clock: Option<VirtualClock>,
    speed: f64,
    interval: Interval,
    cancel: CancelToken,
    state: PlaybackState,
}

impl Playback {
    /// Playback speed.
    #[must_use]
    pub const fn speed(&self) -> f64 {
        self.speed
    }

    /// Number of events emitted so far.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// The virtual clock, once started.
    #[must_use]
    pub const fn clock(&self) -> Option<&VirtualClock> {
        self.clock.as_ref()
    }

    /// How the playback ended, if it has.
    #[must_use]
    pub const fn end(&self) -> Option<PlaybackEnd> {
        match self.state {
            PlaybackState::Ended(end) => Some(end),
            _ => None,
        }
    }

    /// Check if the playback has ended.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.end().is_some()
    }

    /// Token that cancels this playback from elsewhere.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Cancel the playback. No further batches are produced.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.is_finished() {
            self.finish(PlaybackEnd::Cancelled);
        }
    }

    fn finish(&mut self, end: PlaybackEnd) {
        self.state = PlaybackState::Ended(end);
        match end {
            PlaybackEnd::Completed => {
                tracing::info!(events = self.cursor, "Playback completed");
            }
            PlaybackEnd::Cancelled => {
                tracing::info!(events = self.cursor, "Playback cancelled");
            }
        }
    }

    fn exhausted(&self) -> bool {
        match self.target {
            Target::Snapshot(len) => self.cursor >= len,
            Target::Live => {
                let status = self.log.status();
                status.frozen && self.cursor >= status.len
            }
        }
    }

    fn collect_due(&mut self, now: Instant) -> Option<Batch> {
        let limit = match self.target {
            Target::Snapshot(len) => len,
            Target::Live => usize::MAX,
        };

        let clock = match self.clock {
            Some(clock) => clock,
            None => {
                let t0 = self.log.range(self.cursor, limit.min(self.cursor + 1));
                let clock = VirtualClock::at(t0.first()?.time, now, self.speed);
                self.clock = Some(clock);
                clock
            }
        };

        let virtual_time = clock.time_at(now);
        let events = self.log.due(self.cursor, limit, virtual_time);
        if events.is_empty() {
            return None;
        }

        let start = self.cursor;
        self.cursor += events.len();
        tracing::trace!(start, count = events.len(), virtual_time, "Batch due");
        Some(Batch::new(events, virtual_time, start))
    }

    /// Wait for the next batch.
    ///
    /// Returns `None` when the playback completes or is cancelled.
    /// Cancel-safe.
    pub async fn next_batch(&mut self) -> Option<Batch> {
        loop {
            match self.state {
                PlaybackState::Ended(_) => return None,
                PlaybackState::Draining | PlaybackState::Running => {}
            }

            let now = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    self.finish(PlaybackEnd::Cancelled);
                    return None;
                }
                now = self.interval.tick() => now,
            };

            if self.state == PlaybackState::Draining {
                self.finish(PlaybackEnd::Completed);
                return None;
            }

            let batch = self.collect_due(now);
            if self.exhausted() {
                self.state = PlaybackState::Draining;
            }
            if batch.is_some() {
                return batch;
            }
        }
    }

    /// Deliver every batch to `sink` until the playback ends.
    ///
    /// A sink failure cancels the playback and is returned.
    pub async fn run<S>(&mut self, sink: &mut S) -> Result<PlaybackEnd>
    where
        S: BatchSink + ?Sized,
    {
        while let Some(batch) = self.next_batch().await {
            if let Err(e) = sink.deliver(&batch) {
                self.cancel();
                return Err(ReplayError::Sink(e));
            }
        }
        Ok(self.end().unwrap_or(PlaybackEnd::Cancelled))
    }

    /// Turn the playback into a stream of batches.
    pub fn into_stream(self) -> impl Stream<Item = Batch> + Send {
        futures::stream::unfold(self, |mut playback| async move {
            let batch = playback.next_batch().await?;
            Some((batch, playback))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(batches: &[Batch]) -> Vec<Timestamp> {
        batches.iter().flat_map(|b| b.iter().map(|e| e.time)).collect()
    }

    #[test]
    fn clock_maps_wall_time() {
        let started = Instant::now();
        let clock = VirtualClock::at(100, started, 2.0);
        assert_eq!(clock.time_at(started), 100.0);
        assert_eq!(clock.time_at(started + Duration::from_millis(30)), 160.0);
        assert_eq!(clock.wall_time_until(160), Duration::from_millis(30));
    }

    #[test]
    fn wall_time_saturates_on_extreme_timestamps() {
        let started = Instant::now();
        let clock = VirtualClock::at(Timestamp::MIN, started, 1.0);
        assert!(clock.wall_time_until(Timestamp::MAX) > Duration::from_secs(1_000_000));

        let clock = VirtualClock::at(Timestamp::MAX, started, 1.0);
        assert_eq!(clock.wall_time_until(Timestamp::MIN), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_bad_speed() {
        let snapshot = LogSnapshot::from(vec![Event::click(0, 0.0, 0.0)]);
        let err = Player::new().play(snapshot.clone(), 0.0).unwrap_err();
        assert!(err.is_invalid_speed());
        assert!(Player::new().play(snapshot, -3.0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_log_completes_immediately() {
        let mut playback = Player::new().play(LogSnapshot::from(Vec::new()), 1.0).unwrap();
        assert!(playback.next_batch().await.is_none());
        assert_eq!(playback.end(), Some(PlaybackEnd::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn single_event_follows_general_rule() {
        let mut playback = Player::new()
            .play(LogSnapshot::from(vec![Event::click(500, 1.0, 1.0)]), 1.0)
            .unwrap();
        let batch = playback.next_batch().await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.start, 0);
        assert!(playback.next_batch().await.is_none());
        assert_eq!(playback.end(), Some(PlaybackEnd::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_is_coalesced() {
        let events = vec![
            Event::pointer_move(0, 0.0, 0.0),
            Event::pointer_move(1, 0.0, 0.0),
            Event::pointer_move(2, 0.0, 0.0),
            Event::pointer_move(3, 0.0, 0.0),
        ];
        let mut playback = Player::with_tick(Duration::from_millis(50))
            .play(LogSnapshot::from(events), 1.0)
            .unwrap();

        let first = playback.next_batch().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = playback.next_batch().await.unwrap();
        assert_eq!(times(&[second]), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_is_distinct_from_completion() {
        let events = vec![Event::click(0, 0.0, 0.0), Event::click(10_000, 0.0, 0.0)];
        let mut playback = Player::new().play(LogSnapshot::from(events), 1.0).unwrap();
        assert!(playback.next_batch().await.is_some());

        let token = playback.cancel_token();
        token.cancel();
        assert!(playback.next_batch().await.is_none());
        assert_eq!(playback.end(), Some(PlaybackEnd::Cancelled));
        assert_eq!(playback.position(), 1);
    }
}
