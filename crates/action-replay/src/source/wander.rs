//! Seeded random pointer walk.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{EventSource, EventStream};
use crate::event::{Event, Point};
use crate::util::CaptureClock;

/// A source that wanders the pointer around a surface, clicking now and then.
#[derive(Debug, Clone)]
pub struct WanderSource {
    name: String,
    seed: u64,
    interval: Duration,
    count: usize,
    bounds: Point,
    step: f64,
    click_chance: f64,
}

impl WanderSource {
    /// Create a walk of `count` events, one every `interval`.
    #[must_use]
    pub fn new(name: impl Into<String>, seed: u64, interval: Duration, count: usize) -> Self {
        Self {
            name: name.into(),
            seed,
            interval,
            count,
            bounds: Point::new(800.0, 600.0),
            step: 12.0,
            click_chance: 0.05,
        }
    }

    /// Set the surface size the pointer stays within.
    ///
    /// Negative or NaN sizes are treated as zero.
    #[must_use]
    pub fn with_bounds(mut self, width: f64, height: f64) -> Self {
        self.bounds = Point::new(width.max(0.0), height.max(0.0));
        self
    }

    /// Set the maximum distance per step.
    #[must_use]
    pub const fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Set the probability that an event is a click, clamped to `0.0..=1.0`.
    ///
    /// NaN means never.
    #[must_use]
    pub fn with_click_chance(mut self, chance: f64) -> Self {
        self.click_chance = if chance.is_nan() {
            0.0
        } else {
            chance.clamp(0.0, 1.0)
        };
        self
    }
}

struct Walk {
    rng: StdRng,
    position: Point,
    remaining: usize,
}

impl EventSource for WanderSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn attach(self: Box<Self>, clock: CaptureClock) -> EventStream {
        let walk = Walk {
            rng: StdRng::seed_from_u64(self.seed),
            position: Point::new(self.bounds.x / 2.0, self.bounds.y / 2.0),
            remaining: self.count,
        };
        let Self {
            interval,
            bounds,
            step,
            click_chance,
            ..
        } = *self;
        let click_chance = click_chance.clamp(0.0, 1.0);
        let step = step.abs().max(f64::EPSILON);

        stream::unfold(walk, move |mut walk| async move {
            if walk.remaining == 0 {
                return None;
            }
            walk.remaining -= 1;
            tokio::time::sleep(interval).await;

            let dx = walk.rng.random_range(-step..step);
            let dy = walk.rng.random_range(-step..step);
            walk.position = Point::new(
                (walk.position.x + dx).clamp(0.0, bounds.x),
                (walk.position.y + dy).clamp(0.0, bounds.y),
            );
            let Point { x, y } = walk.position;
            let event = if walk.rng.random_bool(click_chance) {
                Event::click(clock.now(), x, y)
            } else {
                Event::pointer_move(clock.now(), x, y)
            };
            Some((Ok(event), walk))
        })
        .boxed()
    }
}
