use chat_core::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Wall-clock time that advances with tokio's clock.
///
/// Anchored to a wall-clock instant at creation and moved forward by
/// [`tokio::time::Instant`], so paused-time tests see a consistent clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            started: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed =
            TimeDelta::from_std(self.started.elapsed()).unwrap_or_else(|_| TimeDelta::zero());
        self.base + elapsed
    }
}
