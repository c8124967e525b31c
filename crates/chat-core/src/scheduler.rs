use std::time::Duration;

use tracing::debug;

use crate::{clock::RandomSource, types::InjectionState};

/// Default lower bound of the delay between injected messages.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(5);
/// Default upper bound of the delay between injected messages.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);
/// Default progress tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Range the per-message delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionBounds {
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for InjectionBounds {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY, DEFAULT_MAX_DELAY)
    }
}

impl InjectionBounds {
    /// Bounds are reordered if given backwards. Configuration rejects
    /// reversed bounds before they get here.
    pub fn new(a: Duration, b: Duration) -> Self {
        Self {
            min_delay: a.min(b),
            max_delay: a.max(b),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Uniform draw over the whole milliseconds in `[min_delay, max_delay]`.
    pub fn draw_ms(&self, rng: &mut dyn RandomSource) -> u64 {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let buckets = (max - min + 1) as f64;
        (min + (rng.next_unit() * buckets) as u64).min(max)
    }
}

/// Injection loop phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPhase {
    /// Loop disabled.
    Idle,
    /// Waiting `delay_ms` from `started_at_ms` for the next message.
    Counting { started_at_ms: i64, delay_ms: u64 },
    /// Delay expired; a message is due and the loop must be re-armed.
    Firing,
}

/// What a tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerStep {
    /// Nothing to publish (idle, or already firing).
    Unchanged,
    /// Countdown advanced.
    Progress(InjectionState),
    /// Delay expired. The caller injects a message, then calls `rearm`.
    Fire,
}

/// Randomized countdown driving simulated message injection.
#[derive(Debug, Clone)]
pub struct InjectionScheduler {
    bounds: InjectionBounds,
    phase: InjectionPhase,
    state: InjectionState,
    loops_started: u64,
    fired: u64,
}

impl Default for InjectionScheduler {
    fn default() -> Self {
        Self::new(InjectionBounds::default())
    }
}

impl InjectionScheduler {
    pub fn new(bounds: InjectionBounds) -> Self {
        Self {
            bounds,
            phase: InjectionPhase::Idle,
            state: InjectionState::IDLE,
            loops_started: 0,
            fired: 0,
        }
    }

    pub fn phase(&self) -> InjectionPhase {
        self.phase
    }

    pub fn state(&self) -> InjectionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.phase != InjectionPhase::Idle
    }

    /// Number of times the loop was started from `Idle`.
    pub fn loops_started(&self) -> u64 {
        self.loops_started
    }

    /// Number of expiries since creation.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Start counting. Returns `None` when the loop is already running.
    pub fn enable(&mut self, now_ms: i64, rng: &mut dyn RandomSource) -> Option<InjectionState> {
        if self.is_active() {
            return None;
        }
        self.loops_started += 1;
        Some(self.arm(now_ms, rng))
    }

    /// Stop the loop. Returns `None` when it was not running.
    pub fn disable(&mut self) -> Option<InjectionState> {
        if !self.is_active() {
            return None;
        }
        debug!(fired = self.fired, "injection loop disabled");
        self.phase = InjectionPhase::Idle;
        self.state = InjectionState::IDLE;
        Some(self.state)
    }

    /// Advance the countdown to `now_ms`.
    pub fn tick(&mut self, now_ms: i64) -> SchedulerStep {
        let InjectionPhase::Counting {
            started_at_ms,
            delay_ms,
        } = self.phase
        else {
            return SchedulerStep::Unchanged;
        };

        let elapsed_ms = now_ms.saturating_sub(started_at_ms).max(0) as u64;
        if elapsed_ms >= delay_ms {
            self.phase = InjectionPhase::Firing;
            self.fired += 1;
            self.state = InjectionState {
                progress_percent: 100.0,
                seconds_remaining: 0,
                active: true,
            };
            return SchedulerStep::Fire;
        }

        self.state = InjectionState {
            progress_percent: progress_percent(elapsed_ms, delay_ms),
            seconds_remaining: ceil_secs(delay_ms - elapsed_ms),
            active: true,
        };
        SchedulerStep::Progress(self.state)
    }

    /// Re-enter counting after a fire. Returns `None` unless currently firing.
    pub fn rearm(&mut self, now_ms: i64, rng: &mut dyn RandomSource) -> Option<InjectionState> {
        if self.phase != InjectionPhase::Firing {
            return None;
        }
        Some(self.arm(now_ms, rng))
    }

    fn arm(&mut self, now_ms: i64, rng: &mut dyn RandomSource) -> InjectionState {
        let delay_ms = self.bounds.draw_ms(rng);
        debug!(delay_ms, "next injected message scheduled");
        self.phase = InjectionPhase::Counting {
            started_at_ms: now_ms,
            delay_ms,
        };
        self.state = InjectionState {
            progress_percent: 0.0,
            seconds_remaining: ceil_secs(delay_ms),
            active: true,
        };
        self.state
    }
}

fn progress_percent(elapsed_ms: u64, delay_ms: u64) -> f64 {
    if delay_ms == 0 {
        return 100.0;
    }
    (elapsed_ms as f64 / delay_ms as f64 * 100.0).min(100.0)
}

fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1_000)
}
