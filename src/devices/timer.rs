//! Periodic timer device.
//!
//! Accumulates elapsed wall time and fires once per period. The machine
//! turns a firing into a pending `I0`; several periods elapsing between two
//! polls still produce a single pending bit.

use std::time::{Duration, Instant};

/// Default timer period: one second.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Timer {
    period: Duration,
    /// Time accumulated towards the next tick.
    elapsed: Duration,
    last_poll: Option<Instant>,
    ticks: u64,
}

impl Timer {
    /// A timer firing every `period`. A zero period disables it.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            elapsed: Duration::ZERO,
            last_poll: None,
            ticks: 0,
        }
    }

    /// Number of times the timer has fired.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Account for `dt` of elapsed time. Returns true if the timer fired.
    pub fn advance(&mut self, dt: Duration) -> bool {
        if self.period.is_zero() {
            return false;
        }

        self.elapsed += dt;
        if self.elapsed < self.period {
            return false;
        }

        let remainder = self.elapsed.as_nanos() % self.period.as_nanos();
        self.elapsed = Duration::from_nanos(remainder as u64);
        self.ticks += 1;
        true
    }

    /// Account for the wall time since the previous poll.
    pub fn poll(&mut self, now: Instant) -> bool {
        let dt = self
            .last_poll
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default();
        self.last_poll = Some(now);
        self.advance(dt)
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.last_poll = None;
        self.ticks = 0;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD)
    }
}
