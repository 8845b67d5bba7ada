//! Retry delay for the refresh loop.

use std::time::Duration;

/// Sleep between refresh cycles: the base interval after a success, doubling after
/// each consecutive failure up to a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDelay {
    base: Duration,
    ceiling: Duration,
    current: Duration,
}

impl RetryDelay {
    /// Starts at `base`. A `ceiling` below `base` is raised to `base`.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            current: base,
        }
    }

    /// Delay that the next sleep will use.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Base interval.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Upper bound for the delay.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// `true` while at least one failure has not been followed by a success.
    pub fn is_backing_off(&self) -> bool {
        self.current != self.base
    }

    /// Resets to the base interval and returns it.
    pub fn on_success(&mut self) -> Duration {
        self.current = self.base;
        self.current
    }

    /// Doubles the delay, capped at the ceiling, and returns it.
    pub fn on_failure(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.ceiling);
        self.current
    }

    /// Changes the base interval (mode switch). Outside of backoff the current delay
    /// follows the new base; during backoff it is kept within the new bounds.
    pub fn set_base(&mut self, base: Duration) {
        let backing_off = self.is_backing_off();
        self.base = base;
        self.ceiling = self.ceiling.max(base);
        self.current = if backing_off {
            self.current.clamp(base, self.ceiling)
        } else {
            base
        };
    }
}
