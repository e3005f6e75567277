//! Fixed-period rotation over a list (slides every 7 s, taglines every 8 s)

use std::time::Duration;

pub const SLIDE_PERIOD: Duration = Duration::from_secs(7);
pub const TAGLINE_PERIOD: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct Rotation {
    period: Duration,
    elapsed: Duration,
    index: usize,
    len: usize,
}

impl Rotation {
    pub fn new(period: Duration, len: usize) -> Self {
        Self {
            period,
            elapsed: Duration::ZERO,
            index: 0,
            len,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left until the next step
    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.elapsed)
    }

    /// Advance the clock; returns the indices stepped to, in order.
    ///
    /// Lists with fewer than two entries never step.
    pub fn advance(&mut self, dt: Duration) -> Vec<usize> {
        let mut stepped = Vec::new();
        if self.period.is_zero() {
            return stepped;
        }

        self.elapsed += dt;
        while self.elapsed >= self.period {
            self.elapsed -= self.period;
            if self.len >= 2 {
                self.index = (self.index + 1) % self.len;
                stepped.push(self.index);
            }
        }
        stepped
    }

    /// Replace the list length, restarting from the first entry
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        self.index = 0;
        self.elapsed = Duration::ZERO;
    }
}
