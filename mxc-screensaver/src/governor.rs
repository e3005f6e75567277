//! FPS-driven rendering tier governor
//!
//! One FPS reading arrives per second. The High tier drops to Low when the
//! last 10 readings average below 30; Low climbs back to High when the last
//! 20 average above 55. The sample window is cleared on every switch so a
//! fresh tier is judged only on its own frames.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

pub const DOWNGRADE_WINDOW: usize = 10;
pub const DOWNGRADE_BELOW_FPS: f64 = 30.0;
pub const UPGRADE_WINDOW: usize = 20;
pub const UPGRADE_ABOVE_FPS: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderTier {
    High,
    Low,
}

impl RenderTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderTier::High => "high",
            RenderTier::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierChange {
    pub from: RenderTier,
    pub to: RenderTier,
    pub average_fps: f64,
}

#[derive(Debug, Clone)]
pub struct FpsGovernor {
    tier: RenderTier,
    samples: VecDeque<f64>,
}

impl Default for FpsGovernor {
    fn default() -> Self {
        Self::new(RenderTier::High)
    }
}

impl FpsGovernor {
    pub fn new(tier: RenderTier) -> Self {
        Self {
            tier,
            samples: VecDeque::with_capacity(UPGRADE_WINDOW),
        }
    }

    pub fn tier(&self) -> RenderTier {
        self.tier
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Record one per-second FPS reading; returns the switch, if any
    pub fn record_sample(&mut self, fps: f64) -> Option<TierChange> {
        if !fps.is_finite() || fps < 0.0 {
            return None;
        }

        self.samples.push_back(fps);
        while self.samples.len() > UPGRADE_WINDOW {
            self.samples.pop_front();
        }

        let (window, next) = match self.tier {
            RenderTier::High => (DOWNGRADE_WINDOW, RenderTier::Low),
            RenderTier::Low => (UPGRADE_WINDOW, RenderTier::High),
        };
        let average = self.trailing_average(window)?;

        let switch = match self.tier {
            RenderTier::High => average < DOWNGRADE_BELOW_FPS,
            RenderTier::Low => average > UPGRADE_ABOVE_FPS,
        };
        if !switch {
            return None;
        }

        let change = TierChange {
            from: self.tier,
            to: next,
            average_fps: average,
        };
        info!(
            from = change.from.as_str(),
            to = change.to.as_str(),
            average_fps = average,
            "Screensaver rendering tier changed"
        );
        self.tier = next;
        self.samples.clear();
        Some(change)
    }

    /// Average of the newest `window` samples; `None` until that many exist
    pub fn trailing_average(&self, window: usize) -> Option<f64> {
        if window == 0 || self.samples.len() < window {
            return None;
        }
        let sum: f64 = self.samples.iter().rev().take(window).sum();
        Some(sum / window as f64)
    }
}
