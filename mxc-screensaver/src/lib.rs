//! Screensaver orchestration for the MaxCheckin kiosk
//!
//! - [`prng::Mulberry32`]: seeded generator, same seed → same picks
//! - [`transitions::TransitionPicker`]: weighted-random transition choice
//! - [`governor::FpsGovernor`]: downgrades/upgrades the rendering tier
//! - [`schedule::Rotation`]: fixed-period slide and tagline rotation
//! - [`metrics::UsageMetrics`]: informational usage counters on local disk
//! - [`engine::Screensaver`]: the above wired together

pub mod engine;
pub mod error;
pub mod governor;
pub mod metrics;
pub mod prng;
pub mod schedule;
pub mod transitions;

pub use engine::{MediaItem, MediaKind, Screensaver, ScreensaverConfig, ScreensaverStep};
pub use error::{Result, ScreensaverError};
pub use governor::{FpsGovernor, RenderTier, TierChange};
pub use metrics::UsageMetrics;
pub use prng::Mulberry32;
pub use transitions::{Transition, TransitionPicker};
