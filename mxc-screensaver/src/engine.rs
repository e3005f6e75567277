//! Slideshow state: rotation, transition picks, tier, metrics

use crate::governor::{FpsGovernor, RenderTier, TierChange};
use crate::metrics::UsageMetrics;
use crate::schedule::{Rotation, SLIDE_PERIOD, TAGLINE_PERIOD};
use crate::transitions::{Transition, TransitionPicker};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub url: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreensaverConfig {
    pub media: Vec<MediaItem>,
    pub taglines: Vec<String>,
    #[serde(default = "default_slide_secs")]
    pub slide_secs: u64,
    #[serde(default = "default_tagline_secs")]
    pub tagline_secs: u64,
}

fn default_slide_secs() -> u64 {
    SLIDE_PERIOD.as_secs()
}

fn default_tagline_secs() -> u64 {
    TAGLINE_PERIOD.as_secs()
}

impl Default for ScreensaverConfig {
    fn default() -> Self {
        Self {
            media: Vec::new(),
            taglines: Vec::new(),
            slide_secs: default_slide_secs(),
            tagline_secs: default_tagline_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreensaverStep {
    Slide {
        from: String,
        to: String,
        transition: Transition,
    },
    Tagline {
        index: usize,
        text: String,
    },
}

#[derive(Debug, Clone)]
pub struct Screensaver {
    config: ScreensaverConfig,
    picker: TransitionPicker,
    governor: FpsGovernor,
    slides: Rotation,
    taglines: Rotation,
    metrics: UsageMetrics,
}

impl Screensaver {
    pub fn new(config: ScreensaverConfig, picker: TransitionPicker, metrics: UsageMetrics) -> Self {
        let slides = Rotation::new(Duration::from_secs(config.slide_secs), config.media.len());
        let taglines = Rotation::new(
            Duration::from_secs(config.tagline_secs),
            config.taglines.len(),
        );
        Self {
            config,
            picker,
            governor: FpsGovernor::default(),
            slides,
            taglines,
            metrics,
        }
    }

    pub fn config(&self) -> &ScreensaverConfig {
        &self.config
    }

    /// Swap media/taglines; playback restarts at the first item
    pub fn reconfigure(&mut self, config: ScreensaverConfig) {
        self.slides = Rotation::new(Duration::from_secs(config.slide_secs), config.media.len());
        self.taglines = Rotation::new(
            Duration::from_secs(config.tagline_secs),
            config.taglines.len(),
        );
        self.config = config;
    }

    pub fn current_media(&self) -> Option<&MediaItem> {
        self.config.media.get(self.slides.index())
    }

    pub fn current_tagline(&self) -> Option<&str> {
        self.config
            .taglines
            .get(self.taglines.index())
            .map(String::as_str)
    }

    pub fn tier(&self) -> RenderTier {
        self.governor.tier()
    }

    pub fn metrics(&self) -> &UsageMetrics {
        &self.metrics
    }

    /// Advance the slideshow clock by `dt`
    pub fn advance(&mut self, dt: Duration) -> Vec<ScreensaverStep> {
        let mut steps = Vec::new();
        let slide_period = self.slides.period();

        for to_index in self.slides.advance(dt) {
            let len = self.config.media.len();
            let from_index = (to_index + len - 1) % len;
            let from = self.config.media[from_index].id.clone();
            let to = self.config.media[to_index].id.clone();

            let transition = self.picker.pick();
            self.metrics.record_view(&from, slide_period);
            self.metrics.record_cycle(transition);

            steps.push(ScreensaverStep::Slide {
                from,
                to,
                transition,
            });
        }

        for index in self.taglines.advance(dt) {
            steps.push(ScreensaverStep::Tagline {
                index,
                text: self.config.taglines[index].clone(),
            });
        }
        steps
    }

    pub fn record_fps(&mut self, fps: f64) -> Option<TierChange> {
        self.governor.record_sample(fps)
    }

    /// Record a view with its own duration (videos end on their own)
    pub fn record_view(&mut self, media_id: &str, duration: Duration) {
        self.metrics.record_view(media_id, duration);
    }
}
