//! Slide transitions and the weighted picker

use crate::prng::Mulberry32;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Fade,
    SlideLeft,
    SlideUp,
    ZoomIn,
    KenBurns,
    Blur,
}

/// Fade is listed twice so it comes up twice as often as the others
pub const WEIGHTED_TRANSITIONS: [Transition; 7] = [
    Transition::Fade,
    Transition::SlideLeft,
    Transition::Fade,
    Transition::SlideUp,
    Transition::ZoomIn,
    Transition::KenBurns,
    Transition::Blur,
];

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Fade => "fade",
            Transition::SlideLeft => "slide_left",
            Transition::SlideUp => "slide_up",
            Transition::ZoomIn => "zoom_in",
            Transition::KenBurns => "ken_burns",
            Transition::Blur => "blur",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransitionPicker {
    rng: Mulberry32,
}

impl TransitionPicker {
    pub fn new(rng: Mulberry32) -> Self {
        Self { rng }
    }

    pub fn with_seed(seed: u32) -> Self {
        Self::new(Mulberry32::new(seed))
    }

    pub fn pick(&mut self) -> Transition {
        WEIGHTED_TRANSITIONS[self.rng.next_index(WEIGHTED_TRANSITIONS.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_same_seed_same_picks() {
        let mut a = TransitionPicker::with_seed(2024);
        let mut b = TransitionPicker::with_seed(2024);
        let picks_a: Vec<_> = (0..50).map(|_| a.pick()).collect();
        let picks_b: Vec<_> = (0..50).map(|_| b.pick()).collect();
        assert_eq!(picks_a, picks_b);
    }

    #[test]
    fn test_fade_is_favoured() {
        let mut picker = TransitionPicker::with_seed(5);
        let mut counts: HashMap<Transition, usize> = HashMap::new();
        for _ in 0..70_000 {
            *counts.entry(picker.pick()).or_default() += 1;
        }
        let fade = counts[&Transition::Fade];
        let zoom = counts[&Transition::ZoomIn];
        // expected 20000 vs 10000
        assert!(fade > zoom * 3 / 2, "fade={} zoom={}", fade, zoom);
        assert_eq!(counts.len(), 6);
    }
}
