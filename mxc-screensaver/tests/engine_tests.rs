//! Screensaver engine behaviour

use mxc_screensaver::engine::MediaKind;
use mxc_screensaver::{
    MediaItem, RenderTier, Screensaver, ScreensaverConfig, ScreensaverStep, TransitionPicker,
    UsageMetrics,
};
use std::time::Duration;

fn media(id: &str) -> MediaItem {
    MediaItem {
        id: id.to_string(),
        url: format!("https://cdn.example/{}.jpg", id),
        kind: MediaKind::Image,
    }
}

fn config() -> ScreensaverConfig {
    ScreensaverConfig {
        media: vec![media("a"), media("b"), media("c")],
        taglines: vec!["Welcome".to_string(), "Smile!".to_string()],
        ..Default::default()
    }
}

fn slides(steps: &[ScreensaverStep]) -> Vec<(String, String)> {
    steps
        .iter()
        .filter_map(|s| match s {
            ScreensaverStep::Slide { from, to, .. } => Some((from.clone(), to.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn test_slides_every_seven_seconds_taglines_every_eight() {
    let mut saver = Screensaver::new(config(), TransitionPicker::with_seed(1), UsageMetrics::default());

    let steps = saver.advance(Duration::from_secs(7));
    assert_eq!(slides(&steps), vec![("a".to_string(), "b".to_string())]);
    assert_eq!(steps.len(), 1);

    let steps = saver.advance(Duration::from_secs(1));
    assert_eq!(
        steps,
        vec![ScreensaverStep::Tagline {
            index: 1,
            text: "Smile!".to_string()
        }]
    );
    assert_eq!(saver.current_media().unwrap().id, "b");
    assert_eq!(saver.current_tagline(), Some("Smile!"));
}

#[test]
fn test_same_seed_same_transitions() {
    let mut a = Screensaver::new(config(), TransitionPicker::with_seed(77), UsageMetrics::default());
    let mut b = Screensaver::new(config(), TransitionPicker::with_seed(77), UsageMetrics::default());
    assert_eq!(
        a.advance(Duration::from_secs(70)),
        b.advance(Duration::from_secs(70))
    );
}

#[test]
fn test_metrics_track_cycles_and_views() {
    let mut saver = Screensaver::new(config(), TransitionPicker::with_seed(3), UsageMetrics::default());
    saver.advance(Duration::from_secs(21));

    let metrics = saver.metrics();
    assert_eq!(metrics.total_cycles, 3);
    assert_eq!(metrics.transition_cycles.values().sum::<u64>(), 3);
    assert_eq!(metrics.media_view_ms["a"], 7000);
    assert_eq!(metrics.media_view_ms["c"], 7000);
}

#[test]
fn test_tier_follows_fps() {
    let mut saver = Screensaver::new(config(), TransitionPicker::with_seed(3), UsageMetrics::default());
    for _ in 0..10 {
        saver.record_fps(12.0);
    }
    assert_eq!(saver.tier(), RenderTier::Low);
}

#[test]
fn test_reconfigure_restarts() {
    let mut saver = Screensaver::new(config(), TransitionPicker::with_seed(3), UsageMetrics::default());
    saver.advance(Duration::from_secs(14));
    saver.reconfigure(ScreensaverConfig {
        media: vec![media("x")],
        ..Default::default()
    });
    assert_eq!(saver.current_media().unwrap().id, "x");
    assert!(saver.advance(Duration::from_secs(30)).is_empty());
}

#[test]
fn test_metrics_survive_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.json");

    let mut saver = Screensaver::new(config(), TransitionPicker::with_seed(9), UsageMetrics::default());
    saver.advance(Duration::from_secs(7));
    saver.metrics().save(&path).unwrap();

    let loaded = UsageMetrics::load(&path).unwrap();
    assert_eq!(&loaded, saver.metrics());
}
