//! Scan cooldown
//!
//! A trigger carrying the same code as the last accepted trigger is
//! suppressed until the cooldown window has elapsed. Suppressed triggers do
//! not extend the window; a different code is accepted immediately.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl ScanDebouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn from_millis(window_ms: u64) -> Self {
        Self::new(Duration::from_millis(window_ms))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` when `code` would be acted on, without recording it.
    pub fn would_accept(&self, code: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_code, accepted_at)) => {
                last_code != code || now.saturating_duration_since(*accepted_at) >= self.window
            }
            None => true,
        }
    }

    /// Start the window for `code`
    pub fn record(&mut self, code: &str, now: Instant) {
        self.last = Some((code.to_string(), now));
    }

    /// Returns `true` when `code` should be acted on, and records it.
    pub fn accept(&mut self, code: &str, now: Instant) -> bool {
        if !self.would_accept(code, now) {
            return false;
        }
        self.record(code, now);
        true
    }

    /// Forget the last accepted code
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_code_suppressed_within_window() {
        let mut d = ScanDebouncer::from_millis(3000);
        let t0 = Instant::now();
        assert!(d.accept("123", t0));
        assert!(!d.accept("123", t0 + Duration::from_millis(2999)));
        assert!(d.accept("123", t0 + Duration::from_millis(3000)));
    }

    #[test]
    fn test_suppressed_trigger_does_not_extend_window() {
        let mut d = ScanDebouncer::from_millis(3000);
        let t0 = Instant::now();
        assert!(d.accept("123", t0));
        assert!(!d.accept("123", t0 + Duration::from_millis(2500)));
        // Window still measured from t0
        assert!(d.accept("123", t0 + Duration::from_millis(3100)));
    }

    #[test]
    fn test_different_code_accepted_immediately() {
        let mut d = ScanDebouncer::from_millis(3000);
        let t0 = Instant::now();
        assert!(d.accept("123", t0));
        assert!(d.accept("456", t0 + Duration::from_millis(10)));
        // "123" is no longer the last accepted code
        assert!(d.accept("123", t0 + Duration::from_millis(20)));
    }

    #[test]
    fn test_reset() {
        let mut d = ScanDebouncer::from_millis(3000);
        let t0 = Instant::now();
        assert!(d.accept("123", t0));
        d.reset();
        assert!(d.accept("123", t0 + Duration::from_millis(1)));
    }

    #[test]
    fn test_would_accept_does_not_record() {
        let mut d = ScanDebouncer::from_millis(3000);
        let t0 = Instant::now();
        assert!(d.would_accept("123", t0));
        assert!(d.would_accept("123", t0 + Duration::from_millis(10)));
        d.record("123", t0);
        assert!(!d.would_accept("123", t0 + Duration::from_millis(10)));
        assert!(d.would_accept("456", t0 + Duration::from_millis(10)));
    }
}
