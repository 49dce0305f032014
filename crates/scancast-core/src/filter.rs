//! DetectionFilter: deduplication and throttling of raw decode events.
//!
//! Decode engines report the same code on every frame while it remains in
//! view — at 30 fps that is 30 identical results per second.  Without a
//! filter the broadcast server would flood every connected client and the
//! presentation layer would re-trigger haptics/audio continuously.
//!
//! # Acceptance policy
//!
//! For each evaluation batch (the decode results of one frame) the filter
//! surfaces **at most one** qualified event:
//!
//! 1. While suspended, nothing is ever accepted.
//! 2. Events are scanned in engine order; empty payloads are skipped.
//! 3. An event identical to the last accepted payload is skipped while the
//!    throttle window since the last acceptance has not yet elapsed.
//! 4. The first event that survives 2–3 is accepted and returned
//!    immediately; the rest of the batch is ignored.
//!
//! Step 4 preserves the surfaced contract of the original scanner: when
//! several codes are visible in one frame, only the first reported one is
//! surfaced.  Changing this would alter user-visible scan selection, so it
//! is deliberate, not an optimisation.
//!
//! # State discipline
//!
//! The filter performs no I/O and owns its state exclusively.  `evaluate`,
//! `suspend`, and `resume` are expected to be invoked serially from the
//! capture pipeline task; the type is deliberately not `Sync`-shared.

use std::time::{Duration, Instant};

use crate::event::{DecodeEvent, QualifiedEvent};

/// Default minimum gap before an identical payload is accepted again.
///
/// 300 ms is short enough to feel instant when re-scanning on purpose and
/// long enough to collapse the per-frame repeats of a code held in view.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_millis(300);

/// Duplicate/rate-limiting filter between the decode engine and the rest of
/// the pipeline.
///
/// `last_payload` and `last_accepted_at` are only ever written together, on
/// acceptance, so they always describe the same scan.
#[derive(Debug)]
pub struct DetectionFilter {
    last_payload: Option<String>,
    last_accepted_at: Option<Instant>,
    throttle_window: Duration,
    suspended: bool,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_THROTTLE_WINDOW)
    }
}

impl DetectionFilter {
    /// Creates a filter with the given throttle window.
    pub fn new(throttle_window: Duration) -> Self {
        Self {
            last_payload: None,
            last_accepted_at: None,
            throttle_window,
            suspended: false,
        }
    }

    /// Evaluates one batch of decode events and returns at most one
    /// qualified event.
    ///
    /// `now` is passed in rather than sampled internally so callers (and
    /// tests) control the clock.  Returning `None` is a normal outcome, not
    /// a failure.
    pub fn evaluate(&mut self, events: &[DecodeEvent], now: Instant) -> Option<QualifiedEvent> {
        if self.suspended {
            return None;
        }

        for event in events {
            if event.payload.is_empty() {
                continue;
            }

            if self.is_throttled(&event.payload, now) {
                continue;
            }

            self.last_payload = Some(event.payload.clone());
            self.last_accepted_at = Some(now);

            return Some(QualifiedEvent {
                raw_value: event.payload.clone(),
                symbology: event.symbology,
                detected_at: now,
            });
        }

        None
    }

    /// Gates the filter off.  Frames keep flowing through the pipeline while
    /// suspended (the preview stays live); they just never qualify.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Re-enables the filter and clears the duplicate-tracking state.
    ///
    /// Clearing is deliberate: resuming scanning signals the user intends to
    /// scan something new, so the same code scanned immediately after
    /// resuming is accepted again even inside the throttle window.
    pub fn resume(&mut self) {
        self.suspended = false;
        self.last_payload = None;
        self.last_accepted_at = None;
    }

    /// Whether the filter is currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether `payload` is a repeat of the last acceptance inside the
    /// throttle window.
    fn is_throttled(&self, payload: &str, now: Instant) -> bool {
        match (&self.last_payload, self.last_accepted_at) {
            (Some(last), Some(accepted_at)) => {
                last == payload && now.duration_since(accepted_at) < self.throttle_window
            }
            _ => false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Symbology;

    fn ev(payload: &str, at: Instant) -> DecodeEvent {
        DecodeEvent::new(payload, Symbology::Qr, at)
    }

    #[test]
    fn test_accepts_first_nonempty_payload() {
        let mut filter = DetectionFilter::default();
        let now = Instant::now();
        let result = filter.evaluate(&[ev("ABC123", now)], now);
        let qualified = result.expect("first scan must be accepted");
        assert_eq!(qualified.raw_value, "ABC123");
        assert_eq!(qualified.symbology, Symbology::Qr);
        assert_eq!(qualified.detected_at, now);
    }

    #[test]
    fn test_skips_empty_payloads_and_accepts_next() {
        let mut filter = DetectionFilter::default();
        let now = Instant::now();
        let batch = [ev("", now), ev("XYZ", now)];
        let result = filter.evaluate(&batch, now);
        assert_eq!(result.expect("non-empty payload must qualify").raw_value, "XYZ");
    }

    #[test]
    fn test_empty_batch_returns_none() {
        let mut filter = DetectionFilter::default();
        assert!(filter.evaluate(&[], Instant::now()).is_none());
    }

    #[test]
    fn test_identical_payload_inside_window_is_throttled() {
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(filter.evaluate(&[ev("X", t0)], t0).is_some());

        let t1 = t0 + Duration::from_millis(100);
        assert!(filter.evaluate(&[ev("X", t1)], t1).is_none());
    }

    #[test]
    fn test_identical_payload_after_window_is_accepted_again() {
        // Payload "X" at t = 0 ms, 100 ms, 400 ms with a
        // 300 ms window is accepted at t = 0 and t = 400 only.
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(filter.evaluate(&[ev("X", t0)], t0).is_some());

        let t1 = t0 + Duration::from_millis(100);
        assert!(filter.evaluate(&[ev("X", t1)], t1).is_none());

        let t2 = t0 + Duration::from_millis(400);
        assert!(filter.evaluate(&[ev("X", t2)], t2).is_some());
    }

    #[test]
    fn test_different_payload_inside_window_is_accepted() {
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(filter.evaluate(&[ev("A", t0)], t0).is_some());

        let t1 = t0 + Duration::from_millis(50);
        let result = filter.evaluate(&[ev("B", t1)], t1);
        assert_eq!(result.expect("different payload must qualify").raw_value, "B");
    }

    #[test]
    fn test_throttled_duplicate_falls_through_to_next_event_in_batch() {
        // A batch can contain the stale duplicate first and a fresh code
        // second; the duplicate is skipped, not the whole batch.
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(filter.evaluate(&[ev("A", t0)], t0).is_some());

        let t1 = t0 + Duration::from_millis(50);
        let batch = [ev("A", t1), ev("B", t1)];
        let result = filter.evaluate(&batch, t1);
        assert_eq!(result.expect("second event must qualify").raw_value, "B");
    }

    #[test]
    fn test_at_most_one_acceptance_per_batch() {
        let mut filter = DetectionFilter::default();
        let now = Instant::now();
        let batch = [ev("FIRST", now), ev("SECOND", now)];
        let result = filter.evaluate(&batch, now);
        // Only the first usable code is surfaced; SECOND is dropped for this
        // cycle and will qualify on a later frame if still in view.
        assert_eq!(result.expect("must accept one").raw_value, "FIRST");

        let later = now + Duration::from_millis(10);
        let result = filter.evaluate(&[ev("SECOND", later)], later);
        assert_eq!(result.expect("must accept on next cycle").raw_value, "SECOND");
    }

    #[test]
    fn test_suspended_filter_never_accepts() {
        let mut filter = DetectionFilter::default();
        filter.suspend();
        assert!(filter.is_suspended());
        let now = Instant::now();
        assert!(filter.evaluate(&[ev("ABC", now)], now).is_none());
    }

    #[test]
    fn test_resume_clears_duplicate_state() {
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        assert!(filter.evaluate(&[ev("SAME", t0)], t0).is_some());

        filter.suspend();
        filter.resume();

        // Identical payload immediately after resume must be accepted even
        // though the throttle window has not elapsed.
        let t1 = t0 + Duration::from_millis(10);
        assert!(filter.evaluate(&[ev("SAME", t1)], t1).is_some());
    }

    #[test]
    fn test_acceptance_updates_payload_and_timestamp_together() {
        let mut filter = DetectionFilter::new(Duration::from_millis(300));
        let t0 = Instant::now();
        filter.evaluate(&[ev("A", t0)], t0);

        // Accepting "B" replaces the tracked payload: "A" is immediately
        // acceptable again while "B" is now the throttled one.
        let t1 = t0 + Duration::from_millis(50);
        assert!(filter.evaluate(&[ev("B", t1)], t1).is_some());

        let t2 = t0 + Duration::from_millis(100);
        assert!(filter.evaluate(&[ev("B", t2)], t2).is_none());
        let t3 = t0 + Duration::from_millis(150);
        assert!(filter.evaluate(&[ev("A", t3)], t3).is_some());
    }
}
