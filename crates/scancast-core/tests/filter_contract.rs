//! Integration tests for the detection filter contract.
//!
//! # Purpose
//!
//! These tests exercise the `DetectionFilter` through its *public* API in the
//! same way the capture pipeline uses it: one `evaluate` call per camera
//! frame, with the frame's decode results as the batch and a caller-supplied
//! clock.  They verify the two invariants the rest of the system relies on:
//!
//! - **Throttle invariant**: identical payloads arriving strictly less than
//!   one throttle window apart are accepted at most once; once the gap
//!   exceeds the window the payload qualifies again.
//! - **Suspend/resume invariant**: while suspended nothing ever qualifies,
//!   and immediately after `resume()` even the last-accepted payload
//!   qualifies again.
//!
//! # Why a simulated clock?
//!
//! `evaluate` takes `now: Instant` as a parameter instead of reading the
//! system clock, so these tests run instantly and deterministically — no
//! `sleep` calls, no flakiness from scheduler jitter.

use std::time::{Duration, Instant};

use scancast_core::{DecodeEvent, DetectionFilter, Symbology};

const WINDOW: Duration = Duration::from_millis(300);

fn frame(payload: &str, at: Instant) -> Vec<DecodeEvent> {
    vec![DecodeEvent::new(payload, Symbology::Qr, at)]
}

// ── Throttle invariant ────────────────────────────────────────────────────────

/// A code held in view produces a stream of identical decode events every
/// ~33 ms.  Only the first may be accepted inside one throttle window.
#[test]
fn test_rapid_identical_stream_accepts_exactly_one_per_window() {
    let mut filter = DetectionFilter::new(WINDOW);
    let t0 = Instant::now();

    let mut accepted = 0;
    for frame_index in 0..9 {
        // Frames at t = 0, 33, 66, ..., 264 ms — all inside one window.
        let now = t0 + Duration::from_millis(33 * frame_index);
        if filter.evaluate(&frame("SKU-42", now), now).is_some() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1, "only the first frame in the window may qualify");

    // The next frame after the window elapses qualifies again.
    let later = t0 + Duration::from_millis(301);
    assert!(filter.evaluate(&frame("SKU-42", later), later).is_some());
}

/// Payload "X" at t = 0 ms, 100 ms, and 400 ms with a 300 ms
/// window is accepted at t = 0 and t = 400 only.
#[test]
fn test_scenario_x_at_0_100_400_ms() {
    let mut filter = DetectionFilter::new(WINDOW);
    let t0 = Instant::now();

    let a0 = filter.evaluate(&frame("X", t0), t0);
    let t1 = t0 + Duration::from_millis(100);
    let a1 = filter.evaluate(&frame("X", t1), t1);
    let t2 = t0 + Duration::from_millis(400);
    let a2 = filter.evaluate(&frame("X", t2), t2);

    assert!(a0.is_some(), "t=0 must be accepted");
    assert!(a1.is_none(), "t=100 is inside the window and must be throttled");
    assert!(a2.is_some(), "t=400 is outside the window and must be accepted");
}

/// The window restarts on every acceptance, not on every observation: a
/// throttled repeat must not extend the window.
#[test]
fn test_throttled_repeat_does_not_extend_window() {
    let mut filter = DetectionFilter::new(WINDOW);
    let t0 = Instant::now();
    assert!(filter.evaluate(&frame("X", t0), t0).is_some());

    // Throttled observation at t=250 must not push the window to t=550.
    let t1 = t0 + Duration::from_millis(250);
    assert!(filter.evaluate(&frame("X", t1), t1).is_none());

    let t2 = t0 + Duration::from_millis(310);
    assert!(
        filter.evaluate(&frame("X", t2), t2).is_some(),
        "window is measured from the last acceptance at t=0"
    );
}

// ── Suspend/resume invariant ──────────────────────────────────────────────────

/// While suspended, `evaluate` never returns a qualified event regardless of
/// input; resuming restores normal acceptance.
#[test]
fn test_suspend_blocks_all_acceptance() {
    let mut filter = DetectionFilter::new(WINDOW);
    filter.suspend();

    let t0 = Instant::now();
    for i in 0..5 {
        let now = t0 + Duration::from_millis(100 * i);
        let payload = format!("CODE-{i}");
        let batch = frame(&payload, now);
        assert!(filter.evaluate(&batch, now).is_none(), "suspended filter must reject");
    }

    filter.resume();
    let now = t0 + Duration::from_millis(600);
    assert!(filter.evaluate(&frame("CODE-0", now), now).is_some());
}

/// Resuming signals intent to scan something new: the payload accepted just
/// before suspension qualifies again immediately after `resume()`.
#[test]
fn test_resume_accepts_previous_payload_immediately() {
    let mut filter = DetectionFilter::new(WINDOW);
    let t0 = Instant::now();
    assert!(filter.evaluate(&frame("TICKET-7", t0), t0).is_some());

    filter.suspend();
    filter.resume();

    let t1 = t0 + Duration::from_millis(1);
    assert!(
        filter.evaluate(&frame("TICKET-7", t1), t1).is_some(),
        "resume must clear the duplicate-tracking state"
    );
}
