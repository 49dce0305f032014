//! Scan event data model.
//!
//! Two event types flow through the pipeline:
//!
//! - [`DecodeEvent`] – one raw decode result from the decode engine.  The
//!   engine may report several per frame (multiple codes in view) and will
//!   report the same code again on every subsequent frame.  Decode events are
//!   transient: they exist for exactly one filter evaluation.
//!
//! - [`QualifiedEvent`] – a decode result that passed the detection filter.
//!   Immutable once constructed; handed to the broadcast server and to
//!   presentation collaborators (overlay, haptics, clipboard).

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The symbology (code family) reported by the decode engine.
///
/// Mirrors the format set the decode engine is configured for.  `Unknown`
/// covers anything the engine reports outside that set; the pipeline treats
/// all symbologies identically and only carries the tag through for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    Qr,
    Code128,
    Code39,
    Code93,
    Codabar,
    Ean8,
    Ean13,
    Itf,
    UpcA,
    UpcE,
    Pdf417,
    Aztec,
    DataMatrix,
    Unknown,
}

impl Symbology {
    /// Human-readable label used in log lines and the status display.
    pub fn label(&self) -> &'static str {
        match self {
            Symbology::Qr => "QR Code",
            Symbology::Code128 => "Code 128",
            Symbology::Code39 => "Code 39",
            Symbology::Code93 => "Code 93",
            Symbology::Codabar => "Codabar",
            Symbology::Ean8 => "EAN-8",
            Symbology::Ean13 => "EAN-13",
            Symbology::Itf => "ITF",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Pdf417 => "PDF417",
            Symbology::Aztec => "Aztec",
            Symbology::DataMatrix => "Data Matrix",
            Symbology::Unknown => "Unknown",
        }
    }
}

/// One raw decode result produced by the decode engine for a single frame.
#[derive(Debug, Clone)]
pub struct DecodeEvent {
    /// The decoded payload text.  May be empty for malformed codes; the
    /// filter skips empty payloads.
    pub payload: String,
    /// The code family the engine recognised.
    pub symbology: Symbology,
    /// When the engine produced this result.
    pub observed_at: Instant,
}

impl DecodeEvent {
    pub fn new(payload: impl Into<String>, symbology: Symbology, observed_at: Instant) -> Self {
        Self {
            payload: payload.into(),
            symbology,
            observed_at,
        }
    }
}

/// A decode result that passed deduplication/throttling and is eligible for
/// delivery to clients and presentation collaborators.
#[derive(Debug, Clone)]
pub struct QualifiedEvent {
    /// The decoded payload, delivered to clients verbatim.
    pub raw_value: String,
    /// The code family of the accepted code.
    pub symbology: Symbology,
    /// When the filter accepted the code.
    pub detected_at: Instant,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbology_labels_are_nonempty_and_distinct_for_common_formats() {
        let labels = [
            Symbology::Qr.label(),
            Symbology::Code128.label(),
            Symbology::Ean13.label(),
            Symbology::DataMatrix.label(),
        ];
        for label in labels {
            assert!(!label.is_empty());
        }
        assert_ne!(Symbology::Qr.label(), Symbology::Code128.label());
    }

    #[test]
    fn test_decode_event_new_stores_payload_and_symbology() {
        let now = Instant::now();
        let ev = DecodeEvent::new("ABC123", Symbology::Code128, now);
        assert_eq!(ev.payload, "ABC123");
        assert_eq!(ev.symbology, Symbology::Code128);
        assert_eq!(ev.observed_at, now);
    }
}
