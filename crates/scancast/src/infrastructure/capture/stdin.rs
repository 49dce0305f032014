//! Manual-entry frame source for the headless binary.
//!
//! The real product scans codes with a camera, which is outside this crate.
//! The headless binary still needs to exercise the full
//! filter → route → broadcast path, so each line typed on stdin is wrapped
//! in a [`Frame`] and "decoded" back into a [`DecodeEvent`] by
//! [`LineDecodeEngine`].  Everything downstream of the decode seam behaves
//! exactly as it would with a camera front end.

use std::time::Instant;

use async_trait::async_trait;
use scancast_core::{DecodeEvent, Symbology};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use super::{DecodeEngine, DecodeError, Frame, FrameSource};

/// Yields one frame per line typed on stdin; EOF ends the source.
pub struct StdinFrameSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinFrameSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for StdinFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        let line = self.lines.next_line().await.ok().flatten()?;
        Some(Frame {
            data: line.into_bytes(),
            width: 0,
            height: 0,
            rotation_degrees: 0,
        })
    }
}

/// "Decodes" a manual-entry frame: the frame bytes are the payload.
///
/// Whitespace is trimmed; a blank line becomes an empty result set, which
/// the detection filter ignores like any frame with no code in view.
pub struct LineDecodeEngine;

#[async_trait]
impl DecodeEngine for LineDecodeEngine {
    async fn decode(&self, frame: &Frame) -> Result<Vec<DecodeEvent>, DecodeError> {
        let payload = String::from_utf8_lossy(&frame.data).trim().to_string();
        if payload.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![DecodeEvent::new(
            payload,
            Symbology::Unknown,
            Instant::now(),
        )])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
