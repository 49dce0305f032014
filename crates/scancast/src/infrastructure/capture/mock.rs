//! Mock frame source and decode engine for testing.
//!
//! Allows tests to drive the scan pipeline with synthetic frames and
//! scripted decode results without a camera or a real decode engine.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use scancast_core::DecodeEvent;
use tokio::sync::mpsc;

use super::{DecodeEngine, DecodeError, Frame, FrameSource};

/// A frame source fed through a channel.
///
/// Tests keep the returned sender and inject frames one at a time, which
/// makes the interleaving of frames and pipeline control commands fully
/// deterministic.  Dropping the sender ends the source (`next_frame`
/// returns `None`), which shuts the pipeline down cleanly.
pub struct MockFrameSource {
    rx: mpsc::Receiver<Frame>,
}

impl MockFrameSource {
    /// Creates the source together with the injection handle.
    pub fn new() -> (mpsc::Sender<Frame>, Self) {
        let (tx, rx) = mpsc::channel(16);
        (tx, Self { rx })
    }

    /// A minimal frame for tests that only care about the decode script.
    pub fn blank_frame() -> Frame {
        Frame {
            data: Vec::new(),
            width: 640,
            height: 480,
            rotation_degrees: 0,
        }
    }
}

#[async_trait]
impl FrameSource for MockFrameSource {
    async fn next_frame(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

/// A decode engine that replays a pre-loaded script.
///
/// Each `decode` call pops the next scripted result; once the script is
/// exhausted every frame decodes to an empty result set (no codes in view).
pub struct MockDecodeEngine {
    script: Mutex<VecDeque<Result<Vec<DecodeEvent>, DecodeError>>>,
}

impl MockDecodeEngine {
    pub fn with_script(script: Vec<Result<Vec<DecodeEvent>, DecodeError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl DecodeEngine for MockDecodeEngine {
    async fn decode(&self, _frame: &Frame) -> Result<Vec<DecodeEvent>, DecodeError> {
        let next = self.script.lock().expect("script lock poisoned").pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scancast_core::Symbology;
    use std::time::Instant;

    #[tokio::test]
    async fn test_mock_frame_source_yields_injected_frames_then_none() {
        let (tx, mut source) = MockFrameSource::new();
        tx.send(MockFrameSource::blank_frame()).await.unwrap();
        drop(tx);

        assert!(source.next_frame().await.is_some());
        assert!(source.next_frame().await.is_none(), "closed source must end");
    }

    #[tokio::test]
    async fn test_mock_decode_engine_replays_script_then_returns_empty() {
        let event = DecodeEvent::new("A", Symbology::Qr, Instant::now());
        let engine = MockDecodeEngine::with_script(vec![
            Ok(vec![event]),
            Err(DecodeError::Rejected("bad frame".into())),
        ]);
        let frame = MockFrameSource::blank_frame();

        let first = engine.decode(&frame).await.expect("scripted Ok");
        assert_eq!(first.len(), 1);
        assert!(engine.decode(&frame).await.is_err(), "scripted Err");
        assert!(engine.decode(&frame).await.expect("exhausted").is_empty());
    }
}
