//! Frame capture and decode infrastructure seams.
//!
//! Camera hardware and barcode decoding are external collaborators: the
//! pipeline only needs *something* that yields frames and *something* that
//! turns one frame into zero or more decode results.  Both are traits so
//! that:
//!
//! - a camera-equipped front end can plug in real implementations,
//! - the headless binary can feed manually typed payloads ([`stdin`]),
//! - tests can inject synthetic frames and scripted decode results
//!   ([`mock`]) without any hardware.
//!
//! # Why `async` traits?
//!
//! Waiting for the next camera frame and running a decode engine are both
//! operations that may suspend (frame cadence, ML inference off-thread).
//! Making the seams async keeps the pipeline task from ever blocking a
//! runtime worker thread while it waits.

use async_trait::async_trait;
use scancast_core::DecodeEvent;
use thiserror::Error;

pub mod mock;
pub mod stdin;

/// One image frame handed to the decode engine.
///
/// The pipeline never interprets the pixel data; it is an opaque payload for
/// the decode engine.  `rotation_degrees` carries the sensor orientation the
/// engine needs to decode upright.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u16,
}

/// Error type for decode engine invocations.
///
/// Decode errors are never fatal to the pipeline: the frame is skipped and
/// the next one is processed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The engine could not process this frame (bad format, bad dimensions).
    #[error("decode engine rejected the frame: {0}")]
    Rejected(String),
    /// The engine itself is gone (model unloaded, backing service stopped).
    #[error("decode engine unavailable: {0}")]
    Unavailable(String),
}

/// Trait abstracting the supply of successive camera frames.
///
/// Returning `None` means the source is exhausted or closed; the pipeline
/// shuts down cleanly.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Option<Frame>;
}

/// Trait abstracting the black-box barcode/QR decode engine.
///
/// Given one frame it returns zero or more raw decode results.  Engines
/// typically report the same code on every frame while it stays in view;
/// deduplication is the detection filter's job, not the engine's.
#[async_trait]
pub trait DecodeEngine: Send {
    async fn decode(&self, frame: &Frame) -> Result<Vec<DecodeEvent>, DecodeError>;
}
