//! # scancast-core
//!
//! Shared library for Scancast containing the scan event types and the
//! detection filter that sits between the decode engine and the broadcast
//! server.
//!
//! This crate is used by the application crate and by integration tests.
//! It has zero dependencies on OS APIs, camera hardware, or network sockets.
//!
//! # Architecture overview (for beginners)
//!
//! Scancast turns a device with a camera into a wireless barcode scanner:
//! every code held in front of the camera is pushed to all browsers connected
//! over the local network.  The pipeline looks like this:
//!
//! ```text
//! frame source ─► decode engine ─► DetectionFilter ─► BroadcastServer ─► clients
//!   (camera)       (black box)       (this crate)       (scancast crate)
//! ```
//!
//! This crate defines:
//!
//! - **`event`** – The data model: a [`DecodeEvent`] is one raw decode result
//!   straight out of the decode engine; a [`QualifiedEvent`] is a decode
//!   result that survived deduplication and is eligible for delivery.
//!
//! - **`filter`** – The [`DetectionFilter`].  Decode engines report the same
//!   code on every frame while it stays in view, so without a throttle the
//!   server would flood clients with identical payloads many times per
//!   second.  The filter accepts at most one event per evaluation batch and
//!   suppresses repeats of the last payload inside a short window.

pub mod event;
pub mod filter;

// Re-export the most-used types at the crate root so callers can write
// `scancast_core::QualifiedEvent` instead of the full module path.
pub use event::{DecodeEvent, QualifiedEvent, Symbology};
pub use filter::{DetectionFilter, DEFAULT_THROTTLE_WINDOW};
