//! Application use-cases for scancast.
//!
//! - `scan_pipeline` – the capture/decode/filter worker.
//! - `route_scan` – dispatch of qualified scans by scan mode.

pub mod route_scan;
pub mod scan_pipeline;
