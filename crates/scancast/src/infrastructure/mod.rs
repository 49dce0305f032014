//! Infrastructure services for the scancast application.
//!
//! - `capture` – frame-source and decode-engine collaborator seams.
//! - `network` – the broadcast server and local-address helpers.
//! - `storage` – TOML settings persistence.

pub mod capture;
pub mod network;
pub mod storage;
