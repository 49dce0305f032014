//! Scan-mode routing: where a qualified scan goes once the filter accepts it.
//!
//! The pipeline itself is mode-agnostic — it only ever emits
//! [`QualifiedEvent`]s.  This module owns the one place that decides what to
//! do with them, keyed by the user-chosen [`ScanMode`]:
//!
//! - `WifiBroadcast` – push the payload to every connected browser.
//! - `CopyOnly` – hand the payload to the clipboard collaborator.
//! - `HidEmulation` – reserved; the original product advertises Bluetooth
//!   keyboard emulation as "coming soon" and so do we.
//!
//! Presentation reactions (overlay, haptics, audio) are collaborators wired
//! by the owning application and are not routed here.

use scancast_core::QualifiedEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::infrastructure::network::{BroadcastError, BroadcastServer};

/// Destination for qualified scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Broadcast scans to browsers on the local network.
    #[default]
    WifiBroadcast,
    /// Copy the payload to the clipboard, nothing else.
    CopyOnly,
    /// Act as a Bluetooth keyboard (not implemented yet).
    HidEmulation,
}

impl ScanMode {
    /// Short name shown in the mode picker and status line.
    pub fn display_name(&self) -> &'static str {
        match self {
            ScanMode::WifiBroadcast => "WiFi Scanner",
            ScanMode::CopyOnly => "Copy Only",
            ScanMode::HidEmulation => "Bluetooth Keyboard",
        }
    }

    /// One-line description for the mode picker.
    pub fn description(&self) -> &'static str {
        match self {
            ScanMode::WifiBroadcast => "Broadcast scans to browsers via WiFi",
            ScanMode::CopyOnly => "Copy barcode to clipboard",
            ScanMode::HidEmulation => "Act as Bluetooth keyboard (coming soon)",
        }
    }

    /// Whether this mode needs the broadcast server running at all.
    pub fn needs_server(&self) -> bool {
        matches!(self, ScanMode::WifiBroadcast)
    }
}

/// Clipboard collaborator seam.  The real implementation lives in the
/// platform front end; the headless binary logs instead.
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardSink: Send + Sync {
    fn copy(&self, text: &str);
}

/// Routes one qualified scan to its destination.
///
/// Failures never propagate: a scan with nowhere to go is a normal outcome
/// (no clients connected, mode not implemented), logged and dropped.  The
/// scanning flow is never interrupted by delivery problems.
pub async fn route_qualified_event(
    mode: ScanMode,
    event: &QualifiedEvent,
    server: &BroadcastServer,
    clipboard: &dyn ClipboardSink,
) {
    debug!(
        "routing {} scan via {}: {}",
        event.symbology.label(),
        mode.display_name(),
        event.raw_value
    );

    match mode {
        ScanMode::WifiBroadcast => match server.broadcast(&event.raw_value).await {
            Ok(()) => {}
            Err(BroadcastError::NoClientsConnected) => {
                debug!("no clients connected; scan not delivered");
            }
            Err(e) => warn!("broadcast failed: {e}"),
        },
        ScanMode::CopyOnly => clipboard.copy(&event.raw_value),
        ScanMode::HidEmulation => {
            warn!("HID keyboard emulation is not implemented yet; scan dropped");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
