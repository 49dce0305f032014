//! Scancast — entry point.
//!
//! Turns this machine into a LAN barcode broadcaster: every scanned code is
//! pushed to all browsers connected to the WebSocket endpoint, with no
//! internet dependency.  This binary is the headless variant: camera capture
//! and decode are platform front-end concerns, so scans are fed by typing
//! payloads on stdin — everything downstream of the decode seam (filter,
//! routing, broadcast) is the same code path a camera front end drives.
//!
//! # Usage
//!
//! ```text
//! scancast [OPTIONS]
//!
//! Options:
//!   --port <PORT>           WebSocket listener port [config default: 8080]
//!   --mode <MODE>           wifi-broadcast | copy-only | hid-emulation
//!   --throttle-ms <MILLIS>  Duplicate-scan throttle window [config default: 300]
//! ```
//!
//! CLI arguments override the persisted settings; environment variables
//! (`SCANCAST_PORT`, `SCANCAST_MODE`, `SCANCAST_THROTTLE_MS`) sit between
//! the two.  Settings live in the platform config file (see
//! `infrastructure::storage::config`).
//!
//! # Architecture
//!
//! ```text
//! main()
//!  ├─ load_config() + CLI overrides
//!  ├─ BroadcastServer        -- accept loop + client registry (Tokio tasks)
//!  ├─ scan pipeline          -- stdin frames → decode → DetectionFilter
//!  └─ routing loop           -- QualifiedEvent → broadcast / clipboard
//! ```

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use scancast::application::route_scan::{route_qualified_event, ClipboardSink, ScanMode};
use scancast::application::scan_pipeline::spawn_scan_pipeline;
use scancast::infrastructure::capture::stdin::{LineDecodeEngine, StdinFrameSource};
use scancast::infrastructure::network::{netinfo, BroadcastServer, ServerEvent};
use scancast::infrastructure::storage::config::{load_config, AppConfig, ServerSettings};
use scancast_core::DetectionFilter;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Scancast: broadcast scanned codes to browsers on the local network.
#[derive(Debug, Parser)]
#[command(name = "scancast", version, about)]
struct Args {
    /// WebSocket listener port (overrides the config file).
    #[arg(long, env = "SCANCAST_PORT")]
    port: Option<u16>,

    /// Scan routing mode (overrides the config file).
    #[arg(long, value_enum, env = "SCANCAST_MODE")]
    mode: Option<ScanMode>,

    /// Duplicate-scan throttle window in milliseconds (overrides the config file).
    #[arg(long, env = "SCANCAST_THROTTLE_MS")]
    throttle_ms: Option<u64>,
}

/// Clipboard stand-in for the headless binary: the platform front end owns
/// the real clipboard, here a copy is just logged.
struct LogClipboard;

impl ClipboardSink for LogClipboard {
    fn copy(&self, text: &str) {
        info!("copied to clipboard: {text}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Settings first, so the persisted log level can seed the subscriber.
    // A broken config file falls back to defaults rather than refusing to run.
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("warning: could not load config ({e}); using defaults");
            AppConfig::default()
        }
    };

    // Initialise structured logging.  `RUST_LOG` wins over the config file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!("scancast starting");

    // CLI > environment > config file.
    let mode = args.mode.unwrap_or(config.scanner.mode);
    let port = args.port.unwrap_or(config.server.port);
    let throttle_ms = args.throttle_ms.unwrap_or(config.scanner.throttle_window_ms);

    let server_config = ServerSettings {
        port,
        bind_address: config.server.bind_address.clone(),
    }
    .to_server_config()
    .context("invalid server settings")?;

    let (server, mut server_events) = BroadcastServer::new(server_config);

    // The mode gates whether the server runs at all; in non-broadcast modes
    // qualified scans are routed elsewhere and the port stays free.
    if mode.needs_server() {
        server
            .start()
            .await
            .with_context(|| format!("failed to start broadcast server on port {port}"))?;

        let display_port = server.local_addr().map_or(port, |addr| addr.port());
        match netinfo::websocket_url(display_port) {
            Some(url) => info!("clients can connect to {url}"),
            None => info!("not connected to a network; no connection URL to show"),
        }
    } else {
        info!(
            "mode is {}; broadcast server not started",
            mode.display_name()
        );
    }

    // Pump server events into the log.  In the full product these drive the
    // client-count badge and the transient error notice.
    tokio::spawn(async move {
        while let Some(event) = server_events.recv().await {
            match event {
                ServerEvent::ClientCountChanged(n) => info!("connected clients: {n}"),
                ServerEvent::TransportError {
                    connection_id,
                    message,
                } => warn!("client {connection_id} transport error: {message}"),
            }
        }
    });

    // The scan pipeline: one worker independent of the network tasks.
    let filter = DetectionFilter::new(Duration::from_millis(throttle_ms));
    let (pipeline, mut scans) = spawn_scan_pipeline(
        Box::new(StdinFrameSource::new()),
        Box::new(LineDecodeEngine),
        filter,
    );

    info!(
        "mode: {} — type a payload and press Enter to scan; Ctrl-C to exit",
        mode.display_name()
    );

    let clipboard = LogClipboard;
    loop {
        tokio::select! {
            maybe_scan = scans.recv() => match maybe_scan {
                Some(event) => {
                    route_qualified_event(mode, &event, &server, &clipboard).await;
                }
                None => {
                    info!("scan input ended");
                    break;
                }
            },
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    info!("shutdown signal received");
                }
                break;
            }
        }
    }

    pipeline.shutdown().await;
    match server.stop(Duration::from_secs(1)).await {
        Ok(()) => {}
        Err(e) => warn!("shutdown: {e}"),
    }

    info!("scancast stopped");
    Ok(())
}
