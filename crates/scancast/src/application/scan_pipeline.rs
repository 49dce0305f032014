//! The capture/decode/filter worker.
//!
//! One Tokio task pulls frames from the [`FrameSource`], hands each to the
//! [`DecodeEngine`], runs the results through the [`DetectionFilter`], and
//! forwards every qualified event — in acceptance order — over an mpsc
//! channel to whoever wires the pipeline up (normally the routing layer).
//!
//! The pipeline is one of the two independently scheduled workers in the
//! system (the other is the broadcast server's accept loop): slow network
//! I/O never stalls frame processing and vice versa, because the only thing
//! connecting them is the qualified-event channel.
//!
//! # Suspension
//!
//! `suspend`/`resume` are a logical gate, not a teardown: frames keep
//! flowing through the loop while suspended (a camera front end keeps its
//! preview live), the filter just never lets anything qualify.  Commands
//! are applied between frames, which also guarantees the filter is only
//! ever touched from this one task.

use std::time::Instant;

use scancast_core::{DetectionFilter, QualifiedEvent};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::infrastructure::capture::{DecodeEngine, FrameSource};

/// Capacity of the qualified-event channel.  Acceptances are rare (at most
/// one per throttle window per payload), so a small buffer suffices.
const EVENT_CHANNEL_DEPTH: usize = 32;

/// How long `shutdown` waits for the worker before aborting it.
const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(1);

/// Control messages applied between frames.
#[derive(Debug)]
enum PipelineCommand {
    Suspend,
    Resume,
    Shutdown,
}

/// Handle for controlling a running pipeline.
///
/// Dropping the handle (without calling [`shutdown`](Self::shutdown)) lets
/// the pipeline run until its frame source ends.
pub struct PipelineHandle {
    control_tx: mpsc::Sender<PipelineCommand>,
    task: JoinHandle<()>,
}

impl PipelineHandle {
    /// Gates the filter off before the next frame is evaluated.
    pub async fn suspend(&self) {
        let _ = self.control_tx.send(PipelineCommand::Suspend).await;
    }

    /// Re-opens the gate; the next frame may qualify again, including a
    /// repeat of the last payload accepted before suspension.
    pub async fn resume(&self) {
        let _ = self.control_tx.send(PipelineCommand::Resume).await;
    }

    /// Stops the pipeline after the frame currently in flight and waits for
    /// the task to finish.
    ///
    /// A source blocked waiting for its next frame cannot observe the
    /// shutdown command, so after a short grace period the task is aborted.
    pub async fn shutdown(self) {
        let _ = self.control_tx.send(PipelineCommand::Shutdown).await;
        let mut task = self.task;
        tokio::select! {
            _ = &mut task => {}
            _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
                task.abort();
                let _ = task.await;
            }
        }
    }
}

/// Spawns the pipeline worker and returns its control handle together with
/// the qualified-event receiver.
///
/// The worker ends when the frame source returns `None`, when `Shutdown`
/// arrives, or when the event receiver is dropped.
pub fn spawn_scan_pipeline(
    mut source: Box<dyn FrameSource>,
    engine: Box<dyn DecodeEngine>,
    mut filter: DetectionFilter,
) -> (PipelineHandle, mpsc::Receiver<QualifiedEvent>) {
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_DEPTH);
    let (control_tx, mut control_rx) = mpsc::channel(8);

    let task = tokio::spawn(async move {
        'frames: while let Some(frame) = source.next_frame().await {
            // Apply every control message that arrived since the last frame
            // before this frame is evaluated.
            loop {
                match control_rx.try_recv() {
                    Ok(PipelineCommand::Suspend) => filter.suspend(),
                    Ok(PipelineCommand::Resume) => filter.resume(),
                    Ok(PipelineCommand::Shutdown) => break 'frames,
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => break 'frames,
                }
            }

            let events = match engine.decode(&frame).await {
                Ok(events) => events,
                Err(e) => {
                    // Decode failures are per-frame, never fatal: skip the
                    // frame and keep scanning.
                    warn!("decode engine error: {e}");
                    continue;
                }
            };

            if let Some(qualified) = filter.evaluate(&events, Instant::now()) {
                debug!(
                    "qualified {} scan: {}",
                    qualified.symbology.label(),
                    qualified.raw_value
                );
                if event_tx.send(qualified).await.is_err() {
                    // Consumer is gone; nothing left to scan for.
                    break;
                }
            }
        }
        debug!("scan pipeline stopped");
    });

    (PipelineHandle { control_tx, task }, event_rx)
}
