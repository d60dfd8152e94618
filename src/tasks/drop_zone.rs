//! The drop target's render state and the rules for mutating it.
//!
//! Only this task writes [`AppState`]. Drops are numbered; every outcome
//! coming back from the loader or reducer carries the number of the drop
//! that caused it, and anything but the newest drop's outcome is discarded.

use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::events::{DragEvent, LoadRequest, Outcome};
use crate::processing::color::ColorRgba;

/// The preview currently shown and the drop it came from.
#[derive(Debug, Clone)]
pub struct Preview {
    pub seq: u64,
    pub image: Arc<RgbaImage>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub is_drag_over: bool,
    pub source_image: Option<Preview>,
    pub background: ColorRgba,
    pub is_computing: bool,
    /// Message for the most recent failed drop, cleared by the next success.
    pub last_error: Option<String>,
}

impl AppState {
    pub fn background_css(&self) -> String {
        self.background.css()
    }
}

#[derive(Debug, Default)]
pub struct DropZone {
    state: AppState,
    latest_seq: u64,
    revision: u64,
}

impl DropZone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn into_state(self) -> AppState {
        self.state
    }

    /// Sequence number of the newest accepted drop (0 before any drop).
    pub fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Bumped on every state mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a drag event; an accepted drop yields the load request to issue.
    pub fn on_drag(&mut self, event: DragEvent) -> Option<LoadRequest> {
        match event {
            DragEvent::Enter => {
                self.set_drag_over(true);
                None
            }
            DragEvent::Over => None,
            DragEvent::Leave => {
                self.set_drag_over(false);
                None
            }
            DragEvent::Drop(files) => {
                self.set_drag_over(false);
                let path = files.into_iter().next()?;
                self.latest_seq += 1;
                self.state.is_computing = true;
                self.touch();
                info!(seq = self.latest_seq, path = %path.display(), "drop accepted");
                Some(LoadRequest {
                    seq: self.latest_seq,
                    path,
                })
            }
        }
    }

    /// Apply an outcome. Returns `false` when it was stale and ignored.
    pub fn on_outcome(&mut self, outcome: Outcome) -> bool {
        let seq = outcome.seq();
        if seq != self.latest_seq {
            debug!(seq, latest = self.latest_seq, "discarding stale outcome");
            return false;
        }

        match outcome {
            Outcome::ImageLoaded { seq, preview } => {
                self.state.source_image = Some(Preview {
                    seq,
                    image: preview,
                });
            }
            Outcome::ColorComputed { seq, color } => {
                info!(seq, color = %color, "background updated");
                self.state.background = color;
                self.state.is_computing = false;
                self.state.last_error = None;
            }
            Outcome::Failed { seq, error } => {
                warn!(seq, error = %error, "drop failed; keeping previous background");
                self.state.is_computing = false;
                self.state.last_error = Some(error.to_string());
            }
        }
        self.touch();
        true
    }

    fn set_drag_over(&mut self, over: bool) {
        if self.state.is_drag_over != over {
            self.state.is_drag_over = over;
            self.touch();
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Own the drop zone state until cancelled or until the event source has
/// closed and every outstanding outcome has been drained.
///
/// Load requests are handed to the loader without ever blocking on it: if
/// the loader is busy, only the newest request is kept waiting.
pub async fn run(
    mut events: Receiver<DragEvent>,
    mut outcomes: Receiver<Outcome>,
    to_loader: Sender<LoadRequest>,
    state_tx: watch::Sender<AppState>,
    cancel: CancellationToken,
) -> Result<AppState> {
    let mut zone = DropZone::new();
    let mut to_loader = Some(to_loader);
    let mut pending: Option<LoadRequest> = None;
    let mut events_open = true;
    let mut outcomes_open = true;

    loop {
        let before = zone.revision();
        let loader = to_loader.clone();

        select! {
            _ = cancel.cancelled() => break,

            maybe_event = events.recv(), if events_open => match maybe_event {
                Some(event) => {
                    if let Some(request) = zone.on_drag(event) {
                        if let Some(superseded) = pending.replace(request) {
                            debug!(seq = superseded.seq, "superseded before reaching the loader");
                        }
                    }
                }
                None => {
                    debug!("drag event source closed");
                    events_open = false;
                }
            },

            permit = async move {
                match loader {
                    Some(tx) => tx.reserve_owned().await,
                    None => std::future::pending().await,
                }
            }, if pending.is_some() => match permit {
                Ok(permit) => {
                    if let Some(request) = pending.take() {
                        permit.send(request);
                    }
                }
                Err(_) => {
                    warn!("loader channel closed");
                    to_loader = None;
                    if let Some(request) = pending.take() {
                        zone.on_outcome(Outcome::Failed {
                            seq: request.seq,
                            error: PipelineError::Stopped("loader"),
                        });
                    }
                }
            },

            maybe_outcome = outcomes.recv(), if outcomes_open => match maybe_outcome {
                Some(outcome) => {
                    zone.on_outcome(outcome);
                }
                None => {
                    debug!("outcome channel closed");
                    outcomes_open = false;
                }
            },
        }

        if zone.revision() != before {
            state_tx.send_replace(zone.state().clone());
        }

        if !events_open && pending.is_none() {
            // nothing more to issue; lets the loader wind down
            to_loader = None;
            if !outcomes_open {
                break;
            }
        }
    }

    Ok(zone.into_state())
}
