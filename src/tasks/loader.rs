use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::DecodeError;
use crate::events::{LoadRequest, Outcome, ReduceRequest};
use crate::processing::decode::{ImageProcessor, LoadedImage};

#[instrument(level = "debug", skip(processor, path))]
fn decode(processor: &ImageProcessor, seq: u64, path: PathBuf) -> Result<LoadedImage, DecodeError> {
    debug!(path = %path.display(), "decoding");
    processor.load_path(&path)
}

/// Decodes dropped files on the blocking pool.
///
/// - A decoded image is announced to the drop zone (`ImageLoaded`) and its
///   pixel buffer forwarded to the reducer.
/// - A decode failure is reported as `Failed` for that drop.
/// - At most `max_in_flight` decodes run at once.
/// - Returns once the request channel is closed and every decode in flight
///   has been reported, or when cancelled.
pub async fn run(
    processor: Arc<ImageProcessor>,
    mut load_rx: Receiver<LoadRequest>,
    to_reducer: Sender<ReduceRequest>,
    outcomes: Sender<Outcome>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let mut tasks: JoinSet<(u64, Result<LoadedImage, DecodeError>)> = JoinSet::new();
    let mut load_open = true;

    loop {
        // request channel closed and nothing in flight
        if !load_open && tasks.is_empty() {
            break;
        }

        select! {
            _ = cancel.cancelled() => break,

            // Accept new load requests while under limit
            maybe_req = load_rx.recv(), if load_open && tasks.len() < max_in_flight => match maybe_req {
                Some(LoadRequest { seq, path }) => {
                    let processor = processor.clone();
                    tasks.spawn(async move {
                        let res = tokio::task::spawn_blocking(move || decode(&processor, seq, path)).await;
                        let res = res.unwrap_or_else(|err| Err(DecodeError::Worker(err.to_string())));
                        (seq, res)
                    });
                }
                None => {
                    debug!("load request channel closed");
                    load_open = false;
                }
            },

            // Handle completed decodes as they finish
            Some(joined) = tasks.join_next() => {
                let (seq, res) = match joined {
                    Ok(done) => done,
                    Err(err) => {
                        warn!("decode task aborted: {err}");
                        continue;
                    }
                };
                match res {
                    Ok(LoadedImage { preview, pixels }) => {
                        debug!(seq, width = pixels.width(), height = pixels.height(), "loaded");
                        if outcomes.send(Outcome::ImageLoaded { seq, preview }).await.is_err() {
                            break;
                        }
                        if to_reducer.send(ReduceRequest { seq, pixels }).await.is_err() {
                            warn!("reducer channel closed");
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(seq, "decode failed: {err}");
                        if outcomes.send(Outcome::Failed { seq, error: err.into() }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
