use std::sync::Arc;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ReductionError;
use crate::events::{Outcome, ReduceRequest};
use crate::processing::color::ColorRgba;
use crate::processing::decode::ImageProcessor;

/// Worker context for average color reductions.
///
/// Each request is scanned on the blocking pool independently of the others;
/// nothing is cancelled when a newer drop arrives, the drop zone discards
/// stale results instead. Returns once the request channel is closed and
/// every dispatched reduction has been reported.
pub async fn run(
    processor: Arc<ImageProcessor>,
    mut reduce_rx: Receiver<ReduceRequest>,
    outcomes: Sender<Outcome>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut tasks: JoinSet<(u64, Result<ColorRgba, ReductionError>)> = JoinSet::new();
    let mut open = true;

    loop {
        if !open && tasks.is_empty() {
            break;
        }

        select! {
            _ = cancel.cancelled() => break,

            maybe_req = reduce_rx.recv(), if open => match maybe_req {
                Some(ReduceRequest { seq, pixels }) => {
                    debug!(seq, pixels = pixels.pixel_count(), "reduction dispatched");
                    let handle = processor.reduce(pixels);
                    tasks.spawn(async move {
                        let res = handle
                            .await
                            .unwrap_or_else(|err| Err(ReductionError::Worker(err.to_string())));
                        (seq, res)
                    });
                }
                None => {
                    debug!("reduce request channel closed");
                    open = false;
                }
            },

            Some(joined) = tasks.join_next() => {
                let (seq, res) = match joined {
                    Ok(done) => done,
                    Err(err) => {
                        warn!("reduction task aborted: {err}");
                        continue;
                    }
                };
                let outcome = match res {
                    Ok(color) => Outcome::ColorComputed { seq, color },
                    Err(err) => Outcome::Failed { seq, error: err.into() },
                };
                if outcomes.send(outcome).await.is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}
