//! Wires drop zone, loader and reducer together.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::config::Configuration;
use crate::events::{DragEvent, LoadRequest, Outcome, ReduceRequest};
use crate::processing::decode::ImageProcessor;
use crate::tasks::drop_zone::{self, AppState};
use crate::tasks::{loader, reducer};

/// Handles to a running pipeline.
pub struct Pipeline {
    /// Feed drag events here; clone freely.
    pub events: mpsc::Sender<DragEvent>,
    /// Latest published render state.
    pub state: watch::Receiver<AppState>,
    drop_zone: JoinHandle<Result<AppState>>,
    workers: JoinSet<Result<()>>,
}

impl Pipeline {
    pub fn spawn(
        cfg: &Configuration,
        processor: Arc<ImageProcessor>,
        cancel: CancellationToken,
    ) -> Self {
        // Channels (small/bounded)
        let (events_tx, events_rx) = mpsc::channel::<DragEvent>(64); // Inputs -> DropZone
        let (load_tx, load_rx) = mpsc::channel::<LoadRequest>(cfg.max_concurrent_decodes); // DropZone -> Loader
        let (reduce_tx, reduce_rx) = mpsc::channel::<ReduceRequest>(4); // Loader -> Reducer
        let (outcome_tx, outcome_rx) = mpsc::channel::<Outcome>(64); // Loader/Reducer -> DropZone
        let (state_tx, state_rx) = watch::channel(AppState::default()); // DropZone -> renderers

        let drop_zone = tokio::spawn(drop_zone::run(
            events_rx,
            outcome_rx,
            load_tx,
            state_tx,
            cancel.clone(),
        ));

        let mut workers = JoinSet::new();
        workers.spawn({
            let processor = processor.clone();
            let outcome_tx = outcome_tx.clone();
            let cancel = cancel.clone();
            let max_in_flight = cfg.max_concurrent_decodes;
            async move {
                loader::run(processor, load_rx, reduce_tx, outcome_tx, cancel, max_in_flight)
                    .await
                    .context("loader task failed")
            }
        });
        workers.spawn(async move {
            reducer::run(processor, reduce_rx, outcome_tx, cancel)
                .await
                .context("reducer task failed")
        });

        Self {
            events: events_tx,
            state: state_rx,
            drop_zone,
            workers,
        }
    }

    /// Close this handle's event sender and wait for every task to finish.
    /// Returns the drop zone's final state.
    pub async fn join(self) -> Result<AppState> {
        let Self {
            events,
            state: _,
            drop_zone,
            mut workers,
        } = self;
        drop(events);

        while let Some(res) = workers.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("task error: {e:?}"),
                Err(e) => error!("join error: {e}"),
            }
        }
        drop_zone
            .await
            .map_err(|e| anyhow!("drop zone task panicked: {e}"))?
            .context("drop zone task failed")
    }
}
