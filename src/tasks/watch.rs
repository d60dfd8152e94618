//! Drop folder: files that appear in a watched directory count as drops.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher, recommended_watcher};
use tokio::select;
use tokio::sync::mpsc::{self, Sender};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::events::DragEvent;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

#[inline]
pub fn is_image(p: &Path) -> bool {
    matches!(
        p.extension()
            .and_then(OsStr::to_str)
            .map(|s| s.to_ascii_lowercase()),
        Some(ref e) if IMAGE_EXTENSIONS.contains(&e.as_str())
    )
}

/// Image paths a filesystem event may have finished writing.
pub fn touched_images(event: &Event) -> Vec<PathBuf> {
    let relevant = match &event.kind {
        EventKind::Create(CreateKind::File | CreateKind::Any) => true,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both | RenameMode::Any)) => {
            true
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    };
    if !relevant {
        return Vec::new();
    }
    let paths = match &event.kind {
        // Both carries [from, to]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => event.paths.clone(),
    };
    paths.into_iter().filter(|p| is_image(p)).collect()
}

/// Watch `dir` and turn settled image files into drops.
///
/// A path is dropped once no event has touched it for `settle`, so a file
/// still being written is not decoded half-way.
#[instrument(skip(dir, to_drop_zone, cancel), fields(dir = %dir.display()))]
pub async fn run(
    dir: PathBuf,
    settle: Duration,
    to_drop_zone: Sender<DragEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    // Bridge notify callback -> async channel
    let (watch_tx, mut watch_rx) = mpsc::channel::<notify::Result<Event>>(128);
    let mut watcher = recommended_watcher(move |res| {
        let _ = watch_tx.blocking_send(res);
    })
    .context("creating drop folder watcher")?;
    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("watching {}", dir.display()))?;
    info!("drop folder watcher initialized");

    let mut settling: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let next_due = settling.values().min().copied();
        select! {
            _ = cancel.cancelled() => {
                info!("cancel received; exiting drop folder task");
                break;
            }

            Some(res) = watch_rx.recv() => match res {
                Ok(event) => {
                    debug!(kind = ?event.kind, paths = ?event.paths, "notify event");
                    for path in touched_images(&event) {
                        settling.insert(path, Instant::now() + settle);
                    }
                }
                Err(err) => error!("watch error: {err}"),
            },

            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                let now = Instant::now();
                let mut due: Vec<(PathBuf, Instant)> = settling
                    .iter()
                    .filter(|(_, at)| **at <= now)
                    .map(|(p, at)| (p.clone(), *at))
                    .collect();
                due.sort_by_key(|(_, at)| *at);
                for (path, _) in due {
                    settling.remove(&path);
                    if !path.is_file() {
                        debug!(path = %path.display(), "settled path vanished; skipping");
                        continue;
                    }
                    info!(path = %path.display(), "drop folder: new image");
                    if to_drop_zone.send(DragEvent::Drop(vec![path])).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
    }
    Ok(())
}
