use std::path::PathBuf;

use crate::events::DragEvent;

/// Turns winit's per-file drag notifications into drop target events.
///
/// winit reports one `HoveredFile`/`DroppedFile` per file; a gesture yields a
/// single `Enter` and, at the end of the event batch, a single `Drop` with
/// every file in the order they were reported.
#[derive(Debug, Default)]
pub struct DragGesture {
    hovering: bool,
    dropped: Vec<PathBuf>,
}

impl DragGesture {
    pub fn hovered(&mut self) -> Option<DragEvent> {
        if self.hovering {
            return None;
        }
        self.hovering = true;
        Some(DragEvent::Enter)
    }

    pub fn cancelled(&mut self) -> Option<DragEvent> {
        if !self.hovering {
            return None;
        }
        self.hovering = false;
        Some(DragEvent::Leave)
    }

    pub fn dropped(&mut self, path: PathBuf) {
        self.hovering = false;
        self.dropped.push(path);
    }

    /// Call once the current batch of window events has been delivered.
    pub fn flush(&mut self) -> Option<DragEvent> {
        if self.dropped.is_empty() {
            return None;
        }
        Some(DragEvent::Drop(std::mem::take(&mut self.dropped)))
    }
}
