use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use crate::error::PipelineError;
use crate::processing::color::{ColorRgba, PixelBuffer};

/// Input on the drop target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
    /// The dropped file list; only the first entry is used.
    Drop(Vec<PathBuf>),
}

/// Drop zone -> Loader
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub seq: u64,
    pub path: PathBuf,
}

/// Loader -> Reducer
#[derive(Debug)]
pub struct ReduceRequest {
    pub seq: u64,
    pub pixels: PixelBuffer,
}

/// Loader/Reducer -> Drop zone. Every variant is tagged with the sequence
/// number of the drop that caused it.
#[derive(Debug)]
pub enum Outcome {
    ImageLoaded { seq: u64, preview: Arc<RgbaImage> },
    ColorComputed { seq: u64, color: ColorRgba },
    Failed { seq: u64, error: PipelineError },
}

impl Outcome {
    pub fn seq(&self) -> u64 {
        match self {
            Self::ImageLoaded { seq, .. }
            | Self::ColorComputed { seq, .. }
            | Self::Failed { seq, .. } => *seq,
        }
    }
}
