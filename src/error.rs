use std::path::PathBuf;

use thiserror::Error;

/// A dropped payload could not be turned into a pixel buffer.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The dropped file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The payload exceeds the configured size limit.
    #[error("payload is {bytes} bytes, limit is {limit}")]
    TooLarge { bytes: u64, limit: u64 },

    /// Neither the content nor the file name identify an image format.
    #[error("payload is not a recognised image format")]
    NotAnImage,

    /// The image format was recognised but decoding failed.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// No usable dimensions: intrinsic and observed layout sizes are zero.
    #[error("image has zero-sized dimensions")]
    ZeroSized,

    /// The decode worker panicked or was torn down.
    #[error("decode worker failed: {0}")]
    Worker(String),
}

/// The reducer was handed a buffer it cannot average.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReductionError {
    #[error("pixel buffer is empty")]
    Empty,

    #[error("pixel buffer length {len} is not a multiple of 4")]
    Misaligned { len: usize },

    /// The worker running the reduction panicked or was torn down.
    #[error("reduction worker failed: {0}")]
    Worker(String),
}

/// Failure of one drop request somewhere in the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("reduction failed: {0}")]
    Reduction(#[from] ReductionError),

    /// A downstream task went away before the request could be handed over.
    #[error("pipeline stopped: {0}")]
    Stopped(&'static str),
}
