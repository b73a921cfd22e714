use thiserror::Error;

/// Request-fatal failures of the video pipeline.
///
/// Two-tier policy: per-frame detector failures are recovered inside the
/// transcoder loop (logged, frame written unannotated) and never appear
/// here; everything below escapes the transcoder and is translated at the
/// controller boundary.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Decode source could not be opened or reported invalid dimensions.
    #[error("failed to open video source: {0}")]
    Open(String),

    /// Every encoder candidate failed to initialize.
    #[error("no usable video encoder: {0}")]
    EncoderInit(String),

    /// Filesystem failure while staging input or output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else raised during setup or the transcode loop.
    #[error("pipeline failure: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
