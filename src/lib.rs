//! Vehicle damage detection over video.
//!
//! The pipeline decodes an uploaded video frame by frame, runs each frame
//! through a detector backend, draws the detections back onto the frame, and
//! re-encodes the result while aggregating the strongest sighting of every
//! damage category. Detector backends and video I/O both sit behind traits:
//! the real implementations (`tract` inference, FFmpeg transcoding) are
//! feature-gated, and scriptable in-memory versions back the tests.

pub mod aggregate;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod video;

pub use aggregate::{DamageEntry, DamageSummary};
pub use annotate::Annotator;
pub use config::ScanConfig;
pub use detect::{BackendRegistry, DamageClass, Detection, DetectionSet, DetectorBackend};
pub use error::{PipelineError, PipelineResult};
pub use frame::{Frame, VideoMeta};
pub use pipeline::{Pipeline, VideoAnalysis};
