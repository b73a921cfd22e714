//! Detector capability boundary.
//!
//! The detection model is consumed as an opaque capability: RGB24 pixels in,
//! `DetectionSet` out. Backends live behind `DetectorBackend` and are shared
//! across pipeline invocations through `BackendRegistry`.

pub mod backend;
pub mod backends;
pub mod registry;
pub mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{BackendRegistry, SharedBackend};
pub use result::{BoundingBox, DamageClass, Detection, DetectionSet};
