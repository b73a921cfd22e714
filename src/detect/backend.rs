use anyhow::Result;

use crate::detect::result::DetectionSet;

/// Detector backend trait.
///
/// A backend is an opaque capability: given an RGB24 frame, return the
/// damage detections it contains. Backends are instantiated once at process
/// start and shared across requests through the registry; they must not
/// retain frame pixels beyond the `detect` call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// `pixels` is packed RGB24, `width * height * 3` bytes. Coordinates in
    /// the returned set are in the frame's pixel space.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionSet>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
