//! Frame and stream metadata containers.
//!
//! Frames are packed RGB24 throughout the pipeline: the decode layer
//! produces them, the detector reads them, the annotator draws on them and
//! the encode layer consumes them. One color order, end to end.

use anyhow::{anyhow, Result};

/// One decoded video frame, packed RGB24.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Wrap an RGB24 buffer. The buffer length must match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer is {} bytes, expected {} for {}x{} RGB24",
                pixels.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// A black frame of the given dimensions.
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0u8; (width * height * 3) as usize],
            width,
            height,
        }
    }
}

/// Stream-level metadata reported by a decode source.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl VideoMeta {
    /// A source reporting zero width or height is unusable.
    pub fn has_valid_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0u8; 11], 2, 2).is_err());
        assert!(Frame::new(vec![0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        let meta = VideoMeta {
            width: 0,
            height: 480,
            fps: 30.0,
        };
        assert!(!meta.has_valid_dimensions());
    }
}
