//! Pipeline controller.
//!
//! One controller invocation owns one request end to end: stage the input
//! under the media directory, run the transcoding session with a fresh
//! damage summary, and build the response payload. Structural failures are
//! translated into the pipeline error taxonomy here and logged with full
//! context; nothing escapes the controller unhandled, and decode/encode
//! handles never outlive the request (they are scoped inside the
//! transcoder).

use std::path::Path;

use anyhow::anyhow;
use image::RgbImage;
use serde::Serialize;

use crate::aggregate::{DamageEntry, DamageSummary};
use crate::annotate::Annotator;
use crate::config::ScanConfig;
use crate::detect::{DetectionSet, SharedBackend};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;
use crate::video::{Transcoder, VideoIo};

/// Response payload for a processed video.
#[derive(Clone, Debug, Serialize)]
pub struct VideoAnalysis {
    /// Path to the produced file, relative to the static-serving root.
    pub video_url: String,
    pub damage_summary: Vec<DamageEntry>,
}

/// Result of single-image analysis.
#[derive(Clone, Debug)]
pub struct ImageAnalysis {
    pub detections: DetectionSet,
    /// Copy of the input with detections drawn on it.
    pub annotated: Frame,
}

/// Orchestrates detection, annotation, aggregation and transcoding for one
/// request at a time. The detector handle is shared across requests; all
/// other state is per-invocation.
pub struct Pipeline {
    config: ScanConfig,
    detector: SharedBackend,
    video: Box<dyn VideoIo>,
    annotator: Annotator,
}

impl Pipeline {
    pub fn new(config: ScanConfig, detector: SharedBackend, video: Box<dyn VideoIo>) -> Self {
        Self {
            config,
            detector,
            video,
            annotator: Annotator::new(),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Analyze a video: persist the input, transcode with per-frame
    /// detection and annotation, and return the output URL plus the damage
    /// rollup.
    ///
    /// Repeated uploads with the same filename overwrite each other's
    /// staged files.
    pub fn analyze_video(&self, input: &[u8], filename: &str) -> PipelineResult<VideoAnalysis> {
        let result = self.analyze_video_inner(input, filename);
        if let Err(err) = &result {
            log::error!("video analysis failed for '{}': {err}", filename);
        }
        result
    }

    fn analyze_video_inner(&self, input: &[u8], filename: &str) -> PipelineResult<VideoAnalysis> {
        let name = sanitize_filename(filename)?;
        std::fs::create_dir_all(&self.config.media_dir)?;

        let input_path = self.config.media_dir.join(format!("input_{name}"));
        std::fs::write(&input_path, input)?;
        log::info!(
            "staged {} byte upload at {}",
            input.len(),
            input_path.display()
        );

        let stem = Path::new(&name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&name);
        let output_base = self.config.media_dir.join(format!("output_{stem}"));

        let mut summary = DamageSummary::new();
        let transcoder = Transcoder::new(self.video.as_ref(), &self.config.codecs);
        let report = transcoder.run(
            &input_path,
            &output_base,
            &self.detector,
            &self.annotator,
            &mut summary,
        )?;

        let output_name = report
            .output_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("produced output path has no filename"))?;

        Ok(VideoAnalysis {
            video_url: format!("{}/{}", self.config.url_prefix, output_name),
            damage_summary: summary.finalize(),
        })
    }

    /// Analyze a single image: decode, detect, and draw the detections onto
    /// a copy of the input.
    pub fn analyze_image(&self, input: &[u8]) -> PipelineResult<ImageAnalysis> {
        let image = image::load_from_memory(input)
            .map_err(|err| PipelineError::Open(format!("failed to decode image: {err}")))?
            .into_rgb8();
        let (width, height) = image.dimensions();
        let mut frame = Frame::new(image.into_raw(), width, height).map_err(PipelineError::Other)?;

        let detections = {
            let mut guard = self
                .detector
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            guard.detect(&frame.pixels, frame.width, frame.height)?
        };

        self.annotator.annotate(&mut frame, &detections);
        Ok(ImageAnalysis {
            detections,
            annotated: frame,
        })
    }
}

/// Reduce an uploaded filename to its final component; path traversal in
/// upload names must not escape the media directory.
fn sanitize_filename(filename: &str) -> PipelineResult<String> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .filter(|name| !name.is_empty());
    name.ok_or_else(|| PipelineError::Other(anyhow!("invalid upload filename '{filename}'")))
}

/// Encode an annotated frame as JPEG (for the image CLI).
pub fn encode_jpeg(frame: &Frame) -> PipelineResult<Vec<u8>> {
    let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .map_err(|err| PipelineError::Other(anyhow!("failed to encode JPEG: {err}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BackendRegistry, DamageClass, Detection, StubBackend};
    use crate::frame::VideoMeta;
    use crate::video::synthetic::SyntheticVideo;

    fn test_config(dir: &Path) -> ScanConfig {
        ScanConfig {
            media_dir: dir.to_path_buf(),
            ..ScanConfig::default()
        }
    }

    fn detector_with(script: impl FnOnce(&mut StubBackend)) -> SharedBackend {
        let mut backend = StubBackend::new();
        script(&mut backend);
        let mut registry = BackendRegistry::new();
        registry.register(backend);
        registry.default_backend().unwrap()
    }

    #[test]
    fn sanitize_strips_path_components() {
        assert_eq!(sanitize_filename("clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(sanitize_filename("../../etc/clip.mp4").unwrap(), "clip.mp4");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn analyze_image_returns_detections_and_annotated_copy() {
        let dir = tempfile::tempdir().unwrap();
        let detector = detector_with(|backend| {
            backend.push_detections(DetectionSet::new(vec![Detection::new(
                2,
                25,
                10,
                10,
                DamageClass::Dent,
                80.0,
            )]));
        });
        let meta = VideoMeta {
            width: 64,
            height: 64,
            fps: 30.0,
        };
        let pipeline = Pipeline::new(
            test_config(dir.path()),
            detector,
            Box::new(SyntheticVideo::with_black_frames(meta, 0)),
        );

        let image = RgbImage::from_pixel(64, 64, image::Rgb([255, 255, 255]));
        let mut png = std::io::Cursor::new(Vec::new());
        image.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let analysis = pipeline.analyze_image(&png.into_inner()).unwrap();
        assert_eq!(analysis.detections.len(), 1);
        assert_eq!(analysis.annotated.width, 64);
        // The box outline was drawn.
        assert_ne!(analysis.annotated.pixels, vec![255u8; 64 * 64 * 3]);
    }

    #[test]
    fn analyze_image_rejects_garbage_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let meta = VideoMeta {
            width: 8,
            height: 8,
            fps: 30.0,
        };
        let pipeline = Pipeline::new(
            test_config(dir.path()),
            detector_with(|_| {}),
            Box::new(SyntheticVideo::with_black_frames(meta, 0)),
        );
        match pipeline.analyze_image(b"not an image") {
            Err(PipelineError::Open(_)) => {}
            other => panic!("expected open failure, got {other:?}"),
        }
    }
}
