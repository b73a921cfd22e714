//! Video transcoding session: decode, per-frame detection and annotation,
//! re-encode with codec fallback.
//!
//! The transcoder owns one decode source and one encode sink for the length
//! of a single request. Frames are pulled one at a time, run through the
//! detector and annotator, and written immediately; the whole video is never
//! buffered in memory. Both handles are released on every exit path: sources
//! and sinks close on drop, and the success path additionally calls `finish`
//! so container trailers are written before the response is produced.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::aggregate::DamageSummary;
use crate::annotate::Annotator;
use crate::detect::{DetectionSet, SharedBackend};
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, VideoMeta};

#[cfg(feature = "video-ffmpeg")]
pub mod ffmpeg;
pub mod synthetic;

/// Decode side of a transcoding session.
pub trait FrameSource {
    /// Stream metadata reported at open time.
    fn meta(&self) -> VideoMeta;

    /// Pull the next frame. `Ok(None)` signals end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Encode side of a transcoding session.
pub trait FrameSink {
    /// Some encoders construct but report themselves unusable; such a sink
    /// is discarded during codec fallback.
    fn is_ready(&self) -> bool {
        true
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the container. Called once on the success path.
    fn finish(&mut self) -> Result<()>;

    fn frames_written(&self) -> u64;
}

/// Factory boundary for decode sources and encode sinks.
///
/// The FFmpeg implementation lives behind the `video-ffmpeg` feature; the
/// synthetic implementation backs tests and builds without system FFmpeg.
pub trait VideoIo: Send + Sync {
    fn open_source(&self, path: &Path) -> PipelineResult<Box<dyn FrameSource>>;

    fn create_sink(
        &self,
        path: &Path,
        candidate: &EncoderCandidate,
        meta: &VideoMeta,
    ) -> Result<Box<dyn FrameSink>>;
}

/// One encoder choice: codec identifier plus the container extension the
/// output file takes when this codec wins.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct EncoderCandidate {
    pub codec: String,
    pub extension: String,
}

impl EncoderCandidate {
    pub fn new(codec: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            extension: extension.into(),
        }
    }
}

/// Default fallback order: H.264 first for broad playback compatibility,
/// then the encoders every FFmpeg build carries.
pub fn default_candidates() -> Vec<EncoderCandidate> {
    vec![
        EncoderCandidate::new("libx264", ".mp4"),
        EncoderCandidate::new("mpeg4", ".mp4"),
        EncoderCandidate::new("mjpeg", ".avi"),
    ]
}

/// Outcome of one transcoding session.
#[derive(Clone, Debug)]
pub struct TranscodeReport {
    /// Output file actually produced; extension reflects the chosen codec.
    pub output_path: PathBuf,
    pub frames_read: u64,
    pub frames_written: u64,
    /// Frames whose detection failed and were written unannotated.
    pub frames_failed: u64,
}

/// Drives one decode/annotate/encode session end to end.
pub struct Transcoder<'a> {
    video: &'a dyn VideoIo,
    candidates: &'a [EncoderCandidate],
}

impl<'a> Transcoder<'a> {
    pub fn new(video: &'a dyn VideoIo, candidates: &'a [EncoderCandidate]) -> Self {
        Self { video, candidates }
    }

    /// Transcode `input` to `output_base` + chosen extension.
    ///
    /// Per-frame detector failures are logged and recovered: the frame is
    /// written unannotated and the loop continues. End-of-stream and
    /// mid-stream read errors both end the loop cleanly; partial output is
    /// acceptable. Open and encoder-init failures are fatal for the request.
    pub fn run(
        &self,
        input: &Path,
        output_base: &Path,
        detector: &SharedBackend,
        annotator: &Annotator,
        summary: &mut DamageSummary,
    ) -> PipelineResult<TranscodeReport> {
        let mut source = self.video.open_source(input)?;
        let meta = source.meta();
        if !meta.has_valid_dimensions() {
            return Err(PipelineError::Open(format!(
                "source '{}' reports invalid dimensions {}x{}",
                input.display(),
                meta.width,
                meta.height
            )));
        }

        let (mut sink, output_path) = self.open_sink(output_base, &meta)?;

        let mut frames_read = 0u64;
        let mut frames_failed = 0u64;
        loop {
            let mut frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    // A mid-stream read error ends the video, same as EOS.
                    log::warn!(
                        "video stream ended early after {} frames: {:#}",
                        frames_read,
                        err
                    );
                    break;
                }
            };
            frames_read += 1;

            match run_detector(detector, &frame) {
                Ok(detections) => {
                    summary.update(&detections);
                    annotator.annotate(&mut frame, &detections);
                }
                Err(err) => {
                    frames_failed += 1;
                    log::warn!(
                        "detection failed on frame {}, writing it unannotated: {:#}",
                        frames_read,
                        err
                    );
                }
            }

            sink.write_frame(&frame)?;
        }

        sink.finish()?;
        let frames_written = sink.frames_written();
        log::info!(
            "transcode complete: {} frames read, {} written, {} detection failures -> {}",
            frames_read,
            frames_written,
            frames_failed,
            output_path.display()
        );

        Ok(TranscodeReport {
            output_path,
            frames_read,
            frames_written,
            frames_failed,
        })
    }

    /// Try encoder candidates in order; first ready sink wins and fixes the
    /// output extension. Partial output files of failed candidates are
    /// removed before moving on.
    fn open_sink(
        &self,
        output_base: &Path,
        meta: &VideoMeta,
    ) -> PipelineResult<(Box<dyn FrameSink>, PathBuf)> {
        let mut failures = Vec::new();
        for candidate in self.candidates {
            let path = path_with_extension(output_base, &candidate.extension);
            match self.video.create_sink(&path, candidate, meta) {
                Ok(sink) if sink.is_ready() => {
                    log::info!(
                        "encoder '{}' selected, writing {}",
                        candidate.codec,
                        path.display()
                    );
                    return Ok((sink, path));
                }
                Ok(_) => {
                    log::warn!(
                        "encoder '{}' constructed but is not ready, trying next candidate",
                        candidate.codec
                    );
                    failures.push(format!("{}: not ready", candidate.codec));
                }
                Err(err) => {
                    log::warn!(
                        "encoder '{}' failed to initialize, trying next candidate: {:#}",
                        candidate.codec,
                        err
                    );
                    failures.push(format!("{}: {err:#}", candidate.codec));
                }
            }
            if path.exists() {
                let _ = std::fs::remove_file(&path);
            }
        }

        Err(PipelineError::EncoderInit(if failures.is_empty() {
            "no encoder candidates configured".to_string()
        } else {
            failures.join("; ")
        }))
    }
}

fn run_detector(detector: &SharedBackend, frame: &Frame) -> Result<DetectionSet> {
    let mut guard = detector
        .lock()
        .map_err(|_| anyhow!("detector backend lock poisoned"))?;
    guard.detect(&frame.pixels, frame.width, frame.height)
}

/// Append a candidate's extension (".mp4" style) to a base path.
fn path_with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_os_string();
    raw.push(extension);
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_extension_is_appended_verbatim() {
        let base = Path::new("/tmp/media/output_clip");
        assert_eq!(
            path_with_extension(base, ".mp4"),
            PathBuf::from("/tmp/media/output_clip.mp4")
        );
        assert_eq!(
            path_with_extension(base, ".avi"),
            PathBuf::from("/tmp/media/output_clip.avi")
        );
    }

    #[test]
    fn default_candidates_prefer_h264() {
        let candidates = default_candidates();
        assert_eq!(candidates[0].codec, "libx264");
        assert!(candidates.len() >= 2);
    }
}
