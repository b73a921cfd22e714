//! In-memory video backend.
//!
//! Plays a scripted frame sequence as the decode source and records written
//! frames as the encode sink. Failure modes of the real backend (unopenable
//! source, mid-stream read errors, encoders that refuse to construct or
//! come up not ready) are all scriptable, so the transcoder and controller
//! can be exercised without system FFmpeg.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, VideoMeta};
use crate::video::{EncoderCandidate, FrameSink, FrameSource, VideoIo};

/// Scriptable in-memory `VideoIo` implementation.
pub struct SyntheticVideo {
    meta: VideoMeta,
    frames: Vec<Frame>,
    fail_open: bool,
    read_error_after: Option<u64>,
    rejected_codecs: HashSet<String>,
    not_ready_codecs: HashSet<String>,
    written: Arc<Mutex<Vec<Frame>>>,
}

impl SyntheticVideo {
    /// A source that serves `frame_count` black frames of the given geometry.
    pub fn with_black_frames(meta: VideoMeta, frame_count: usize) -> Self {
        let frames = (0..frame_count)
            .map(|_| Frame::black(meta.width, meta.height))
            .collect();
        Self::with_frames(meta, frames)
    }

    pub fn with_frames(meta: VideoMeta, frames: Vec<Frame>) -> Self {
        Self {
            meta,
            frames,
            fail_open: false,
            read_error_after: None,
            rejected_codecs: HashSet::new(),
            not_ready_codecs: HashSet::new(),
            written: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Script the source to fail at open time.
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Script a read error after `served` frames have been decoded.
    pub fn read_error_after(mut self, served: u64) -> Self {
        self.read_error_after = Some(served);
        self
    }

    /// Script an encoder that fails to construct.
    pub fn reject_codec(mut self, codec: impl Into<String>) -> Self {
        self.rejected_codecs.insert(codec.into());
        self
    }

    /// Script an encoder that constructs but reports not ready.
    pub fn codec_not_ready(mut self, codec: impl Into<String>) -> Self {
        self.not_ready_codecs.insert(codec.into());
        self
    }

    /// Handle onto the frames written by whichever sink was selected.
    pub fn written_frames(&self) -> Arc<Mutex<Vec<Frame>>> {
        self.written.clone()
    }
}

impl VideoIo for SyntheticVideo {
    fn open_source(&self, path: &Path) -> PipelineResult<Box<dyn FrameSource>> {
        if self.fail_open {
            return Err(PipelineError::Open(format!(
                "synthetic source refused to open '{}'",
                path.display()
            )));
        }
        Ok(Box::new(SyntheticSource {
            meta: self.meta,
            frames: self.frames.clone().into(),
            read_error_after: self.read_error_after,
            served: 0,
        }))
    }

    fn create_sink(
        &self,
        path: &Path,
        candidate: &EncoderCandidate,
        meta: &VideoMeta,
    ) -> Result<Box<dyn FrameSink>> {
        // Real encoders open the output file before they can fail; model
        // that so fallback cleanup of partial files is exercised.
        std::fs::write(path, b"")?;

        if self.rejected_codecs.contains(&candidate.codec) {
            return Err(anyhow!(
                "synthetic encoder '{}' is unsupported",
                candidate.codec
            ));
        }

        Ok(Box::new(SyntheticSink {
            meta: *meta,
            ready: !self.not_ready_codecs.contains(&candidate.codec),
            finished: false,
            written: self.written.clone(),
            count: 0,
        }))
    }
}

struct SyntheticSource {
    meta: VideoMeta,
    frames: std::collections::VecDeque<Frame>,
    read_error_after: Option<u64>,
    served: u64,
}

impl FrameSource for SyntheticSource {
    fn meta(&self) -> VideoMeta {
        self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.read_error_after == Some(self.served) {
            return Err(anyhow!("synthetic read error after {} frames", self.served));
        }
        match self.frames.pop_front() {
            Some(frame) => {
                self.served += 1;
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }
}

struct SyntheticSink {
    meta: VideoMeta,
    ready: bool,
    finished: bool,
    written: Arc<Mutex<Vec<Frame>>>,
    count: u64,
}

impl FrameSink for SyntheticSink {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("write after finish"));
        }
        if frame.width != self.meta.width || frame.height != self.meta.height {
            return Err(anyhow!(
                "frame geometry {}x{} does not match sink {}x{}",
                frame.width,
                frame.height,
                self.meta.width,
                self.meta.height
            ));
        }
        self.written
            .lock()
            .map_err(|_| anyhow!("synthetic sink lock poisoned"))?
            .push(frame.clone());
        self.count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> VideoMeta {
        VideoMeta {
            width: 8,
            height: 6,
            fps: 30.0,
        }
    }

    #[test]
    fn source_serves_scripted_frames_then_eos() {
        let video = SyntheticVideo::with_black_frames(meta(), 2);
        let mut source = video.open_source(Path::new("clip.mp4")).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn scripted_read_error_surfaces_mid_stream() {
        let video = SyntheticVideo::with_black_frames(meta(), 3).read_error_after(1);
        let mut source = video.open_source(Path::new("clip.mp4")).unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn sink_rejects_mismatched_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let video = SyntheticVideo::with_black_frames(meta(), 0);
        let candidate = EncoderCandidate::new("libx264", ".mp4");
        let mut sink = video
            .create_sink(&dir.path().join("out.mp4"), &candidate, &meta())
            .unwrap();
        assert!(sink.write_frame(&Frame::black(1, 1)).is_err());
        assert!(sink.write_frame(&Frame::black(8, 6)).is_ok());
        assert_eq!(sink.frames_written(), 1);
    }
}
