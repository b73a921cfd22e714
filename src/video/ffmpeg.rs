#![cfg(feature = "video-ffmpeg")]

//! FFmpeg-backed video backend.
//!
//! Decodes the input container to RGB24 frames and re-encodes annotated
//! frames through whichever codec candidate initializes first. All FFmpeg
//! handles are owned by the source/sink structs and freed on drop; `finish`
//! additionally flushes the encoder and writes the container trailer.

use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use ffmpeg_next as ffmpeg;

use crate::error::{PipelineError, PipelineResult};
use crate::frame::{Frame, VideoMeta};
use crate::video::{EncoderCandidate, FrameSink, FrameSource, VideoIo};

const FALLBACK_FPS: f64 = 25.0;

/// `VideoIo` implementation over libav via `ffmpeg-next`.
pub struct FfmpegVideo;

impl FfmpegVideo {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegVideo {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoIo for FfmpegVideo {
    fn open_source(&self, path: &Path) -> PipelineResult<Box<dyn FrameSource>> {
        let source = FfmpegSource::open(path)
            .map_err(|err| PipelineError::Open(format!("{err:#}")))?;
        Ok(Box::new(source))
    }

    fn create_sink(
        &self,
        path: &Path,
        candidate: &EncoderCandidate,
        meta: &VideoMeta,
    ) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::create(path, candidate, meta)?))
    }
}

/// Decode side: container input, best video stream, RGB24 scaler.
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    meta: VideoMeta,
    flushed: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open video input '{}'", path.display()))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("input has no video track"))?;
        let stream_index = input_stream.index();

        let fps = f64::from(input_stream.avg_frame_rate());
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let meta = VideoMeta {
            width: decoder.width(),
            height: decoder.height(),
            fps: if fps > 0.0 { fps } else { FALLBACK_FPS },
        };

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            meta,
            flushed: false,
        })
    }

    /// Feed the decoder one packet from the video stream. Returns false when
    /// the demuxer is exhausted and the decoder has been sent EOF.
    fn feed_decoder(&mut self) -> Result<bool> {
        for (stream, packet) in self.input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("send packet to ffmpeg decoder")?;
            return Ok(true);
        }
        self.decoder.send_eof().context("flush ffmpeg decoder")?;
        self.flushed = true;
        Ok(false)
    }

    fn convert(&mut self, decoded: &ffmpeg::frame::Video) -> Result<Frame> {
        let mut rgb = ffmpeg::frame::Video::empty();
        self.scaler
            .run(decoded, &mut rgb)
            .context("scale frame to RGB")?;

        let width = rgb.width();
        let height = rgb.height();
        let row_bytes = (width as usize) * 3;
        let stride = rgb.stride(0);
        let data = rgb.data(0);

        let pixels = if stride == row_bytes {
            data.to_vec()
        } else {
            let mut pixels = Vec::with_capacity(row_bytes * height as usize);
            for row in 0..height as usize {
                let start = row * stride;
                let end = start + row_bytes;
                pixels.extend_from_slice(
                    data.get(start..end)
                        .context("ffmpeg frame row is out of bounds")?,
                );
            }
            pixels
        };

        Frame::new(pixels, width, height)
    }
}

impl FrameSource for FfmpegSource {
    fn meta(&self) -> VideoMeta {
        self.meta
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return Ok(Some(self.convert(&decoded)?));
            }
            if self.flushed {
                return Ok(None);
            }
            self.feed_decoder()?;
        }
    }
}

/// Encode side: one video stream, RGB24 input rescaled to the encoder's
/// preferred pixel format, interleaved writes.
pub struct FfmpegSink {
    octx: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    meta: VideoMeta,
    next_pts: i64,
    finished: bool,
}

impl FfmpegSink {
    pub fn create(path: &Path, candidate: &EncoderCandidate, meta: &VideoMeta) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let codec = ffmpeg::encoder::find_by_name(&candidate.codec)
            .ok_or_else(|| anyhow!("encoder '{}' is not available", candidate.codec))?;

        let mut octx = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to open output '{}'", path.display()))?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let fps = if meta.fps > 0.0 { meta.fps } else { FALLBACK_FPS };
        let frame_rate = ffmpeg::Rational::from(fps);
        let encoder_time_base = frame_rate.invert();
        let pixel_format = preferred_pixel_format(codec);

        let mut video = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create video encoder context")?;
        video.set_width(meta.width);
        video.set_height(meta.height);
        video.set_format(pixel_format);
        video.set_frame_rate(Some(frame_rate));
        video.set_time_base(encoder_time_base);
        if global_header {
            video.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }

        let encoder = video
            .open_as(codec)
            .with_context(|| format!("failed to open encoder '{}'", candidate.codec))?;

        let stream_index = {
            let mut stream = octx
                .add_stream(codec)
                .context("add output video stream")?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.index()
        };

        octx.write_header().context("write container header")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            meta.width,
            meta.height,
            pixel_format,
            meta.width,
            meta.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create encoder scaler")?;

        Ok(Self {
            octx,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            meta: *meta,
            next_pts: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let stream_time_base = self
            .octx
            .stream(self.stream_index)
            .ok_or_else(|| anyhow!("output stream disappeared"))?
            .time_base();
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, stream_time_base);
            packet
                .write_interleaved(&mut self.octx)
                .context("write encoded packet")?;
        }
        Ok(())
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if frame.width != self.meta.width || frame.height != self.meta.height {
            return Err(anyhow!(
                "frame geometry {}x{} does not match encoder {}x{}",
                frame.width,
                frame.height,
                self.meta.width,
                self.meta.height
            ));
        }

        let mut rgb = ffmpeg::frame::Video::new(
            ffmpeg::util::format::pixel::Pixel::RGB24,
            frame.width,
            frame.height,
        );
        let row_bytes = (frame.width as usize) * 3;
        let stride = rgb.stride(0);
        {
            let data = rgb.data_mut(0);
            for row in 0..frame.height as usize {
                let src = row * row_bytes;
                let dst = row * stride;
                data[dst..dst + row_bytes].copy_from_slice(&frame.pixels[src..src + row_bytes]);
            }
        }

        let mut encodable = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut encodable)
            .context("scale frame for encoder")?;
        encodable.set_pts(Some(self.next_pts));

        self.encoder
            .send_frame(&encodable)
            .context("send frame to encoder")?;
        self.next_pts += 1;
        self.drain_packets()
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.encoder.send_eof().context("flush encoder")?;
        self.drain_packets()?;
        self.octx
            .write_trailer()
            .context("write container trailer")?;
        self.finished = true;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.next_pts as u64
    }
}

/// First pixel format the codec advertises, or YUV420P when it does not say.
fn preferred_pixel_format(codec: ffmpeg::Codec) -> ffmpeg::util::format::pixel::Pixel {
    codec
        .video()
        .ok()
        .and_then(|video| video.formats().and_then(|mut formats| formats.next()))
        .unwrap_or(ffmpeg::util::format::pixel::Pixel::YUV420P)
}
