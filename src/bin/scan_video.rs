//! scan_video - run damage detection over a video file.
//!
//! Decodes the input, runs the detector on every frame, draws the detections
//! back onto the frames, re-encodes the annotated video under the configured
//! media directory, and prints the response payload (output URL plus the
//! damage summary) as JSON on stdout.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use damage_scan::detect::BackendRegistry;
use damage_scan::video::VideoIo;
use damage_scan::{Pipeline, ScanConfig};

#[derive(Parser, Debug)]
#[command(name = "scan_video", version, about = "Detect vehicle damage in a video")]
struct Args {
    /// Video file to analyze.
    input: PathBuf,

    /// Detector backend to use (defaults to the first registered).
    #[arg(long, env = "DAMAGE_SCAN_BACKEND")]
    backend: Option<String>,

    /// Pretty-print the JSON payload.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ScanConfig::load()?;
    let registry = build_registry(&config)?;
    let detector = match &args.backend {
        Some(name) => registry.get(name).ok_or_else(|| {
            anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                registry.list().join(", ")
            )
        })?,
        None => registry
            .default_backend()
            .ok_or_else(|| anyhow!("no detector backend available"))?,
    };

    let pipeline = Pipeline::new(config, detector, video_backend()?);

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let filename = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("input path has no usable filename"))?;

    let analysis = pipeline.analyze_video(&bytes, filename)?;
    let payload = if args.pretty {
        serde_json::to_string_pretty(&analysis)?
    } else {
        serde_json::to_string(&analysis)?
    };
    println!("{payload}");
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_registry(config: &ScanConfig) -> Result<BackendRegistry> {
    use damage_scan::detect::{DetectorBackend, TractBackend};

    let model_path = config
        .model_path
        .as_deref()
        .ok_or_else(|| anyhow!("no model configured; set DAMAGE_SCAN_MODEL"))?;
    let mut backend = TractBackend::new(model_path)?.with_threshold(config.confidence_threshold);
    backend.warm_up()?;
    let mut registry = BackendRegistry::new();
    registry.register(backend);
    Ok(registry)
}

#[cfg(not(feature = "backend-tract"))]
fn build_registry(_config: &ScanConfig) -> Result<BackendRegistry> {
    log::warn!("built without an inference backend; every frame will report no damage");
    let mut registry = BackendRegistry::new();
    registry.register(damage_scan::detect::StubBackend::new());
    Ok(registry)
}

#[cfg(feature = "video-ffmpeg")]
fn video_backend() -> Result<Box<dyn VideoIo>> {
    Ok(Box::new(damage_scan::video::ffmpeg::FfmpegVideo::new()))
}

#[cfg(not(feature = "video-ffmpeg"))]
fn video_backend() -> Result<Box<dyn VideoIo>> {
    Err(anyhow!(
        "built without the 'video-ffmpeg' feature; video decoding is unavailable"
    ))
}
