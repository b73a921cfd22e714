//! scan_image - run damage detection over a single image.
//!
//! Decodes the image, runs the detector once, writes an annotated JPEG next
//! to the configured media directory, and prints the detections as JSON on
//! stdout.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use damage_scan::detect::BackendRegistry;
use damage_scan::pipeline::encode_jpeg;
use damage_scan::video::synthetic::SyntheticVideo;
use damage_scan::{Pipeline, ScanConfig, VideoMeta};

#[derive(Parser, Debug)]
#[command(name = "scan_image", version, about = "Detect vehicle damage in an image")]
struct Args {
    /// Image file to analyze.
    input: PathBuf,

    /// Where to write the annotated JPEG (defaults to the media directory).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON payload.
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ScanConfig::load()?;
    let registry = build_registry(&config)?;
    let detector = registry
        .default_backend()
        .ok_or_else(|| anyhow!("no detector backend available"))?;

    // Image analysis never touches the video path.
    let unused_video = SyntheticVideo::with_black_frames(
        VideoMeta {
            width: 1,
            height: 1,
            fps: 1.0,
        },
        0,
    );
    let pipeline = Pipeline::new(config, detector, Box::new(unused_video));

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("failed to read '{}'", args.input.display()))?;
    let analysis = pipeline.analyze_image(&bytes)?;

    let output = match args.output {
        Some(path) => path,
        None => {
            let stem = args
                .input
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| anyhow!("input path has no usable filename"))?;
            std::fs::create_dir_all(&pipeline.config().media_dir)?;
            pipeline
                .config()
                .media_dir
                .join(format!("output_{stem}.jpg"))
        }
    };
    std::fs::write(&output, encode_jpeg(&analysis.annotated)?)
        .with_context(|| format!("failed to write '{}'", output.display()))?;
    log::info!("annotated image written to {}", output.display());

    let payload = if args.pretty {
        serde_json::to_string_pretty(&analysis.detections)?
    } else {
        serde_json::to_string(&analysis.detections)?
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
    log::warn!("built without an inference backend; the image will report no damage");
    let mut registry = BackendRegistry::new();
    registry.register(damage_scan::detect::StubBackend::new());
    Ok(registry)
}
