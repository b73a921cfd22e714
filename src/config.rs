use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::video::{default_candidates, EncoderCandidate};

const DEFAULT_MEDIA_DIR: &str = "static/videos";
const DEFAULT_URL_PREFIX: &str = "/static/videos";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    media_dir: Option<String>,
    url_prefix: Option<String>,
    model: Option<ModelConfigFile>,
    codecs: Option<Vec<EncoderCandidate>>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
}

/// Runtime configuration for the scan pipeline.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory where input and output media files are staged.
    pub media_dir: PathBuf,
    /// URL prefix under which `media_dir` is served.
    pub url_prefix: String,
    /// ONNX damage model, when an inference backend is compiled in.
    pub model_path: Option<PathBuf>,
    /// Model-space confidence threshold (0..1).
    pub confidence_threshold: f32,
    /// Encoder candidates, tried in order.
    pub codecs: Vec<EncoderCandidate>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from(DEFAULT_MEDIA_DIR),
            url_prefix: DEFAULT_URL_PREFIX.to_string(),
            model_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            codecs: default_candidates(),
        }
    }
}

impl ScanConfig {
    /// Load configuration: optional JSON file named by `DAMAGE_SCAN_CONFIG`,
    /// then environment overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DAMAGE_SCAN_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScanConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            media_dir: file
                .media_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.media_dir),
            url_prefix: file.url_prefix.unwrap_or(defaults.url_prefix),
            model_path: file.model.as_ref().and_then(|model| model.path.clone()),
            confidence_threshold: file
                .model
                .and_then(|model| model.confidence_threshold)
                .unwrap_or(defaults.confidence_threshold),
            codecs: file.codecs.unwrap_or(defaults.codecs),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("DAMAGE_SCAN_MEDIA_DIR") {
            if !dir.trim().is_empty() {
                self.media_dir = PathBuf::from(dir);
            }
        }
        if let Ok(prefix) = std::env::var("DAMAGE_SCAN_URL_PREFIX") {
            if !prefix.trim().is_empty() {
                self.url_prefix = prefix;
            }
        }
        if let Ok(model) = std::env::var("DAMAGE_SCAN_MODEL") {
            if !model.trim().is_empty() {
                self.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(threshold) = std::env::var("DAMAGE_SCAN_CONFIDENCE") {
            self.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("DAMAGE_SCAN_CONFIDENCE must be a number in (0, 1]"))?;
        }
        if let Ok(codecs) = std::env::var("DAMAGE_SCAN_CODECS") {
            let parsed = parse_codec_list(&codecs)?;
            if !parsed.is_empty() {
                self.codecs = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.media_dir.as_os_str().is_empty() {
            return Err(anyhow!("media_dir must not be empty"));
        }
        if !self.url_prefix.starts_with('/') {
            return Err(anyhow!("url_prefix must start with '/'"));
        }
        while self.url_prefix.len() > 1 && self.url_prefix.ends_with('/') {
            self.url_prefix.pop();
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) || self.confidence_threshold == 0.0 {
            return Err(anyhow!("confidence threshold must be in (0, 1]"));
        }
        if self.codecs.is_empty() {
            return Err(anyhow!("at least one encoder candidate is required"));
        }
        for candidate in &self.codecs {
            if candidate.codec.trim().is_empty() {
                return Err(anyhow!("encoder candidate has an empty codec name"));
            }
            if !candidate.extension.starts_with('.') {
                return Err(anyhow!(
                    "extension '{}' for codec '{}' must start with '.'",
                    candidate.extension,
                    candidate.codec
                ));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScanConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Parse a `codec=.ext,codec=.ext` list from the environment.
fn parse_codec_list(value: &str) -> Result<Vec<EncoderCandidate>> {
    let mut candidates = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (codec, extension) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("codec entry '{}' must look like name=.ext", entry))?;
        candidates.push(EncoderCandidate::new(codec.trim(), extension.trim()));
    }
    Ok(candidates)
}
