#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{DamageClass, Detection, DetectionSet};

const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend running a YOLO-style ONNX damage model.
///
/// The model is loaded from a local file and expects a square NCHW float
/// input normalized to [0, 1]. Output proposals are decoded into pixel-space
/// boxes in the original frame, filtered by confidence and greedy NMS.
pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    input_size: u32,
    confidence_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        Self::with_input_size(model_path, DEFAULT_INPUT_SIZE)
    }

    pub fn with_input_size<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        })
    }

    /// Override the default confidence threshold (model space, 0..1).
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    fn build_input(&self, pixels: &[u8], width: u32, height: u32) -> Result<Tensor> {
        let expected_len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let frame = RgbImage::from_raw(width, height, pixels.to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = image::imageops::resize(
            &frame,
            self.input_size,
            self.input_size,
            image::imageops::FilterType::Triangle,
        );
        let raw = resized.as_raw();

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, side, side),
            |(_, channel, y, x)| {
                let idx = (y * side + x) * 3 + channel;
                raw[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_proposals(
        &self,
        outputs: TVec<TValue>,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<Vec<Candidate>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[1] < 5 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let class_count = shape[1] - 4;
        let proposals = shape[2];

        let scale_x = frame_width as f32 / self.input_size as f32;
        let scale_y = frame_height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..proposals {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..class_count {
                let score = view[[0, 4 + c, i]];
                if score > best_score {
                    best_score = score;
                    best_class = c;
                }
            }
            if best_score < self.confidence_threshold {
                continue;
            }
            let Some(label) = DamageClass::from_index(best_class) else {
                // Model emits more classes than the vocabulary; skip extras.
                continue;
            };

            // Proposal layout: center x/y and width/height in input space.
            let cx = view[[0, 0, i]];
            let cy = view[[0, 1, i]];
            let w = view[[0, 2, i]];
            let h = view[[0, 3, i]];

            let x1 = (cx - w / 2.0) * scale_x;
            let y1 = (cy - h / 2.0) * scale_y;
            let bw = w * scale_x;
            let bh = h * scale_y;

            candidates.push(Candidate {
                x1,
                y1,
                x2: x1 + bw,
                y2: y1 + bh,
                score: best_score,
                label,
            });
        }

        Ok(candidates)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    /// Run one zero frame through the model so the first real frame does not
    /// pay for lazy kernel setup.
    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let input = Tensor::zero::<f32>(&[1, 3, side, side]).context("allocate warm-up tensor")?;
        self.model
            .run(tvec!(input.into()))
            .context("model warm-up inference failed")?;
        Ok(())
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<DetectionSet> {
        let input = self.build_input(pixels, width, height)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let candidates = self.decode_proposals(outputs, width, height)?;
        let kept = nms(candidates, IOU_THRESHOLD);

        let detections = kept
            .into_iter()
            .map(|c| {
                Detection::new(
                    c.x1.round() as i32,
                    c.y1.round() as i32,
                    (c.x2 - c.x1).round() as i32,
                    (c.y2 - c.y1).round() as i32,
                    c.label,
                    c.score * 100.0,
                )
            })
            .collect();

        Ok(DetectionSet::new(detections))
    }
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    label: DamageClass,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}

/// Greedy NMS: sort by score descending, suppress overlapping boxes.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(candidates[i]);
        for j in (i + 1)..candidates.len() {
            if candidates[i].iou(&candidates[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    kept
}
