use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use hf_hub::{Repo, RepoType, api::sync::Api};
use image::{DynamicImage, GenericImageView, imageops::FilterType};
use log::{debug, info};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::{Tensor, Value};

use super::{BoundingBox, Detection, Detector, lock_model};
use crate::config::DetectorConfig;

const OUTPUT_NAME: &str = "output0";
// cx, cy, w, h ahead of the per-class scores
const BOX_FEATURES: usize = 4;

/// YOLOv8 ONNX export run through ONNX Runtime.
///
/// Output layout is `[1, 4 + classes, candidates]`, feature-major.
pub struct YoloDetector {
    session: Mutex<Session>,
    input_size: u32,
    num_classes: usize,
    score_floor: f32,
    nms_threshold: f32,
}

impl YoloDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let model_path = resolve_model(config)?;
        info!("Loading object detection model from {}", model_path.display());

        let model_bytes = std::fs::read(&model_path)
            .with_context(|| format!("failed to read model {}", model_path.display()))?;
        let session = Session::builder()
            .map_err(|e| anyhow!("failed to create session builder: {e}"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| anyhow!("failed to set optimization level: {e}"))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| anyhow!("failed to load ONNX model: {e}"))?;

        Ok(Self {
            session: Mutex::new(session),
            input_size: config.input_size,
            num_classes: config.num_classes,
            score_floor: config.score_floor,
            nms_threshold: config.nms_threshold,
        })
    }

    /// Stretches to the square input and lays the pixels out as NCHW floats
    /// in [0, 1].
    fn preprocess(&self, image: &DynamicImage) -> Result<Value> {
        let side = self.input_size as usize;
        let plane = side * side;
        let rgb = image
            .resize_exact(self.input_size, self.input_size, FilterType::Triangle)
            .to_rgb8();

        let mut data = vec![0f32; 3 * plane];
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }

        Tensor::from_array((vec![1usize, 3, side, side], data.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| anyhow!("failed to create input tensor: {e}"))
    }

    fn infer(&self, input: Value) -> Result<Vec<f32>> {
        let mut session = lock_model(&self.session);
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| anyhow!("inference failed: {e}"))?;
        let output = outputs
            .get(OUTPUT_NAME)
            .ok_or_else(|| anyhow!("model has no {OUTPUT_NAME} tensor"))?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| anyhow!("failed to extract {OUTPUT_NAME}: {e}"))?;
        Ok(data.to_vec())
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>> {
        let input = self.preprocess(image)?;
        let raw = self.infer(input)?;
        let candidates = decode_output(
            &raw,
            self.num_classes,
            self.input_size,
            image.dimensions(),
            self.score_floor,
        )?;
        let detections = non_max_suppression(candidates, self.nms_threshold);
        debug!("{} detections after NMS", detections.len());
        Ok(detections)
    }
}

fn resolve_model(config: &DetectorConfig) -> Result<PathBuf> {
    if let Some(repo_id) = &config.model_repo {
        info!("Fetching {} from {}", config.model_file, repo_id);
        let api = Api::new()?;
        let repo = api.repo(Repo::new(repo_id.clone(), RepoType::Model));
        return Ok(repo.get(&config.model_file)?);
    }

    if !config.model_path.exists() {
        bail!("model not found at {}", config.model_path.display());
    }
    Ok(config.model_path.clone())
}

/// Picks the best class per candidate and maps boxes back to source pixels.
fn decode_output(
    raw: &[f32],
    num_classes: usize,
    input_size: u32,
    (width, height): (u32, u32),
    score_floor: f32,
) -> Result<Vec<Detection>> {
    let features = BOX_FEATURES + num_classes;
    if raw.is_empty() || raw.len() % features != 0 {
        bail!(
            "unexpected output length {} for {} classes",
            raw.len(),
            num_classes
        );
    }
    let candidates = raw.len() / features;
    let at = |feature: usize, i: usize| raw[feature * candidates + i];

    let scale_x = width as f32 / input_size as f32;
    let scale_y = height as f32 / input_size as f32;

    let mut detections = Vec::new();
    for i in 0..candidates {
        let (class_id, score) = (0..num_classes)
            .map(|c| (c, at(BOX_FEATURES + c, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if score < score_floor {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        detections.push(Detection {
            class_id,
            score,
            bbox: BoundingBox {
                xmin: ((cx - w / 2.0) * scale_x).clamp(0.0, width as f32),
                ymin: ((cy - h / 2.0) * scale_y).clamp(0.0, height as f32),
                xmax: ((cx + w / 2.0) * scale_x).clamp(0.0, width as f32),
                ymax: ((cy + h / 2.0) * scale_y).clamp(0.0, height as f32),
            },
        });
    }
    Ok(detections)
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Detection> = Vec::new();
    for candidate in detections {
        let overlaps = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && kept.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            keep.push(candidate);
        }
    }
    keep
}
