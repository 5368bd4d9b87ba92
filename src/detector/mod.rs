use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use image::DynamicImage;
use log::{info, warn};

use crate::config::DetectorConfig;

/// Axis-aligned box in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0) * (self.ymax - self.ymin).max(0.0)
    }

    /// Intersection over union.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = BoundingBox {
            xmin: self.xmin.max(other.xmin),
            ymin: self.ymin.max(other.ymin),
            xmax: self.xmax.min(other.xmax),
            ymax: self.ymax.min(other.ymax),
        }
        .area();
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// One object found in an image.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    /// Confidence in [0, 1].
    pub score: f32,
    pub bbox: BoundingBox,
}

/// Pluggable object detector.
pub trait Detector: Send {
    /// Runs inference on a decoded image. Resizing and normalization to the
    /// model's input contract happen inside.
    fn detect(&self, image: &DynamicImage) -> Result<Vec<Detection>>;
}

/// Locks a detector's model state. A panic during an earlier inference leaves
/// the mutex poisoned, but the model is still usable for the next image.
pub fn lock_model<T>(model: &Mutex<T>) -> MutexGuard<'_, T> {
    model.lock().unwrap_or_else(PoisonError::into_inner)
}

mod labels;
mod noop;
mod yolo;

pub use labels::Labels;
pub use noop::NoOpDetector;
pub use yolo::YoloDetector;

/// Loads the configured model, or a detector that never finds anything when
/// the model cannot be loaded.
pub fn load(config: &DetectorConfig) -> Box<dyn Detector> {
    match YoloDetector::new(config) {
        Ok(detector) => {
            info!("Object detection model loaded");
            Box::new(detector)
        }
        Err(err) => {
            warn!("Object detector unavailable ({err:#}), using no-op; nothing will be saved");
            Box::new(NoOpDetector::new())
        }
    }
}
