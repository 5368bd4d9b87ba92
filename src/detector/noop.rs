use anyhow::Result;
use image::DynamicImage;

use super::{Detection, Detector};

/// Detector that never finds anything - used when no model is available.
pub struct NoOpDetector;

impl NoOpDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for NoOpDetector {
    fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
        Ok(vec![])
    }
}
