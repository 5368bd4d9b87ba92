use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use log::{info, warn};

use crate::detector::{Detection, Detector, Labels};

/// Outcome of checking one still image. A failed check carries its error and
/// counts as "nothing detected".
#[derive(Debug, Default)]
pub struct ClassifyResult {
    /// Detections scoring at or above the threshold.
    pub detections: Vec<Detection>,
    pub error: Option<String>,
}

impl ClassifyResult {
    pub fn detected(&self) -> bool {
        !self.detections.is_empty()
    }

    fn failed(err: impl fmt::Display) -> Self {
        Self {
            detections: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

/// Wraps the detector with decoding, thresholding and failure isolation.
pub struct Classifier {
    detector: Box<dyn Detector>,
    labels: Labels,
    threshold: f32,
}

impl Classifier {
    pub fn new(detector: Box<dyn Detector>, labels: Labels, threshold: f32) -> Self {
        Self {
            detector,
            labels,
            threshold,
        }
    }

    /// Never fails and never panics: open, decode and inference errors all
    /// come back as a negative result.
    pub fn classify_file(&self, path: &Path) -> ClassifyResult {
        let image = match image::open(path) {
            Ok(image) => image,
            Err(err) => {
                warn!("{}: failed to open image: {err}", path.display());
                return ClassifyResult::failed(err);
            }
        };

        let detections = match panic::catch_unwind(AssertUnwindSafe(|| {
            self.detector.detect(&image)
        })) {
            Ok(Ok(detections)) => detections,
            Ok(Err(err)) => {
                warn!("{}: detection failed: {err:#}", path.display());
                return ClassifyResult::failed(format!("{err:#}"));
            }
            Err(_) => {
                warn!("{}: detector panicked", path.display());
                return ClassifyResult::failed("detector panicked");
            }
        };

        let detections: Vec<Detection> = detections
            .into_iter()
            .filter(|d| d.score >= self.threshold)
            .collect();

        if detections.is_empty() {
            info!("{}: no objects", path.display());
        } else {
            info!("{}: found {} objects", path.display(), detections.len());
            for d in &detections {
                info!(
                    "  {} (id {}) score={:.2} bbox=[{:.0}, {:.0}, {:.0}, {:.0}]",
                    self.labels.describe(d.class_id),
                    d.class_id,
                    d.score,
                    d.bbox.xmin,
                    d.bbox.ymin,
                    d.bbox.xmax,
                    d.bbox.ymax
                );
            }
        }

        ClassifyResult {
            detections,
            error: None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedDetector, write_tagged_jpeg};
    use super::*;
    use crate::detector::{BoundingBox, lock_model};
    use anyhow::Result;
    use image::DynamicImage;
    use std::sync::Mutex;

    fn classifier(detector: ScriptedDetector) -> Classifier {
        Classifier::new(Box::new(detector), Labels::coco(), 0.50)
    }

    struct PanickingDetector;

    impl Detector for PanickingDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
            panic!("inference blew up")
        }
    }

    /// Panics on its first run while holding its state lock, then succeeds.
    #[derive(Default)]
    struct FlakyDetector {
        runs: Mutex<u32>,
    }

    impl Detector for FlakyDetector {
        fn detect(&self, _image: &DynamicImage) -> Result<Vec<Detection>> {
            let mut runs = lock_model(&self.runs);
            *runs += 1;
            if *runs == 1 {
                panic!("first inference blew up");
            }
            Ok(vec![Detection {
                class_id: 0,
                score: 0.9,
                bbox: BoundingBox {
                    xmin: 0.0,
                    ymin: 0.0,
                    xmax: 1.0,
                    ymax: 1.0,
                },
            }])
        }
    }

    #[test]
    fn keeps_detections_at_or_above_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let strong = dir.path().join("strong.jpg");
        let weak = dir.path().join("weak.jpg");
        let edge = dir.path().join("edge.jpg");
        write_tagged_jpeg(&strong, 3);
        write_tagged_jpeg(&weak, 4);
        write_tagged_jpeg(&edge, 5);

        let classifier = classifier(
            ScriptedDetector::new()
                .score(3, 0.81)
                .score(4, 0.40)
                .score(5, 0.50),
        );

        let result = classifier.classify_file(&strong);
        assert!(result.detected());
        assert!(result.error.is_none());
        assert!(!classifier.classify_file(&weak).detected());
        // A score equal to the threshold counts.
        assert!(classifier.classify_file(&edge).detected());
    }

    #[test]
    fn missing_file_is_a_negative_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let detector = ScriptedDetector::new();
        let classifier = classifier(detector.clone());

        let result = classifier.classify_file(&dir.path().join("gone.jpg"));
        assert!(!result.detected());
        assert!(result.error.is_some());
        assert!(detector.calls().is_empty());
    }

    #[test]
    fn corrupt_file_is_a_negative_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("corrupt.jpg");
        std::fs::write(&path, b"definitely not a jpeg").expect("write");

        let result = classifier(ScriptedDetector::new()).classify_file(&path);
        assert!(!result.detected());
        assert!(result.error.is_some());
    }

    #[test]
    fn detector_error_is_a_negative_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.jpg");
        write_tagged_jpeg(&path, 6);

        let result = classifier(ScriptedDetector::new().failing(6)).classify_file(&path);
        assert!(!result.detected());
        assert!(result.error.as_deref().is_some_and(|e| e.contains("scripted failure")));
    }

    #[test]
    fn detector_panic_is_contained() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("boom.jpg");
        write_tagged_jpeg(&path, 7);

        let classifier = Classifier::new(Box::new(PanickingDetector), Labels::coco(), 0.50);
        let result = classifier.classify_file(&path);
        assert!(!result.detected());
        assert_eq!(result.error.as_deref(), Some("detector panicked"));
    }

    #[test]
    fn detector_recovers_after_a_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("first.jpg");
        let second = dir.path().join("second.jpg");
        write_tagged_jpeg(&first, 8);
        write_tagged_jpeg(&second, 9);

        let classifier = Classifier::new(Box::new(FlakyDetector::default()), Labels::coco(), 0.50);

        let result = classifier.classify_file(&first);
        assert_eq!(result.error.as_deref(), Some("detector panicked"));
        // The poisoned state lock must not disable detection for later images.
        let result = classifier.classify_file(&second);
        assert!(result.error.is_none());
        assert!(result.detected());
    }
}
