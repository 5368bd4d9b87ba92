use std::fs;
use std::io;
use std::path::{Path, PathBuf, is_separator};

use log::{error, info, warn};

use crate::classify::Classifier;
use crate::config::Config;
use crate::relocate::{Relocation, relocate_pair};
use crate::task::{Task, TaskKind, group_key};

/// What happened to one task.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Exit,
    /// A still image matched; the clip and that image were saved.
    Relocated(Relocation),
    /// No still image matched; nothing was touched. `failed` counts images
    /// that could not be opened or classified.
    NothingDetected { images: usize, failed: usize },
    /// A still image matched but the files could not be moved.
    RelocationFailed,
    /// A single still image was checked for diagnostics only.
    Inspected { detected: bool },
    /// The path named by the task does not exist.
    Missing,
    Ignored,
}

/// Runs one task end to end: pattern match, classification, relocation.
pub struct Processor {
    classifier: Classifier,
    save_dir: PathBuf,
    clip_extension: String,
    image_extension: String,
}

impl Processor {
    pub fn new(config: &Config, classifier: Classifier) -> Self {
        Self {
            classifier,
            save_dir: config.save_dir.clone(),
            clip_extension: config.clip_extension.clone(),
            image_extension: config.image_extension.clone(),
        }
    }

    pub fn process(&self, task: &Task) -> Outcome {
        match task.kind(&self.clip_extension, &self.image_extension) {
            TaskKind::Exit => Outcome::Exit,
            TaskKind::Clip(clip) if clip.exists() => self.process_clip(task.as_str(), &clip),
            TaskKind::Image(image) if image.exists() => {
                info!("Checking a single image (not moving it): {}", image.display());
                let result = self.classifier.classify_file(&image);
                Outcome::Inspected {
                    detected: result.detected(),
                }
            }
            TaskKind::Clip(path) | TaskKind::Image(path) => {
                warn!("Ignoring {}: file does not exist", path.display());
                Outcome::Missing
            }
            TaskKind::Unrecognized => {
                info!("Ignoring {task}: not a clip or image");
                Outcome::Ignored
            }
        }
    }

    fn process_clip(&self, raw_path: &str, clip: &Path) -> Outcome {
        let images = match event_images(raw_path, &self.image_extension) {
            Ok(images) => images,
            Err(err) => {
                warn!("Could not list images for {}: {err}", clip.display());
                Vec::new()
            }
        };
        let total = images.len();
        info!("Checking {} images in {}", total, clip.display());

        // First match wins; later images are never classified.
        let mut failed = 0;
        let mut first_match = None;
        for (i, image) in images.iter().enumerate() {
            info!("Checking {} [{}/{}]", image.display(), i + 1, total);
            let result = self.classifier.classify_file(image);
            if result.error.is_some() {
                failed += 1;
            }
            if result.detected() {
                first_match = Some(image);
                break;
            }
        }

        let Some(image) = first_match else {
            if failed > 0 {
                warn!("{failed} of {total} images for {} could not be checked", clip.display());
            }
            info!("Nothing to save for {}", clip.display());
            return Outcome::NothingDetected { images: total, failed };
        };

        info!("Saving {} and first detected image {}", clip.display(), image.display());
        match relocate_pair(&self.save_dir, clip, image) {
            Ok(relocation) => Outcome::Relocated(relocation),
            Err(err) => {
                error!("{err}");
                Outcome::RelocationFailed
            }
        }
    }
}

/// Still images belonging to the clip at `clip_path`: files named
/// `<key>-*<image_extension>` next to the key, where the key is the clip path
/// up to its first `-`. Returned in directory enumeration order.
pub fn event_images(clip_path: &str, image_extension: &str) -> io::Result<Vec<PathBuf>> {
    let key = group_key(clip_path);
    let (dir, stem) = match key.rfind(is_separator) {
        Some(idx) => (&key[..=idx], &key[idx + 1..]),
        None => ("", key),
    };
    let prefix = format!("{stem}-");
    let scan_dir = if dir.is_empty() { Path::new(".") } else { Path::new(dir) };

    let mut images = Vec::new();
    for entry in fs::read_dir(scan_dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let matches = name.len() >= prefix.len() + image_extension.len()
            && name.starts_with(&prefix)
            && name.ends_with(image_extension);
        // Follows symlinks, so linked images are checked like regular ones.
        if matches && entry.path().is_file() {
            images.push(Path::new(dir).join(name));
        }
    }
    Ok(images)
}
