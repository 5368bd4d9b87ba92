use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::WatchError;

/// The 80 COCO classes, in YOLOv8 output order.
const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Class id to display name. Only used for log output.
#[derive(Debug, Clone)]
pub struct Labels {
    names: HashMap<usize, String>,
}

impl Labels {
    pub fn coco() -> Self {
        Self {
            names: COCO_CLASSES
                .iter()
                .enumerate()
                .map(|(id, name)| (id, name.to_string()))
                .collect(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, WatchError> {
        let text = fs::read_to_string(path).map_err(|err| {
            WatchError::Config(format!("Failed to read label file {}: {err}", path.display()))
        })?;
        Ok(Self::parse(&text))
    }

    /// Accepts either `<id> <name>` / `<id>: <name>` lines or one bare name
    /// per line, where the line number is the id.
    pub fn parse(text: &str) -> Self {
        let mut names = HashMap::new();
        for (row, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match split_id(line) {
                Some((id, name)) => names.insert(id, name.to_string()),
                None => names.insert(row, line.to_string()),
            };
        }
        Self { names }
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    /// The label for `class_id`, or the id itself when unknown.
    pub fn describe(&self, class_id: usize) -> String {
        self.get(class_id)
            .map(str::to_string)
            .unwrap_or_else(|| class_id.to_string())
    }
}

fn split_id(line: &str) -> Option<(usize, &str)> {
    let end = line.find(|c: char| c == ':' || c.is_whitespace())?;
    let id = line[..end].parse().ok()?;
    let name = line[end..].trim_start_matches(|c: char| c == ':' || c.is_whitespace());
    if name.is_empty() { None } else { Some((id, name)) }
}
