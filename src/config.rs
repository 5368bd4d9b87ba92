use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::WatchError;

const CONFIG_ENV: &str = "CLIPWATCH_CONFIG";
const CONFIG_DIR: &str = ".clipwatch";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_PORT: u16 = 19011;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_SAVE_DIR: &str = "/media/usbdisk/motion/saves/";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.50;
const DEFAULT_READ_TIMEOUT_MS: u64 = 2_000;
const DEFAULT_IDLE_WAIT_MS: u64 = 100;

/// Daemon configuration. Every field has a compiled-in default, so a missing
/// config file means the daemon runs with exactly these values.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Clips and their first matching image are moved here.
    pub save_dir: PathBuf,
    /// Detections scoring below this are treated as absent.
    pub confidence_threshold: f32,
    pub clip_extension: String,
    pub image_extension: String,
    /// How long the listener waits for a connected client to send its path.
    pub read_timeout_ms: u64,
    /// How long the worker blocks on an empty queue before re-checking.
    pub idle_wait_ms: u64,
    pub detector: DetectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            clip_extension: ".mp4".to_string(),
            image_extension: ".jpg".to_string(),
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
            detector: DetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Local ONNX export of a YOLOv8 model.
    pub model_path: PathBuf,
    /// When set, the model is fetched from this Hugging Face repo instead of
    /// `model_path`.
    pub model_repo: Option<String>,
    pub model_file: String,
    pub label_file: Option<PathBuf>,
    pub input_size: u32,
    pub num_classes: usize,
    /// Candidates below this never reach NMS.
    pub score_floor: f32,
    pub nms_threshold: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8n.onnx"),
            model_repo: None,
            model_file: "yolov8n.onnx".to_string(),
            label_file: None,
            input_size: 640,
            num_classes: 80,
            score_floor: 0.25,
            nms_threshold: 0.45,
        }
    }
}

impl Config {
    /// Loads the config file named by `CLIPWATCH_CONFIG`, or
    /// `~/.clipwatch/config.json`, falling back to defaults when the default
    /// location has no file.
    pub fn load() -> Result<Self, WatchError> {
        if let Ok(explicit) = env::var(CONFIG_ENV) {
            return Self::from_file(Path::new(&explicit));
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, WatchError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            WatchError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|err| {
            WatchError::Config(format!("Invalid config {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }

    fn validate(&self) -> Result<(), WatchError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(WatchError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        for (name, ext) in [
            ("clip_extension", &self.clip_extension),
            ("image_extension", &self.image_extension),
        ] {
            if ext.len() < 2 || !ext.starts_with('.') {
                return Err(WatchError::Config(format!(
                    "{name} must look like \".ext\", got {ext:?}"
                )));
            }
        }
        if self.clip_extension == self.image_extension {
            return Err(WatchError::Config(
                "clip_extension and image_extension must differ".to_string(),
            ));
        }
        // A zero read timeout is rejected by the socket layer.
        if self.read_timeout_ms == 0 {
            return Err(WatchError::Config(
                "read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.detector.input_size == 0 || self.detector.num_classes == 0 {
            return Err(WatchError::Config(
                "detector input_size and num_classes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_daemon() {
        let config = Config::default();
        assert_eq!(config.port, 19011);
        assert_eq!(config.save_dir, PathBuf::from("/media/usbdisk/motion/saves/"));
        assert!((config.confidence_threshold - 0.50).abs() < f32::EPSILON);
        assert_eq!(config.clip_extension, ".mp4");
        assert_eq!(config.image_extension, ".jpg");
        assert_eq!(config.bind_addr(), "0.0.0.0:19011");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overlays_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "port": 20000, "save_dir": "/srv/saves", "detector": { "input_size": 320 } }"#,
        )
        .expect("write config");

        let config = Config::from_file(&path).expect("load config");
        assert_eq!(config.port, 20000);
        assert_eq!(config.save_dir, PathBuf::from("/srv/saves"));
        assert_eq!(config.detector.input_size, 320);
        assert_eq!(config.detector.num_classes, 80);
        assert_eq!(config.clip_extension, ".mp4");
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{ port: ").expect("write config");

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = Config {
            confidence_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bare_extension() {
        let config = Config {
            clip_extension: "mp4".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
