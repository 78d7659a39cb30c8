//! Application configuration.
//!
//! Values here are stored as plain strings and numbers so the file stays
//! readable; `plateblur-frame-model` parses them into typed session settings.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default per-file processing settings.
    #[serde(default)]
    pub processing: ProcessingDefaults,

    /// Output naming and encoder settings.
    #[serde(default)]
    pub output: OutputDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default processing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingDefaults {
    /// Tracker algorithm name (CSRT, KCF, MIL, MOSSE, TEMPLATE).
    pub tracker: String,

    /// Run detection every N frames.
    pub detection_interval: u32,

    /// Minimum detector confidence.
    pub confidence_threshold: f32,

    /// IoU threshold used by the detector's non-max suppression.
    pub iou_threshold: f32,

    /// Fractional inset applied to each side of a box before redaction.
    pub shrink_factor: f64,

    /// Bridge detections with trackers. When false every frame is detected.
    pub tracking_enabled: bool,

    /// Redaction method name (blur, pixelate).
    pub redaction: String,

    /// Kernel size for blur, grid cells for pixelate.
    pub redaction_strength: u32,

    /// Path to the YOLO ONNX model.
    pub model_path: PathBuf,
}

/// Output parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputDefaults {
    /// Suffix inserted before the extension (`video.mp4` -> `video_blurred.mp4`).
    pub suffix: String,

    /// FFmpeg encoder name for video.
    pub video_encoder: String,

    /// FFmpeg encoder name for audio.
    pub audio_encoder: String,

    /// Write to a partial file and rename on success.
    pub atomic: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "plateblur=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingDefaults::default(),
            output: OutputDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ProcessingDefaults {
    fn default() -> Self {
        Self {
            tracker: "KCF".to_string(),
            detection_interval: 15,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            shrink_factor: 0.1,
            tracking_enabled: true,
            redaction: "blur".to_string(),
            redaction_strength: 15,
            model_path: PathBuf::from("yolo11n.onnx"),
        }
    }
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            suffix: "_blurred".to_string(),
            video_encoder: "libx264".to_string(),
            audio_encoder: "aac".to_string(),
            atomic: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, crate::error::PlateblurError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("plateblur").join("config.json")
}
