//! Per-file processing settings.
//!
//! A [`SessionConfig`] is built once per input file, validated, and then
//! treated as immutable for the whole run.

use std::str::FromStr;

use plateblur_common::config::ProcessingDefaults;
use plateblur_common::error::{PlateblurError, PlateblurResult};
use serde::{Deserialize, Serialize};

/// Single-region tracker strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackerAlgorithm {
    /// Discriminative correlation filter with channel and spatial reliability.
    Csrt,
    /// Kernelized correlation filter.
    Kcf,
    /// Multiple instance learning.
    Mil,
    /// Minimum output sum of squared error filter.
    Mosse,
    /// Built-in template matcher, available without OpenCV.
    Template,
}

impl TrackerAlgorithm {
    pub const ALL: [TrackerAlgorithm; 5] = [
        TrackerAlgorithm::Csrt,
        TrackerAlgorithm::Kcf,
        TrackerAlgorithm::Mil,
        TrackerAlgorithm::Mosse,
        TrackerAlgorithm::Template,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrackerAlgorithm::Csrt => "CSRT",
            TrackerAlgorithm::Kcf => "KCF",
            TrackerAlgorithm::Mil => "MIL",
            TrackerAlgorithm::Mosse => "MOSSE",
            TrackerAlgorithm::Template => "TEMPLATE",
        }
    }

    /// Whether the algorithm is provided by OpenCV.
    pub fn requires_opencv(&self) -> bool {
        !matches!(self, TrackerAlgorithm::Template)
    }
}

impl FromStr for TrackerAlgorithm {
    type Err = PlateblurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CSRT" => Ok(TrackerAlgorithm::Csrt),
            "KCF" => Ok(TrackerAlgorithm::Kcf),
            "MIL" => Ok(TrackerAlgorithm::Mil),
            "MOSSE" => Ok(TrackerAlgorithm::Mosse),
            "TEMPLATE" => Ok(TrackerAlgorithm::Template),
            other => Err(PlateblurError::config(format!(
                "Unsupported tracker type: {other}. Use: CSRT, KCF, MIL, MOSSE, TEMPLATE"
            ))),
        }
    }
}

impl std::fmt::Display for TrackerAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a plate region is made unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum RedactionMethod {
    /// Mean filter over a `kernel x kernel` window.
    Blur { kernel: u32 },
    /// Average the region into a `cells x cells` grid.
    Pixelate { cells: u32 },
}

impl RedactionMethod {
    /// Parse a method name with its strength parameter.
    pub fn from_name(name: &str, strength: u32) -> PlateblurResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "blur" => Ok(RedactionMethod::Blur { kernel: strength }),
            "pixelate" => Ok(RedactionMethod::Pixelate { cells: strength }),
            other => Err(PlateblurError::config(format!(
                "Unknown redaction method: {other}. Use: blur, pixelate"
            ))),
        }
    }

    pub fn strength(&self) -> u32 {
        match *self {
            RedactionMethod::Blur { kernel } => kernel,
            RedactionMethod::Pixelate { cells } => cells,
        }
    }
}

impl Default for RedactionMethod {
    fn default() -> Self {
        RedactionMethod::Blur { kernel: 15 }
    }
}

/// Validated settings for one input/output pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub tracker_algorithm: TrackerAlgorithm,

    /// Run detection on frame 1 and on every frame divisible by this value.
    pub detection_interval: u32,

    /// Forwarded to the detector.
    pub confidence_threshold: f32,

    /// Forwarded to the detector's non-max suppression.
    pub iou_threshold: f32,

    /// Fraction of each dimension removed from every side before redaction.
    ///
    /// `1.0` is accepted and collapses every box to a point.
    pub shrink_factor: f64,

    /// When false, every frame runs detection and no trackers are created.
    pub tracking_enabled: bool,

    pub redaction: RedactionMethod,

    /// Only affects log verbosity.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker_algorithm: TrackerAlgorithm::Kcf,
            detection_interval: 15,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            shrink_factor: 0.1,
            tracking_enabled: true,
            redaction: RedactionMethod::default(),
            verbose: false,
        }
    }
}

impl SessionConfig {
    /// Build a session config from persisted defaults and validate it.
    pub fn from_defaults(defaults: &ProcessingDefaults) -> PlateblurResult<Self> {
        let config = Self {
            tracker_algorithm: defaults.tracker.parse()?,
            detection_interval: defaults.detection_interval,
            confidence_threshold: defaults.confidence_threshold,
            iou_threshold: defaults.iou_threshold,
            shrink_factor: defaults.shrink_factor,
            tracking_enabled: defaults.tracking_enabled,
            redaction: RedactionMethod::from_name(
                &defaults.redaction,
                defaults.redaction_strength,
            )?,
            verbose: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot honor.
    pub fn validate(&self) -> PlateblurResult<()> {
        if self.detection_interval == 0 {
            return Err(PlateblurError::config(
                "detection_interval must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PlateblurError::config(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(PlateblurError::config(format!(
                "iou_threshold must be in [0, 1], got {}",
                self.iou_threshold
            )));
        }
        // NaN fails the range check as well.
        if !(0.0..=1.0).contains(&self.shrink_factor) {
            return Err(PlateblurError::config(format!(
                "shrink_factor must be in [0, 1], got {}",
                self.shrink_factor
            )));
        }
        if self.redaction.strength() == 0 {
            return Err(PlateblurError::config(
                "redaction strength must be at least 1",
            ));
        }
        Ok(())
    }
}
