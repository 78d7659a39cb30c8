//! Plateblur Vision
//!
//! Concrete backends behind the processing-core traits:
//! - **Trackers:** a pure-Rust template matcher, plus CSRT/KCF/MIL/MOSSE
//!   from OpenCV with the `opencv` feature
//! - **Detectors:** a YOLO plate model on ONNX Runtime with the `onnx`
//!   feature, and a null detector for dry runs

pub mod factory;
pub mod null;
#[cfg(feature = "opencv")]
pub mod opencv_tracker;
pub mod postprocess;
pub mod template;
#[cfg(feature = "onnx")]
pub mod yolo;

pub use factory::{compiled_trackers, tracker_factory};
pub use null::NullDetector;
pub use template::{TemplateConfig, TemplateTracker, TemplateTrackerFactory};
#[cfg(feature = "onnx")]
pub use yolo::{YoloConfig, YoloPlateDetector};

/// Whether the ONNX detector was compiled in.
pub const fn onnx_enabled() -> bool {
    cfg!(feature = "onnx")
}
