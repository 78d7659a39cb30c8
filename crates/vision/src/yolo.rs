//! YOLO plate detector on ONNX Runtime (`onnx` feature).

use std::path::{Path, PathBuf};

use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::BoundingBox;
use plateblur_processing_core::PlateDetector;

use crate::postprocess::{self, Letterbox};

/// Settings for [`YoloPlateDetector`].
#[derive(Debug, Clone, PartialEq)]
pub struct YoloConfig {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Side of the square model input.
    pub input_size: u32,
}

impl YoloConfig {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            input_size: 640,
        }
    }
}

pub struct YoloPlateDetector {
    session: Session,
    config: YoloConfig,
}

impl YoloPlateDetector {
    /// Load the model and build an inference session.
    pub fn new(config: YoloConfig) -> PlateblurResult<Self> {
        if !config.model_path.is_file() {
            return Err(PlateblurError::detector(format!(
                "model not found: {}",
                config.model_path.display()
            )));
        }

        let session = create_session(&config.model_path)?;
        tracing::info!(
            model = %config.model_path.display(),
            input_size = config.input_size,
            conf = config.confidence_threshold,
            iou = config.iou_threshold,
            "Plate detector initialized"
        );
        Ok(Self { session, config })
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }
}

fn create_session(model_path: &Path) -> PlateblurResult<Session> {
    let model_bytes = std::fs::read(model_path)?;
    Session::builder()
        .map_err(|e| PlateblurError::detector(format!("failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| PlateblurError::detector(format!("failed to set optimization level: {e}")))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| PlateblurError::detector(format!("failed to load ONNX model: {e}")))
}

impl PlateDetector for YoloPlateDetector {
    fn detect(&mut self, frame: &RgbImage) -> PlateblurResult<Vec<BoundingBox>> {
        let size = self.config.input_size;
        let letterbox = Letterbox::new(frame.width(), frame.height(), size);
        let input = postprocess::to_nchw(&letterbox.apply(frame));

        let shape = vec![1usize, 3, size as usize, size as usize];
        let tensor: Value = Tensor::from_array((shape, input.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| PlateblurError::detector(format!("failed to create tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| PlateblurError::detector(format!("inference failed: {e}")))?;
        let output = outputs
            .get("output0")
            .ok_or_else(|| PlateblurError::detector("model has no output0 tensor"))?;
        let (dims, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PlateblurError::detector(format!("failed to read output: {e}")))?;

        let dims: Vec<i64> = dims.iter().copied().collect();
        let candidates = postprocess::decode(
            data,
            &dims,
            &letterbox,
            self.config.confidence_threshold,
        )
        .ok_or_else(|| PlateblurError::detector(format!("unexpected output shape {dims:?}")))?;

        let kept = postprocess::non_max_suppression(candidates, self.config.iou_threshold);
        tracing::trace!(plates = kept.len(), "Detection finished");
        Ok(kept.iter().map(|c| c.to_bbox()).collect())
    }

    fn name(&self) -> &str {
        "yolo-onnx"
    }
}
