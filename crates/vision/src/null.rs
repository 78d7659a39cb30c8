use image::RgbImage;
use plateblur_common::error::PlateblurResult;
use plateblur_frame_model::BoundingBox;
use plateblur_processing_core::PlateDetector;

/// Detector that never finds anything. Used for dry runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl PlateDetector for NullDetector {
    fn detect(&mut self, _frame: &RgbImage) -> PlateblurResult<Vec<BoundingBox>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "null"
    }
}
