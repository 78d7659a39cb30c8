//! Plate detector seam.

use image::RgbImage;
use plateblur_common::error::PlateblurResult;
use plateblur_frame_model::BoundingBox;

/// Finds plate regions in a frame.
///
/// Implementations own their model state and are called once per detection
/// frame. Confidence and IoU thresholds are configured on the implementation
/// when it is built, not per call.
pub trait PlateDetector: Send {
    /// Return every plate box found in `frame`, in absolute pixel coordinates.
    ///
    /// Boxes may extend past the frame edges; the scheduler clamps them.
    fn detect(&mut self, frame: &RgbImage) -> PlateblurResult<Vec<BoundingBox>>;

    /// Short human-readable backend name for logs.
    fn name(&self) -> &str {
        "detector"
    }
}

impl<D: PlateDetector + ?Sized> PlateDetector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> PlateblurResult<Vec<BoundingBox>> {
        (**self).detect(frame)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
