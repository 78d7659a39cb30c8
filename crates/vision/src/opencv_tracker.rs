//! OpenCV tracker backends (`opencv` feature).

use image::RgbImage;
use opencv::core::{Mat, Ptr, Rect, Rect2d};
use opencv::prelude::*;
use opencv::tracking::{legacy_TrackerMOSSE, TrackerCSRT, TrackerKCF};
use opencv::video::TrackerMIL;
use opencv::{core, imgproc};
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::{BoundingBox, TrackerAlgorithm};
use plateblur_processing_core::tracker::{RegionTracker, TrackerFactory};

enum Handle {
    Csrt(Ptr<TrackerCSRT>),
    Kcf(Ptr<TrackerKCF>),
    Mil(Ptr<TrackerMIL>),
    Mosse(Ptr<legacy_TrackerMOSSE>),
}

pub struct OpenCvTracker {
    algorithm: TrackerAlgorithm,
    handle: Handle,
}

impl OpenCvTracker {
    pub fn new(algorithm: TrackerAlgorithm) -> PlateblurResult<Self> {
        let handle = match algorithm {
            TrackerAlgorithm::Csrt => TrackerCSRT::create_def().map(Handle::Csrt),
            TrackerAlgorithm::Kcf => TrackerKCF::create_def().map(Handle::Kcf),
            TrackerAlgorithm::Mil => TrackerMIL::create_def().map(Handle::Mil),
            TrackerAlgorithm::Mosse => legacy_TrackerMOSSE::create().map(Handle::Mosse),
            TrackerAlgorithm::Template => {
                return Err(PlateblurError::tracker_init(
                    "TEMPLATE is not an OpenCV tracker",
                ))
            }
        }
        .map_err(|e| PlateblurError::tracker_init(format!("{algorithm}: {e}")))?;

        Ok(Self { algorithm, handle })
    }
}

/// Copy an RGB frame into an owned BGR `Mat`.
fn to_bgr_mat(frame: &RgbImage) -> opencv::Result<Mat> {
    let data = frame.as_raw();
    // SAFETY: `rgb` borrows `data` only until `cvt_color` has copied it into `bgr`.
    let rgb = unsafe {
        Mat::new_rows_cols_with_data_unsafe(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            data.as_ptr() as *mut _,
            core::Mat_AUTO_STEP,
        )
    }?;
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR)?;
    Ok(bgr)
}

fn to_rect(bbox: BoundingBox) -> Rect {
    Rect::new(bbox.x1, bbox.y1, bbox.width(), bbox.height())
}

impl RegionTracker for OpenCvTracker {
    fn init(&mut self, frame: &RgbImage, bbox: BoundingBox) -> PlateblurResult<()> {
        let mat = to_bgr_mat(frame)
            .map_err(|e| PlateblurError::tracker_init(format!("frame conversion: {e}")))?;
        let rect = to_rect(bbox);

        let result = match &mut self.handle {
            Handle::Csrt(t) => t.init(&mat, rect).map(|_| true),
            Handle::Kcf(t) => t.init(&mat, rect).map(|_| true),
            Handle::Mil(t) => t.init(&mat, rect).map(|_| true),
            Handle::Mosse(t) => {
                let rect = Rect2d::new(
                    rect.x as f64,
                    rect.y as f64,
                    rect.width as f64,
                    rect.height as f64,
                );
                t.init(&mat, rect)
            }
        };

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(PlateblurError::tracker_init(format!(
                "{} refused region {bbox}",
                self.algorithm
            ))),
            Err(e) => Err(PlateblurError::tracker_init(format!("{}: {e}", self.algorithm))),
        }
    }

    fn update(&mut self, frame: &RgbImage) -> PlateblurResult<Option<BoundingBox>> {
        let mat = to_bgr_mat(frame)
            .map_err(|e| PlateblurError::tracker_update(format!("frame conversion: {e}")))?;

        let found = match &mut self.handle {
            Handle::Csrt(t) => update_int(t, &mat),
            Handle::Kcf(t) => update_int(t, &mat),
            Handle::Mil(t) => update_int(t, &mat),
            Handle::Mosse(t) => {
                let mut rect = Rect2d::default();
                t.update(&mat, &mut rect).map(|ok| {
                    ok.then(|| BoundingBox::from_xywh_f64(rect.x, rect.y, rect.width, rect.height))
                })
            }
        };

        found.map_err(|e| PlateblurError::tracker_update(format!("{}: {e}", self.algorithm)))
    }
}

fn update_int(tracker: &mut impl TrackerTrait, mat: &Mat) -> opencv::Result<Option<BoundingBox>> {
    let mut rect = Rect::default();
    let ok = tracker.update(mat, &mut rect)?;
    Ok(ok.then(|| BoundingBox::from_xywh(rect.x, rect.y, rect.width, rect.height)))
}

/// Builds OpenCV trackers for one algorithm.
#[derive(Debug, Clone, Copy)]
pub struct OpenCvTrackerFactory {
    algorithm: TrackerAlgorithm,
}

impl OpenCvTrackerFactory {
    pub fn new(algorithm: TrackerAlgorithm) -> Self {
        Self { algorithm }
    }
}

impl TrackerFactory for OpenCvTrackerFactory {
    fn algorithm(&self) -> TrackerAlgorithm {
        self.algorithm
    }

    fn create(&self) -> PlateblurResult<Box<dyn RegionTracker>> {
        Ok(Box::new(OpenCvTracker::new(self.algorithm)?))
    }
}
