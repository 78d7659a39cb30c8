//! Tracker backend selection.

use plateblur_frame_model::TrackerAlgorithm;
use plateblur_processing_core::tracker::TrackerFactory;

use crate::template::TemplateTrackerFactory;

/// Tracker algorithms this build can run natively.
pub fn compiled_trackers() -> Vec<TrackerAlgorithm> {
    TrackerAlgorithm::ALL
        .into_iter()
        .filter(|a| cfg!(feature = "opencv") || !a.requires_opencv())
        .collect()
}

/// Build a factory for `algorithm`.
///
/// OpenCV algorithms fall back to the template tracker when the `opencv`
/// feature is off; the fallback is logged once per process.
pub fn tracker_factory(algorithm: TrackerAlgorithm) -> Box<dyn TrackerFactory> {
    if !algorithm.requires_opencv() {
        return Box::new(TemplateTrackerFactory::default());
    }

    #[cfg(feature = "opencv")]
    {
        Box::new(crate::opencv_tracker::OpenCvTrackerFactory::new(algorithm))
    }

    #[cfg(not(feature = "opencv"))]
    {
        static FALLBACK_WARNING: std::sync::Once = std::sync::Once::new();
        FALLBACK_WARNING.call_once(|| {
            tracing::warn!(
                requested = %algorithm,
                "Built without OpenCV; using the TEMPLATE tracker instead"
            );
        });
        Box::new(TemplateTrackerFactory::default())
    }
}
