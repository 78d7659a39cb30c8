//! Frame scheduler.
//!
//! Decides, per frame, whether to run the detector or advance the trackers,
//! then shrinks, clamps, and redacts whatever boxes that produced.
//!
//! Detection runs on frame 1 and on every frame whose index is a multiple of
//! the detection interval. Every other frame is tracked. With tracking
//! disabled there is no pool and every frame is a detection frame.

use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::{BoundingBox, SessionConfig, VideoFrame};
use serde::Serialize;

use crate::blur;
use crate::detector::PlateDetector;
use crate::geometry;
use crate::tracker::{TrackerFactory, TrackerPool};

/// What the scheduler did for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameMode {
    Detect,
    Track,
}

/// Whether a 1-based frame index falls on the detection cadence.
pub fn detection_due(index: u64, interval: u32) -> bool {
    index == 1 || (interval > 0 && index % interval as u64 == 0)
}

pub fn select_mode(index: u64, interval: u32, tracking_enabled: bool) -> FrameMode {
    if !tracking_enabled || detection_due(index, interval) {
        FrameMode::Detect
    } else {
        FrameMode::Track
    }
}

/// Result of processing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameOutcome {
    pub index: u64,
    pub mode: FrameMode,
    /// Boxes that were handed to redaction, already shrunk and clamped.
    pub regions: Vec<BoundingBox>,
    /// Regions that actually had positive area and were redacted.
    pub redacted: usize,
}

/// Running totals over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub frames: u64,
    pub detections_run: u64,
    pub tracked_frames: u64,
    pub regions_dropped: u64,
    pub regions_redacted: u64,
}

pub struct FrameScheduler<'d> {
    config: SessionConfig,
    detector: &'d mut dyn PlateDetector,
    pool: Option<TrackerPool>,
    frame_index: u64,
    active_regions: Vec<BoundingBox>,
    stats: SchedulerStats,
}

impl<'d> FrameScheduler<'d> {
    /// Build a scheduler for one session.
    ///
    /// `factory` is required when tracking is enabled and ignored otherwise.
    pub fn new(
        config: SessionConfig,
        detector: &'d mut dyn PlateDetector,
        factory: Option<Box<dyn TrackerFactory>>,
    ) -> PlateblurResult<Self> {
        config.validate()?;

        let pool = if config.tracking_enabled {
            let factory = factory.ok_or_else(|| {
                PlateblurError::config("tracking is enabled but no tracker backend was provided")
            })?;
            tracing::debug!(
                tracker = %factory.algorithm(),
                interval = config.detection_interval,
                detector = detector.name(),
                "Tracking between detections"
            );
            Some(TrackerPool::new(factory))
        } else {
            tracing::debug!(
                detector = detector.name(),
                "Tracking disabled; detecting on every frame"
            );
            None
        };

        Ok(Self {
            config,
            detector,
            pool,
            frame_index: 0,
            active_regions: Vec::new(),
            stats: SchedulerStats::default(),
        })
    }

    /// Detect or track on `frame`, then redact the resulting regions in place.
    ///
    /// Only a detector failure is returned as an error; tracker failures drop
    /// the affected region and processing continues.
    pub fn process(&mut self, frame: &mut VideoFrame) -> PlateblurResult<FrameOutcome> {
        let index = frame.index;
        let mode = select_mode(index, self.config.detection_interval, self.pool.is_some());

        let boxes = match mode {
            FrameMode::Detect => {
                let boxes = self.detector.detect(&frame.pixels).map_err(|e| match e {
                    e @ PlateblurError::DetectorInvocation { .. } => e,
                    other => PlateblurError::detector(other.to_string()),
                })?;
                self.stats.detections_run += 1;

                if let Some(pool) = self.pool.as_mut() {
                    // Backends reject seeds that cross the frame edge.
                    let seeds: Vec<BoundingBox> = boxes
                        .iter()
                        .map(|&bbox| geometry::clamp(bbox, frame.width(), frame.height()))
                        .collect();
                    pool.initialize(&frame.pixels, &seeds);
                }
                boxes
            }
            FrameMode::Track => {
                let boxes = match self.pool.as_mut() {
                    Some(pool) => {
                        let before = pool.len();
                        let boxes = pool.update(&frame.pixels);
                        self.stats.regions_dropped += (before - pool.len()) as u64;
                        boxes
                    }
                    None => Vec::new(),
                };
                self.stats.tracked_frames += 1;
                boxes
            }
        };

        let regions = geometry::prepare_regions(
            &boxes,
            self.config.shrink_factor,
            frame.width(),
            frame.height(),
        );
        let redacted = blur::redact(&mut frame.pixels, &regions, self.config.redaction);

        tracing::trace!(
            frame = index,
            mode = ?mode,
            boxes = regions.len(),
            redacted,
            "Frame processed"
        );

        self.active_regions = boxes;
        self.frame_index = index;
        self.stats.frames += 1;
        self.stats.regions_redacted += redacted as u64;

        Ok(FrameOutcome {
            index,
            mode,
            regions,
            redacted,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Index of the last processed frame, 0 before the first.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Boxes from the last detection, or the survivors of the last update.
    pub fn active_regions(&self) -> &[BoundingBox] {
        &self.active_regions
    }

    pub fn pool(&self) -> Option<&TrackerPool> {
        self.pool.as_ref()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
