//! Plateblur Processing Core
//!
//! Everything that happens to a decoded frame between the decoder and the
//! encoder:
//! - **Scheduling:** choose detection or tracking for each frame
//! - **Tracking:** keep one tracker per detected plate until it fails
//! - **Geometry:** shrink and clamp boxes to the frame
//! - **Redaction:** blur or pixelate the resulting regions in place
//!
//! This crate is pure computation: no I/O and no codec dependencies.
//! Detector and tracker backends plug in through traits.

pub mod blur;
pub mod detector;
pub mod geometry;
pub mod scheduler;
pub mod tracker;

pub use detector::PlateDetector;
pub use scheduler::{FrameMode, FrameOutcome, FrameScheduler, SchedulerStats};
pub use tracker::{RegionTracker, TrackerFactory, TrackerPool};
