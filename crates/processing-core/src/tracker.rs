//! Per-region tracking.
//!
//! A [`TrackerPool`] owns one [`RegionTracker`] per plate found by the most
//! recent detection. Handles live in a flat arena of slots; a slot whose
//! tracker fails is marked inactive during the update pass and the arena is
//! compacted once the pass is over, so surviving regions keep their order.

use image::RgbImage;
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::{BoundingBox, TrackerAlgorithm};

use crate::geometry;

/// A single-object visual tracker.
pub trait RegionTracker: Send {
    /// Start tracking `bbox` in `frame`.
    fn init(&mut self, frame: &RgbImage, bbox: BoundingBox) -> PlateblurResult<()>;

    /// Locate the region in the next frame.
    ///
    /// `Ok(None)` means the tracker lost the target. An `Err` is a backend
    /// failure; the pool treats both the same way.
    fn update(&mut self, frame: &RgbImage) -> PlateblurResult<Option<BoundingBox>>;
}

/// Builds trackers for one algorithm.
pub trait TrackerFactory: Send + Sync {
    fn algorithm(&self) -> TrackerAlgorithm;

    fn create(&self) -> PlateblurResult<Box<dyn RegionTracker>>;
}

/// Stable identifier of a tracked region within one pool.
pub type RegionId = u64;

/// Read-only view of a live region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedRegion {
    pub id: RegionId,
    pub last_bbox: BoundingBox,
}

/// Lifetime counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Trackers successfully initialized.
    pub initialized: u64,
    /// Boxes skipped at initialization.
    pub init_skipped: u64,
    /// Regions dropped after a failed update.
    pub dropped: u64,
}

struct Slot {
    id: RegionId,
    tracker: Box<dyn RegionTracker>,
    last_bbox: BoundingBox,
    active: bool,
}

pub struct TrackerPool {
    factory: Box<dyn TrackerFactory>,
    slots: Vec<Slot>,
    next_id: RegionId,
    stats: PoolStats,
}

impl TrackerPool {
    pub fn new(factory: Box<dyn TrackerFactory>) -> Self {
        Self {
            factory,
            slots: Vec::new(),
            next_id: 0,
            stats: PoolStats::default(),
        }
    }

    pub fn algorithm(&self) -> TrackerAlgorithm {
        self.factory.algorithm()
    }

    /// Discard every existing tracker and start one per box, in order.
    ///
    /// Boxes without positive area and boxes the backend refuses are skipped
    /// with a warning. Returns the number of trackers created.
    pub fn initialize(&mut self, frame: &RgbImage, boxes: &[BoundingBox]) -> usize {
        self.slots.clear();

        for &bbox in boxes {
            match self.start_tracker(frame, bbox) {
                Ok(tracker) => {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.slots.push(Slot {
                        id,
                        tracker,
                        last_bbox: bbox,
                        active: true,
                    });
                    self.stats.initialized += 1;
                }
                Err(e) => {
                    tracing::warn!(bbox = %bbox, error = %e, "Skipping region");
                    self.stats.init_skipped += 1;
                }
            }
        }

        self.slots.len()
    }

    fn start_tracker(
        &self,
        frame: &RgbImage,
        bbox: BoundingBox,
    ) -> PlateblurResult<Box<dyn RegionTracker>> {
        if bbox.is_empty() {
            return Err(PlateblurError::tracker_init(format!(
                "box {bbox} has non-positive size {}x{}",
                bbox.width(),
                bbox.height()
            )));
        }

        let mut tracker = self.factory.create()?;
        tracker.init(frame, bbox).map_err(|e| match e {
            e @ PlateblurError::TrackerInit { .. } => e,
            other => PlateblurError::tracker_init(other.to_string()),
        })?;
        Ok(tracker)
    }

    /// Advance every tracker by one frame.
    ///
    /// Returns the clamped boxes of the surviving regions, in slot order.
    pub fn update(&mut self, frame: &RgbImage) -> Vec<BoundingBox> {
        let (width, height) = frame.dimensions();
        let mut boxes = Vec::with_capacity(self.slots.len());

        for slot in &mut self.slots {
            match slot.tracker.update(frame) {
                Ok(Some(bbox)) => {
                    let clamped = geometry::clamp(bbox, width, height);
                    slot.last_bbox = clamped;
                    boxes.push(clamped);
                }
                Ok(None) => {
                    tracing::debug!(region = slot.id, "Tracker lost region");
                    slot.active = false;
                }
                Err(e) => {
                    tracing::warn!(region = slot.id, error = %e, "Tracker update failed");
                    slot.active = false;
                }
            }
        }

        let before = self.slots.len();
        self.slots.retain(|slot| slot.active);
        self.stats.dropped += (before - self.slots.len()) as u64;

        boxes
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn regions(&self) -> impl Iterator<Item = TrackedRegion> + '_ {
        self.slots.iter().map(|slot| TrackedRegion {
            id: slot.id,
            last_bbox: slot.last_bbox,
        })
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl std::fmt::Debug for TrackerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerPool")
            .field("algorithm", &self.algorithm())
            .field("regions", &self.slots.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Scripted tracker: replays queued results, then reports loss.
    struct Scripted {
        script: VecDeque<PlateblurResult<Option<BoundingBox>>>,
        fail_init: bool,
    }

    impl RegionTracker for Scripted {
        fn init(&mut self, _frame: &RgbImage, _bbox: BoundingBox) -> PlateblurResult<()> {
            if self.fail_init {
                Err(PlateblurError::decode("roi outside frame"))
            } else {
                Ok(())
            }
        }

        fn update(&mut self, _frame: &RgbImage) -> PlateblurResult<Option<BoundingBox>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    type Script = Vec<PlateblurResult<Option<BoundingBox>>>;

    /// Hands out scripts in creation order.
    struct ScriptedFactory {
        scripts: Arc<Mutex<VecDeque<(bool, Script)>>>,
    }

    impl ScriptedFactory {
        fn new(scripts: Vec<(bool, Script)>) -> Self {
            Self {
                scripts: Arc::new(Mutex::new(scripts.into())),
            }
        }
    }

    impl TrackerFactory for ScriptedFactory {
        fn algorithm(&self) -> TrackerAlgorithm {
            TrackerAlgorithm::Template
        }

        fn create(&self) -> PlateblurResult<Box<dyn RegionTracker>> {
            let (fail_init, script) = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((false, Vec::new()));
            Ok(Box::new(Scripted {
                script: script.into(),
                fail_init,
            }))
        }
    }

    fn frame() -> RgbImage {
        RgbImage::new(100, 80)
    }

    #[test]
    fn test_initialize_skips_empty_boxes() {
        let mut pool = TrackerPool::new(Box::new(ScriptedFactory::new(vec![])));
        let created = pool.initialize(
            &frame(),
            &[
                BoundingBox::new(10, 10, 20, 20),
                BoundingBox::new(30, 30, 30, 40),
                BoundingBox::new(50, 50, 40, 60),
            ],
        );
        assert_eq!(created, 1);
        assert_eq!(pool.stats().init_skipped, 2);
    }

    #[test]
    fn test_initialize_skips_backend_refusal() {
        let factory = ScriptedFactory::new(vec![(true, vec![]), (false, vec![])]);
        let mut pool = TrackerPool::new(Box::new(factory));
        let created = pool.initialize(
            &frame(),
            &[BoundingBox::new(0, 0, 10, 10), BoundingBox::new(20, 20, 30, 30)],
        );
        assert_eq!(created, 1);
        let region = pool.regions().next().unwrap();
        assert_eq!(region.last_bbox, BoundingBox::new(20, 20, 30, 30));
    }

    #[test]
    fn test_initialize_replaces_previous_regions() {
        let mut pool = TrackerPool::new(Box::new(ScriptedFactory::new(vec![])));
        pool.initialize(&frame(), &[BoundingBox::new(0, 0, 10, 10); 3]);
        assert_eq!(pool.len(), 3);
        pool.initialize(&frame(), &[BoundingBox::new(0, 0, 10, 10)]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.regions().next().unwrap().id, 3);
    }

    #[test]
    fn test_update_clamps_and_compacts() {
        let factory = ScriptedFactory::new(vec![
            (false, vec![Ok(Some(BoundingBox::new(-5, 10, 30, 90)))]),
            (false, vec![Ok(None)]),
            (
                false,
                vec![Err(PlateblurError::tracker_update("backend error"))],
            ),
            (false, vec![Ok(Some(BoundingBox::new(40, 40, 50, 50)))]),
        ]);
        let mut pool = TrackerPool::new(Box::new(factory));
        pool.initialize(&frame(), &[BoundingBox::new(1, 1, 9, 9); 4]);

        let boxes = pool.update(&frame());
        assert_eq!(
            boxes,
            vec![BoundingBox::new(0, 10, 30, 80), BoundingBox::new(40, 40, 50, 50)]
        );
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stats().dropped, 2);

        let ids: Vec<_> = pool.regions().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 3]);
    }

    #[test]
    fn test_failed_region_stays_gone() {
        let factory = ScriptedFactory::new(vec![(
            false,
            vec![Ok(None), Ok(Some(BoundingBox::new(1, 1, 5, 5)))],
        )]);
        let mut pool = TrackerPool::new(Box::new(factory));
        pool.initialize(&frame(), &[BoundingBox::new(1, 1, 9, 9)]);

        assert!(pool.update(&frame()).is_empty());
        assert!(pool.update(&frame()).is_empty());
        assert!(pool.is_empty());
    }
}
