use image::{Rgb, RgbImage};
use plateblur_common::error::PlateblurResult;
use plateblur_frame_model::{BoundingBox, SessionConfig, TimeBase, TrackerAlgorithm, VideoFrame};
use plateblur_processing_core::scheduler::{FrameMode, FrameScheduler};
use plateblur_processing_core::PlateDetector;
use plateblur_vision::tracker_factory;

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;
const PLATE_W: i32 = 30;
const PLATE_H: i32 = 12;

fn noise(x: u32, y: u32, seed: u32) -> u8 {
    let mut v = x
        .wrapping_mul(2_654_435_761)
        .wrapping_add(y.wrapping_mul(2_246_822_519))
        .wrapping_add(seed);
    v ^= v >> 15;
    v = v.wrapping_mul(3_266_489_917);
    (v >> 24) as u8
}

fn plate_at(index: u64) -> BoundingBox {
    let step = index as i32 - 1;
    BoundingBox::from_xywh(20 + 2 * step, 50 + step, PLATE_W, PLATE_H)
}

/// Static background with a textured plate moving down and to the right.
/// Only plate pixels have a saturated blue channel.
fn frame(index: u64) -> VideoFrame {
    let plate = plate_at(index);
    let pixels = RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let (xi, yi) = (x as i32, y as i32);
        if xi >= plate.x1 && xi < plate.x2 && yi >= plate.y1 && yi < plate.y2 {
            let v = noise((xi - plate.x1) as u32, (yi - plate.y1) as u32, 99);
            Rgb([v, 255 - v, 255])
        } else {
            let v = noise(x, y, 5);
            Rgb([v, v / 2, v.min(200)])
        }
    });
    VideoFrame::new(index, Some(index as i64), TimeBase::new(1, 25), pixels)
}

/// Finds the bounding box of saturated-blue pixels.
struct BlueMarkerDetector;

impl PlateDetector for BlueMarkerDetector {
    fn detect(&mut self, frame: &RgbImage) -> PlateblurResult<Vec<BoundingBox>> {
        let mut bounds: Option<BoundingBox> = None;
        for (x, y, px) in frame.enumerate_pixels() {
            if px[2] != 255 {
                continue;
            }
            let (x, y) = (x as i32, y as i32);
            bounds = Some(match bounds {
                None => BoundingBox::new(x, y, x + 1, y + 1),
                Some(b) => BoundingBox::new(b.x1.min(x), b.y1.min(y), b.x2.max(x + 1), b.y2.max(y + 1)),
            });
        }
        Ok(bounds.into_iter().collect())
    }
}

#[test]
fn template_tracker_bridges_detection_gaps() {
    let mut detector = BlueMarkerDetector;
    let config = SessionConfig {
        tracker_algorithm: TrackerAlgorithm::Template,
        detection_interval: 10,
        shrink_factor: 0.0,
        ..SessionConfig::default()
    };
    let factory = tracker_factory(config.tracker_algorithm);
    let mut scheduler = FrameScheduler::new(config, &mut detector, Some(factory)).unwrap();

    for index in 1..=20 {
        let mut f = frame(index);
        let outcome = scheduler.process(&mut f).unwrap();

        let expected_mode = if index == 1 || index % 10 == 0 {
            FrameMode::Detect
        } else {
            FrameMode::Track
        };
        assert_eq!(outcome.mode, expected_mode, "frame {index}");
        assert_eq!(outcome.regions, vec![plate_at(index)], "frame {index}");
        assert_eq!(outcome.redacted, 1);
    }

    let stats = scheduler.stats();
    assert_eq!(stats.detections_run, 3);
    assert_eq!(stats.tracked_frames, 17);
    assert_eq!(stats.regions_dropped, 0);
}

#[test]
fn redaction_hides_plate_texture() {
    let mut detector = BlueMarkerDetector;
    let config = SessionConfig {
        tracker_algorithm: TrackerAlgorithm::Template,
        shrink_factor: 0.0,
        ..SessionConfig::default()
    };
    let factory = tracker_factory(config.tracker_algorithm);
    let mut scheduler = FrameScheduler::new(config, &mut detector, Some(factory)).unwrap();

    let mut f = frame(1);
    let original = f.pixels.clone();
    scheduler.process(&mut f).unwrap();

    let plate = plate_at(1);
    let changed = (plate.y1..plate.y2)
        .flat_map(|y| (plate.x1..plate.x2).map(move |x| (x as u32, y as u32)))
        .filter(|&(x, y)| f.pixels.get_pixel(x, y) != original.get_pixel(x, y))
        .count();
    assert!(changed > (PLATE_W * PLATE_H / 2) as usize, "only {changed} pixels changed");
    assert_eq!(f.pixels.get_pixel(0, 0), original.get_pixel(0, 0));
}
