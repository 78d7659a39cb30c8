//! Bounding-box geometry: shrink and clamp.
//!
//! Boxes are always shrunk before they are clamped, so the shrink math only
//! ever sees the detector's full extent, never an edge-truncated one.

use plateblur_frame_model::BoundingBox;

/// Inset every side of `bbox` by `floor(dimension * factor)`.
///
/// The inset is computed per axis. If an axis would invert, both of its
/// edges collapse to the axis midpoint and the box degenerates to zero area.
/// A factor of zero (or a non-finite factor) returns the box unchanged.
pub fn shrink(bbox: BoundingBox, factor: f64) -> BoundingBox {
    if !factor.is_finite() || factor <= 0.0 {
        return bbox;
    }

    let (x1, x2) = shrink_axis(bbox.x1, bbox.x2, factor);
    let (y1, y2) = shrink_axis(bbox.y1, bbox.y2, factor);
    BoundingBox { x1, y1, x2, y2 }
}

fn shrink_axis(lo: i32, hi: i32, factor: f64) -> (i32, i32) {
    let (lo, hi) = (lo as i64, hi as i64);
    let inset = ((hi - lo) as f64 * factor).floor() as i64;
    let a = lo + inset;
    let b = hi - inset;

    if a > b {
        let mid = (lo + hi).div_euclid(2);
        (saturate(mid), saturate(mid))
    } else {
        (saturate(a), saturate(b))
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Clip `bbox` to `[0, width] x [0, height]`.
///
/// The result always satisfies `0 <= x1 <= x2 <= width` and
/// `0 <= y1 <= y2 <= height`, even for inverted input.
pub fn clamp(bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
    let w = width.min(i32::MAX as u32) as i32;
    let h = height.min(i32::MAX as u32) as i32;

    let x1 = bbox.x1.clamp(0, w);
    let y1 = bbox.y1.clamp(0, h);
    let x2 = bbox.x2.clamp(0, w).max(x1);
    let y2 = bbox.y2.clamp(0, h).max(y1);
    BoundingBox { x1, y1, x2, y2 }
}

/// Shrink (when `shrink_factor > 0`) and clamp every box, preserving order.
pub fn prepare_regions(
    boxes: &[BoundingBox],
    shrink_factor: f64,
    width: u32,
    height: u32,
) -> Vec<BoundingBox> {
    boxes
        .iter()
        .map(|&b| {
            let b = if shrink_factor > 0.0 {
                shrink(b, shrink_factor)
            } else {
                b
            };
            clamp(b, width, height)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_shrink_ten_percent() {
        let shrunk = shrink(BoundingBox::new(100, 100, 200, 200), 0.1);
        assert_eq!(shrunk, BoundingBox::new(110, 110, 190, 190));
    }

    #[test]
    fn test_shrink_zero_is_noop() {
        let b = BoundingBox::new(-5, 3, 17, 40);
        assert_eq!(shrink(b, 0.0), b);
    }

    #[test]
    fn test_shrink_uses_floor_per_axis() {
        // width 15 -> inset 1, height 40 -> inset 4
        let shrunk = shrink(BoundingBox::new(0, 0, 15, 40), 0.1);
        assert_eq!(shrunk, BoundingBox::new(1, 4, 14, 36));
    }

    #[test]
    fn test_shrink_factor_one_collapses_to_center() {
        let shrunk = shrink(BoundingBox::new(100, 100, 200, 300), 1.0);
        assert_eq!(shrunk, BoundingBox::new(150, 200, 150, 200));
        assert!(shrunk.is_empty());
    }

    #[test]
    fn test_clamp_to_frame() {
        let clamped = clamp(BoundingBox::new(-20, 10, 700, 500), 640, 480);
        assert_eq!(clamped, BoundingBox::new(0, 10, 640, 480));
    }

    #[test]
    fn test_clamp_box_fully_outside_degenerates() {
        let clamped = clamp(BoundingBox::new(700, 500, 800, 600), 640, 480);
        assert_eq!(clamped, BoundingBox::new(640, 480, 640, 480));
        assert!(clamped.is_empty());
    }

    #[test]
    fn test_prepare_regions_shrinks_then_clamps() {
        // Shrink first sees the full 100px width; clamping afterwards cuts the left edge.
        let regions = prepare_regions(&[BoundingBox::new(-50, 0, 50, 100)], 0.1, 640, 480);
        assert_eq!(regions, vec![BoundingBox::new(0, 10, 40, 90)]);
    }

    #[test]
    fn test_prepare_regions_without_shrink() {
        let boxes = [BoundingBox::new(10, 10, 20, 20), BoundingBox::new(0, 0, 5, 5)];
        assert_eq!(prepare_regions(&boxes, 0.0, 100, 100), boxes.to_vec());
    }

    fn valid_box() -> impl Strategy<Value = BoundingBox> {
        (-2000i32..2000, -2000i32..2000, 1i32..2000, 1i32..2000)
            .prop_map(|(x, y, w, h)| BoundingBox::from_xywh(x, y, w, h))
    }

    fn any_box() -> impl Strategy<Value = BoundingBox> {
        (-5000i32..5000, -5000i32..5000, -5000i32..5000, -5000i32..5000)
            .prop_map(|(x1, y1, x2, y2)| BoundingBox::new(x1, y1, x2, y2))
    }

    proptest! {
        #[test]
        fn prop_shrink_never_inverts(b in valid_box(), factor in 0.0f64..1.0) {
            let s = shrink(b, factor);
            prop_assert!(s.x1 <= s.x2);
            prop_assert!(s.y1 <= s.y2);
        }

        #[test]
        fn prop_shrink_stays_inside_original(b in valid_box(), factor in 0.0f64..=1.0) {
            let s = shrink(b, factor);
            prop_assert!(s.x1 >= b.x1 && s.x2 <= b.x2);
            prop_assert!(s.y1 >= b.y1 && s.y2 <= b.y2);
        }

        #[test]
        fn prop_clamp_within_bounds(b in any_box(), w in 0u32..4000, h in 0u32..4000) {
            let c = clamp(b, w, h);
            prop_assert!(0 <= c.x1 && c.x1 <= c.x2 && c.x2 as u32 <= w);
            prop_assert!(0 <= c.y1 && c.y1 <= c.y2 && c.y2 as u32 <= h);
        }

        #[test]
        fn prop_prepared_regions_fit_frame(
            boxes in proptest::collection::vec(any_box(), 0..8),
            factor in 0.0f64..1.0,
            w in 1u32..4000,
            h in 1u32..4000,
        ) {
            let regions = prepare_regions(&boxes, factor, w, h);
            prop_assert_eq!(regions.len(), boxes.len());
            for r in regions {
                prop_assert!(r.fits_within(w, h));
            }
        }
    }
}
