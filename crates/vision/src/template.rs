//! Template-matching tracker.
//!
//! Stores a grayscale copy of the initial region and, on each update,
//! searches a window around the last known position for the offset with the
//! lowest sum of squared differences. Large plates are matched on a
//! downscaled copy. The template is never refreshed, so the tracker cannot
//! drift onto background; it simply reports loss once the plate changes
//! appearance too much.

use image::imageops;
use image::{GrayImage, RgbImage};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};
use plateblur_common::error::{PlateblurError, PlateblurResult};
use plateblur_frame_model::{BoundingBox, TrackerAlgorithm};
use plateblur_processing_core::geometry;
use plateblur_processing_core::tracker::{RegionTracker, TrackerFactory};

/// Tuning for [`TemplateTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateConfig {
    /// Smallest search radius in pixels around the last position.
    pub min_search_radius: u32,
    /// Search radius as a fraction of the larger template side.
    pub search_scale: f32,
    /// Best match worse than this (root mean squared difference on 0..255) is a loss.
    pub max_rms_diff: f32,
    /// Templates with more pixels than this are matched at a reduced scale.
    pub max_template_pixels: u32,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            min_search_radius: 16,
            search_scale: 0.5,
            max_rms_diff: 32.0,
            max_template_pixels: 4096,
        }
    }
}

pub struct TemplateTracker {
    config: TemplateConfig,
    /// Grayscale template at matching scale.
    template: Option<GrayImage>,
    /// Region size in frame pixels.
    size: (i32, i32),
    /// Frame pixels per matching pixel.
    scale: u32,
    /// Top-left corner of the region in the last frame.
    position: (i32, i32),
}

impl TemplateTracker {
    pub fn new(config: TemplateConfig) -> Self {
        Self {
            config,
            template: None,
            size: (0, 0),
            scale: 1,
            position: (0, 0),
        }
    }

    fn search_radius(&self) -> i32 {
        let side = self.size.0.max(self.size.1) as f32;
        let scaled = (side * self.config.search_scale).round() as u32;
        scaled.max(self.config.min_search_radius) as i32
    }
}

impl Default for TemplateTracker {
    fn default() -> Self {
        Self::new(TemplateConfig::default())
    }
}

/// Integer downscale factor that brings a `w x h` region under `max_pixels`.
fn matching_scale(w: u32, h: u32, max_pixels: u32) -> u32 {
    let ratio = (w as f64 * h as f64) / max_pixels.max(1) as f64;
    (ratio.sqrt().ceil() as u32).clamp(1, w.min(h).max(1))
}

/// Grayscale `image` averaged over `scale x scale` blocks.
///
/// Any remainder past the last whole block on each axis is dropped, so two
/// images cropped on the same block grid produce identical pixels.
fn to_matching(image: &RgbImage, scale: u32) -> GrayImage {
    let gray = imageops::grayscale(image);
    if scale <= 1 {
        return gray;
    }
    let w = (gray.width() / scale).max(1);
    let h = (gray.height() / scale).max(1);
    let whole = imageops::crop_imm(&gray, 0, 0, w * scale, h * scale).to_image();
    imageops::thumbnail(&whole, w, h)
}

impl RegionTracker for TemplateTracker {
    fn init(&mut self, frame: &RgbImage, bbox: BoundingBox) -> PlateblurResult<()> {
        let (width, height) = frame.dimensions();
        let region = geometry::clamp(bbox, width, height);
        if region.is_empty() {
            return Err(PlateblurError::tracker_init(format!(
                "region {bbox} lies outside the {width}x{height} frame"
            )));
        }

        let (x, y) = (region.x1 as u32, region.y1 as u32);
        let (w, h) = (region.width() as u32, region.height() as u32);
        let roi = imageops::crop_imm(frame, x, y, w, h).to_image();

        self.scale = matching_scale(w, h, self.config.max_template_pixels);
        self.template = Some(to_matching(&roi, self.scale));
        self.size = (w as i32, h as i32);
        self.position = (region.x1, region.y1);
        Ok(())
    }

    fn update(&mut self, frame: &RgbImage) -> PlateblurResult<Option<BoundingBox>> {
        let template = self
            .template
            .as_ref()
            .ok_or_else(|| PlateblurError::tracker_update("template tracker used before init"))?;

        let (fw, fh) = (frame.width() as i32, frame.height() as i32);
        let (tw, th) = self.size;
        if tw > fw || th > fh {
            return Ok(None);
        }

        // Candidate top-left corners that keep the region fully inside the frame.
        // The window starts a whole number of blocks before the last position
        // so a still plate lands on the same block grid as its template.
        let radius = self.search_radius();
        let scale = self.scale as i32;
        let (px, py) = self.position;
        let x_lo = px - (px - (px - radius).max(0)) / scale * scale;
        let x_hi = (px + radius).min(fw - tw);
        let y_lo = py - (py - (py - radius).max(0)) / scale * scale;
        let y_hi = (py + radius).min(fh - th);
        if x_lo > x_hi || y_lo > y_hi {
            return Ok(None);
        }

        let window_w = (x_hi - x_lo + tw) as u32;
        let window_h = (y_hi - y_lo + th) as u32;
        let window = imageops::crop_imm(frame, x_lo as u32, y_lo as u32, window_w, window_h)
            .to_image();
        let window = to_matching(&window, self.scale);
        if window.width() < template.width() || window.height() < template.height() {
            return Ok(None);
        }

        let scores = match_template(&window, template, MatchTemplateMethod::SumOfSquaredErrors);
        let extremes = find_extremes(&scores);
        let pixels = (template.width() * template.height()).max(1) as f32;
        let rms = (extremes.min_value / pixels).sqrt();
        if rms > self.config.max_rms_diff {
            tracing::trace!(rms, "Template match below threshold");
            return Ok(None);
        }

        let (ox, oy) = extremes.min_value_location;
        self.position = (
            (x_lo + ox as i32 * scale).min(x_hi),
            (y_lo + oy as i32 * scale).min(y_hi),
        );
        Ok(Some(BoundingBox::from_xywh(
            self.position.0,
            self.position.1,
            tw,
            th,
        )))
    }
}

/// Builds [`TemplateTracker`]s sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct TemplateTrackerFactory {
    config: TemplateConfig,
}

impl TemplateTrackerFactory {
    pub fn new(config: TemplateConfig) -> Self {
        Self { config }
    }
}

impl TrackerFactory for TemplateTrackerFactory {
    fn algorithm(&self) -> TrackerAlgorithm {
        TrackerAlgorithm::Template
    }

    fn create(&self) -> PlateblurResult<Box<dyn RegionTracker>> {
        Ok(Box::new(TemplateTracker::new(self.config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Deterministic noise so every offset has a distinct match score.
    fn textured(w: u32, h: u32, seed: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            let mut v = x
                .wrapping_mul(374_761_393)
                .wrapping_add(y.wrapping_mul(668_265_263))
                .wrapping_add(seed);
            v = (v ^ (v >> 13)).wrapping_mul(1_274_126_177);
            let g = (v >> 24) as u8;
            Rgb([g, g.wrapping_add(40), g])
        })
    }

    fn shifted(src: &RgbImage, dx: i32, dy: i32) -> RgbImage {
        RgbImage::from_fn(src.width(), src.height(), |x, y| {
            let sx = x as i32 - dx;
            let sy = y as i32 - dy;
            if sx >= 0 && sy >= 0 && (sx as u32) < src.width() && (sy as u32) < src.height() {
                *src.get_pixel(sx as u32, sy as u32)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    #[test]
    fn test_follows_translation() {
        let first = textured(200, 150, 7);
        let mut tracker = TemplateTracker::default();
        tracker
            .init(&first, BoundingBox::new(60, 50, 110, 75))
            .unwrap();

        let second = shifted(&first, 6, -4);
        let found = tracker.update(&second).unwrap();
        assert_eq!(found, Some(BoundingBox::new(66, 46, 116, 71)));

        let third = shifted(&second, -3, 2);
        let found = tracker.update(&third).unwrap();
        assert_eq!(found, Some(BoundingBox::new(63, 48, 113, 73)));
    }

    #[test]
    fn test_reports_loss_when_target_vanishes() {
        let first = textured(120, 90, 3);
        let mut tracker = TemplateTracker::default();
        tracker.init(&first, BoundingBox::new(20, 20, 60, 40)).unwrap();

        let blank = RgbImage::from_pixel(120, 90, Rgb([0, 0, 0]));
        assert_eq!(tracker.update(&blank).unwrap(), None);
    }

    #[test]
    fn test_init_clamps_partially_outside_box() {
        let frame = textured(80, 60, 11);
        let mut tracker = TemplateTracker::default();
        tracker.init(&frame, BoundingBox::new(-10, 40, 20, 80)).unwrap();

        let found = tracker.update(&frame).unwrap();
        assert_eq!(found, Some(BoundingBox::new(0, 40, 20, 60)));
    }

    #[test]
    fn test_init_rejects_box_outside_frame() {
        let frame = textured(80, 60, 1);
        let mut tracker = TemplateTracker::default();
        let err = tracker
            .init(&frame, BoundingBox::new(100, 100, 120, 120))
            .unwrap_err();
        assert!(matches!(err, PlateblurError::TrackerInit { .. }));
    }

    #[test]
    fn test_update_before_init_is_an_error() {
        let mut tracker = TemplateTracker::default();
        assert!(tracker.update(&RgbImage::new(10, 10)).is_err());
    }

    #[test]
    fn test_matching_scale() {
        assert_eq!(matching_scale(50, 25, 4096), 1);
        assert_eq!(matching_scale(400, 120, 4096), 4);
        assert_eq!(matching_scale(3, 2, 1), 2);
    }

    #[test]
    fn test_large_plate_is_tracked_at_reduced_scale() {
        let first = textured(640, 360, 5);
        let mut tracker = TemplateTracker::default();
        tracker
            .init(&first, BoundingBox::new(200, 120, 440, 200))
            .unwrap();
        assert!(tracker.scale > 1);

        let found = tracker.update(&first).unwrap();
        assert_eq!(found, Some(BoundingBox::new(200, 120, 440, 200)));
    }
}
