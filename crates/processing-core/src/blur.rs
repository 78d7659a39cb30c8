//! Region redaction.
//!
//! Every operator here is a pure function of the region's own pixels and
//! the strength parameter. Pixels outside the region are never read, so
//! neighbouring context cannot leak into the redacted area and results are
//! reproducible frame to frame.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::filter;
use imageproc::map::{blue_channel, green_channel, red_channel};
use plateblur_frame_model::{BoundingBox, RedactionMethod};

use crate::geometry;

/// Redact each box of `frame` in place with `method`.
///
/// Boxes are clamped to the frame first; zero-area boxes are skipped.
/// Returns the number of regions that were actually modified.
pub fn redact(frame: &mut RgbImage, boxes: &[BoundingBox], method: RedactionMethod) -> usize {
    let (width, height) = frame.dimensions();
    let mut redacted = 0;

    for &bbox in boxes {
        let region = geometry::clamp(bbox, width, height);
        if region.is_empty() {
            continue;
        }

        let (x, y) = (region.x1 as u32, region.y1 as u32);
        let (w, h) = (region.width() as u32, region.height() as u32);
        let roi = imageops::crop_imm(&*frame, x, y, w, h).to_image();

        let processed = match method {
            RedactionMethod::Blur { kernel } => box_blur(&roi, kernel),
            RedactionMethod::Pixelate { cells } => pixelate(&roi, cells),
        };

        imageops::replace(frame, &processed, x as i64, y as i64);
        redacted += 1;
    }

    redacted
}

/// Mean filter over a square window centred on each pixel.
///
/// The window side is `kernel` rounded up to the next odd number, and edge
/// pixels are repeated past the region border. The radius is capped at the
/// region size, where a wider window stops changing the result much. A
/// kernel of 0 or 1 returns the input.
pub fn box_blur(region: &RgbImage, kernel: u32) -> RgbImage {
    let (w, h) = region.dimensions();
    if kernel <= 1 || w == 0 || h == 0 {
        return region.clone();
    }

    let radius = kernel / 2;
    let (rx, ry) = (radius.min(w), radius.min(h));
    let channels = [red_channel(region), green_channel(region), blue_channel(region)]
        .map(|channel| filter::box_filter(&channel, rx, ry));

    let [r, g, b] = &channels;
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([r.get_pixel(x, y)[0], g.get_pixel(x, y)[0], b.get_pixel(x, y)[0]])
    })
}

/// Replace the region with a `cells x cells` grid of averaged colours.
///
/// The region is area-averaged down to the grid and scaled back up with
/// nearest-neighbour sampling. The cell count is clamped to the region size
/// per axis.
pub fn pixelate(region: &RgbImage, cells: u32) -> RgbImage {
    let (w, h) = region.dimensions();
    if cells == 0 || w == 0 || h == 0 {
        return region.clone();
    }

    let (cols, rows) = (cells.min(w), cells.min(h));
    if (cols, rows) == (w, h) {
        return region.clone();
    }
    let grid = imageops::thumbnail(region, cols, rows);
    imageops::resize(&grid, w, h, FilterType::Nearest)
}
