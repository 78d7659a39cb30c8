//! YOLO pre- and post-processing.
//!
//! Kept free of any inference runtime so the geometry can be tested on its
//! own: letterboxing into the square model input, decoding the raw
//! `[1, 4 + classes, anchors]` output, and greedy IoU suppression.

use image::{imageops, Rgb, RgbImage};
use plateblur_frame_model::BoundingBox;

/// Grey used by the exporter for letterbox padding.
const PAD_VALUE: u8 = 114;

/// Mapping between frame coordinates and the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub input_size: u32,
}

impl Letterbox {
    /// Fit a `width x height` frame into `input_size` preserving aspect ratio.
    pub fn new(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width.max(1) as f32)
            .min(input_size as f32 / height.max(1) as f32);
        let scaled_w = (width as f32 * scale).round();
        let scaled_h = (height as f32 * scale).round();
        Self {
            scale,
            pad_x: ((input_size as f32 - scaled_w) / 2.0).floor(),
            pad_y: ((input_size as f32 - scaled_h) / 2.0).floor(),
            input_size,
        }
    }

    /// Resize and pad `frame` into the model input.
    pub fn apply(&self, frame: &RgbImage) -> RgbImage {
        let scaled_w = ((frame.width() as f32 * self.scale).round() as u32).max(1);
        let scaled_h = ((frame.height() as f32 * self.scale).round() as u32).max(1);
        let resized = imageops::resize(frame, scaled_w, scaled_h, imageops::FilterType::Triangle);

        let mut canvas =
            RgbImage::from_pixel(self.input_size, self.input_size, Rgb([PAD_VALUE; 3]));
        imageops::replace(&mut canvas, &resized, self.pad_x as i64, self.pad_y as i64);
        canvas
    }

    /// Map a point from model input space back to the frame.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// HWC `u8` image to a flat NCHW `f32` buffer in `[0, 1]`.
pub fn to_nchw(image: &RgbImage) -> Vec<f32> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut data = vec![0f32; 3 * w * h];
    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            data[c * w * h + offset] = pixel[c] as f32 / 255.0;
        }
    }
    data
}

/// One scored box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    pub fn iou(&self, other: &Candidate) -> f32 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let intersection = iw * ih;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    pub fn to_bbox(&self) -> BoundingBox {
        BoundingBox::from_corners_f32(self.x1, self.y1, self.x2, self.y2)
    }
}

/// Decode a `[1, 4 + C, N]` prediction tensor.
///
/// Rows 0..4 are `cx, cy, w, h` in model input pixels, the rest are class
/// scores. Each anchor keeps its best class score; anchors below
/// `confidence` are discarded. Returns `None` if the shape is not a
/// 3-dimensional tensor with at least one class row matching `data`.
pub fn decode(
    data: &[f32],
    shape: &[i64],
    letterbox: &Letterbox,
    confidence: f32,
) -> Option<Vec<Candidate>> {
    let [1, features, anchors] = *shape else {
        return None;
    };
    if features < 5 || anchors < 0 {
        return None;
    }
    let (features, anchors) = (features as usize, anchors as usize);
    if data.len() != features * anchors {
        return None;
    }

    let at = |row: usize, i: usize| data[row * anchors + i];
    let mut candidates = Vec::new();
    for i in 0..anchors {
        let score = (4..features)
            .map(|row| at(row, i))
            .fold(f32::NEG_INFINITY, f32::max);
        if score < confidence {
            continue;
        }

        let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            score,
        });
    }
    Some(candidates)
}

/// Greedy class-agnostic non-maximum suppression, highest score first.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if keep.iter().all(|kept| kept.iou(&candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}
