//! Decoded frame types passed between the pipeline and the scheduler.

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Kind of elementary stream a frame or stream descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
}

/// Rational time base in which presentation timestamps are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert a timestamp in this base to seconds.
    pub fn to_secs(&self, ts: i64) -> Option<f64> {
        if self.den == 0 {
            return None;
        }
        Some(ts as f64 * self.num as f64 / self.den as f64)
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// One decoded video frame.
///
/// Pixels are packed RGB24. The frame is owned by whichever step is
/// processing it and is never shared across frames.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 1-based position in the video stream.
    pub index: u64,

    /// Presentation timestamp in `time_base` units.
    pub pts: Option<i64>,

    /// Unit of `pts`.
    pub time_base: TimeBase,

    /// Packed RGB pixels.
    pub pixels: RgbImage,
}

impl VideoFrame {
    pub fn new(index: u64, pts: Option<i64>, time_base: TimeBase, pixels: RgbImage) -> Self {
        Self {
            index,
            pts,
            time_base,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Always [`StreamKind::Video`]; audio frames never leave the pipeline.
    pub fn stream_kind(&self) -> StreamKind {
        StreamKind::Video
    }

    /// Presentation time in seconds, when both pts and time base are known.
    pub fn pts_secs(&self) -> Option<f64> {
        self.pts.and_then(|pts| self.time_base.to_secs(pts))
    }
}
