use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::role::CursorRole;

/// One decoded cursor image with its hotspot, in pixel units.
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub image: RgbaImage,
    pub hotspot: (u32, u32),
}

impl DecodedFrame {
    pub fn new(image: RgbaImage, hotspot: (u32, u32)) -> Self {
        Self { image, hotspot }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// ANI playback timing in jiffies (1/60 s).
#[derive(Clone, Debug, PartialEq)]
pub enum AnimationTiming {
    /// Header-level `displayRate` shared by every frame.
    Uniform(u32),
    /// Per-step values from a `rate` chunk.
    PerFrame(Vec<u32>),
}

impl AnimationTiming {
    pub const JIFFIES_PER_SECOND: f64 = 60.0;

    /// Collapses the timing to one duration, averaging per-frame rates.
    pub fn seconds_per_frame(&self) -> f64 {
        match self {
            AnimationTiming::Uniform(rate) => *rate as f64 / Self::JIFFIES_PER_SECOND,
            AnimationTiming::PerFrame(rates) if rates.is_empty() => 0.0,
            AnimationTiming::PerFrame(rates) => {
                let total: u64 = rates.iter().map(|&r| r as u64).sum();
                total as f64 / rates.len() as f64 / Self::JIFFIES_PER_SECOND
            }
        }
    }
}

/// Final normalized output for one cursor file.
///
/// `sprite_sheet_png` holds `frame_count` frames of `width x height` stacked
/// top to bottom in playback order.
#[derive(Clone, Debug, PartialEq)]
pub struct CursorResult {
    pub width: u32,
    pub height: u32,
    pub hotspot_x: u32,
    pub hotspot_y: u32,
    pub frame_count: usize,
    pub frame_duration: f64,
    pub sprite_sheet_png: Vec<u8>,
    pub source_name: String,
}

impl CursorResult {
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    /// Wall-clock length of one animation loop in seconds.
    pub fn total_duration(&self) -> f64 {
        self.frame_duration * self.frame_count as f64
    }
}

/// Which strategy assigned roles during a folder conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSource {
    Inf,
    Filename,
}

/// A converted cursor plus the roles it was assigned.
#[derive(Clone, Debug)]
pub struct MappedCursor {
    /// File name inside the folder, extension included.
    pub file_name: String,
    pub result: CursorResult,
    pub roles: Vec<CursorRole>,
    /// Position in the INF scheme list, when roles came from an INF.
    pub inf_position: Option<usize>,
}
