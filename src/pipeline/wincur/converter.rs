// High-level conversion API: one Windows cursor file in, one sprite sheet out.

use image::{ImageFormat, RgbaImage};
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

use super::CursorFormat;
use super::ani::{AniCursor, AniParser};
use super::cur::CurParser;
use super::utils::{
    MAX_FRAME_COUNT, clamp_hotspot, compose_sprite_sheet, limit_steps, scale_frames,
};
use crate::error::{CursorError, Result};
use crate::model::cursor::{CursorResult, DecodedFrame};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Frame ceiling; always within `1..=MAX_FRAME_COUNT`.
    pub max_frames: usize,
    pub scale: Option<f32>,
    /// Convert folder entries on the rayon pool.
    pub parallel: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            max_frames: MAX_FRAME_COUNT,
            scale: None,
            parallel: true,
        }
    }
}

impl ConversionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames.clamp(1, MAX_FRAME_COUNT);
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// The ceiling actually applied, even if a config file set it out of range.
    pub fn frame_ceiling(&self) -> usize {
        self.max_frames.clamp(1, MAX_FRAME_COUNT)
    }
}

/// Converts an in-memory cursor. `extension` is `cur` or `ani`, with or
/// without the leading dot and in any case.
pub fn convert_bytes(
    data: &[u8],
    extension: &str,
    options: &ConversionOptions,
) -> Result<CursorResult> {
    let format = CursorFormat::from_extension(extension).ok_or_else(|| {
        CursorError::UnsupportedFormat(format!("unsupported cursor extension: {:?}", extension))
    })?;

    let (frames, frame_duration) = match format {
        CursorFormat::Cur => (vec![CurParser::parse(data)?], 0.0),
        CursorFormat::Ani => playback_frames(&AniParser::parse(data)?, options.frame_ceiling()),
    };

    build_result(frames, frame_duration, options)
}

/// Reads and converts a cursor file, naming the result after its file stem.
pub fn convert_file(path: &Path, options: &ConversionOptions) -> Result<CursorResult> {
    if !path.is_file() {
        return Err(CursorError::FileNotFound(path.to_path_buf()));
    }

    let data = std::fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    let mut result = convert_bytes(&data, extension, options)?;
    result.source_name = source_name(path);
    Ok(result)
}

pub(crate) fn source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Clones the frames of the steps that survive the frame ceiling. Timing is
/// averaged over every step before the duration is stretched.
fn playback_frames(ani: &AniCursor, ceiling: usize) -> (Vec<DecodedFrame>, f64) {
    let (steps, frame_duration) =
        limit_steps(ani.step_count(), ani.timing.seconds_per_frame(), ceiling);
    let frames = steps
        .iter()
        .filter_map(|&step| ani.step_frame(step).cloned())
        .collect();
    (frames, frame_duration)
}

fn build_result(
    mut frames: Vec<DecodedFrame>,
    frame_duration: f64,
    options: &ConversionOptions,
) -> Result<CursorResult> {
    if let Some(scale) = options.scale {
        if scale.is_finite() && scale > 0.0 && scale != 1.0 {
            scale_frames(&mut frames, scale);
        } else {
            debug!("ignoring scale factor {}", scale);
        }
    }

    let first = frames
        .first()
        .ok_or_else(|| CursorError::invalid("cursor has no frames"))?;
    let width = first.width();
    let height = first.height();
    let (hotspot_x, hotspot_y) = clamp_hotspot(first.hotspot, width, height);

    let sheet = compose_sprite_sheet(&frames)?;

    Ok(CursorResult {
        width,
        height,
        hotspot_x,
        hotspot_y,
        frame_count: frames.len(),
        frame_duration,
        sprite_sheet_png: encode_png(&sheet)?,
        source_name: String::new(),
    })
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CursorError::DecodingFailed(format!("PNG encoding failed: {}", e)))?;
    Ok(buffer.into_inner())
}
