use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::debug;

use super::dib::MAX_DIMENSION;
use crate::error::{CursorError, Result};
use crate::model::cursor::DecodedFrame;

/// Frame ceiling for sprite sheets handed to the cursor runtime.
pub const MAX_FRAME_COUNT: usize = 24;

/// Largest accepted scale factor.
pub const MAX_SCALE: f32 = 8.0;

/// Resamples every frame by `scale`. The factor is capped at `MAX_SCALE`, and
/// further so no side grows past `MAX_DIMENSION`.
pub fn scale_frames(frames: &mut [DecodedFrame], scale: f32) {
    for frame in frames {
        let width = frame.image.width();
        let height = frame.image.height();

        let fit = MAX_DIMENSION as f32 / width.max(height).max(1) as f32;
        let scale = scale.min(MAX_SCALE).min(fit.max(1.0));

        let new_width = ((width as f32 * scale).round() as u32).max(1);
        let new_height = ((height as f32 * scale).round() as u32).max(1);

        frame.image = imageops::resize(&frame.image, new_width, new_height, FilterType::Lanczos3);

        let hotspot_x = (frame.hotspot.0 as f32 * scale).round() as u32;
        let hotspot_y = (frame.hotspot.1 as f32 * scale).round() as u32;
        frame.hotspot = clamp_hotspot((hotspot_x, hotspot_y), new_width, new_height);
    }
}

/// Keeps a hotspot inside `[0, width) x [0, height)`.
pub fn clamp_hotspot(hotspot: (u32, u32), width: u32, height: u32) -> (u32, u32) {
    (
        hotspot.0.min(width.saturating_sub(1)),
        hotspot.1.min(height.saturating_sub(1)),
    )
}

/// Stacks frames top to bottom in playback order.
///
/// The first frame fixes the cell size; any frame of a different size is
/// resampled to it with Lanczos3.
pub fn compose_sprite_sheet(frames: &[DecodedFrame]) -> Result<RgbaImage> {
    let first = frames
        .first()
        .ok_or_else(|| CursorError::invalid("no frames to compose"))?;

    if frames.len() == 1 {
        return Ok(first.image.clone());
    }

    let width = first.width();
    let height = first.height();
    let sheet_height = (frames.len() as u32)
        .checked_mul(height)
        .ok_or_else(|| CursorError::invalid("sprite sheet height overflows"))?;

    let mut sheet = RgbaImage::new(width, sheet_height);
    for (index, frame) in frames.iter().enumerate() {
        let y = index as i64 * height as i64;
        if frame.width() == width && frame.height() == height {
            imageops::replace(&mut sheet, &frame.image, 0, y);
        } else {
            debug!(
                "resizing frame {} from {}x{} to {}x{}",
                index,
                frame.width(),
                frame.height(),
                width,
                height
            );
            let resized = imageops::resize(&frame.image, width, height, FilterType::Lanczos3);
            imageops::replace(&mut sheet, &resized, 0, y);
        }
    }

    Ok(sheet)
}

/// Picks `ceiling` evenly spread frame indices out of `from_count`.
///
/// The first and last frames are always kept and the result never decreases.
/// Counts already within the ceiling come back unchanged.
pub fn select_frame_indices(from_count: usize, ceiling: usize) -> Vec<usize> {
    if from_count <= ceiling {
        return (0..from_count).collect();
    }
    if ceiling <= 1 {
        return vec![0; ceiling];
    }

    let last = from_count - 1;
    let step = last as f64 / (ceiling - 1) as f64;
    (0..ceiling)
        .map(|i| ((i as f64 * step).round() as usize).min(last))
        .collect()
}

/// A sprite sheet reduced to at most the frame ceiling.
#[derive(Debug, Clone)]
pub struct LimitedSheet {
    pub sheet: RgbaImage,
    pub frame_count: usize,
    pub frame_duration: f64,
}

/// Chooses which of `step_count` playback steps survive `ceiling`, with the
/// per-frame duration stretched so one loop keeps its wall-clock length.
pub fn limit_steps(step_count: usize, frame_duration: f64, ceiling: usize) -> (Vec<usize>, f64) {
    if step_count <= ceiling || ceiling == 0 {
        return ((0..step_count).collect(), frame_duration);
    }

    let indices = select_frame_indices(step_count, ceiling);
    debug!("downsampled {} frames to {}", step_count, indices.len());
    let duration = frame_duration * step_count as f64 / indices.len() as f64;
    (indices, duration)
}

/// Drops frames from a sprite sheet until it fits under `ceiling`, stretching
/// the per-frame duration so one loop keeps its wall-clock length.
pub fn limit_frames(
    sheet: RgbaImage,
    frame_height: u32,
    frame_count: usize,
    frame_duration: f64,
    ceiling: usize,
) -> LimitedSheet {
    if frame_count <= ceiling || ceiling == 0 {
        return LimitedSheet {
            sheet,
            frame_count,
            frame_duration,
        };
    }

    let (indices, frame_duration) = limit_steps(frame_count, frame_duration, ceiling);
    let width = sheet.width();
    let mut limited = RgbaImage::new(width, frame_height * indices.len() as u32);

    for (slot, &source) in indices.iter().enumerate() {
        let cell = imageops::crop_imm(&sheet, 0, source as u32 * frame_height, width, frame_height);
        imageops::replace(
            &mut limited,
            &cell.to_image(),
            0,
            slot as i64 * frame_height as i64,
        );
    }

    LimitedSheet {
        sheet: limited,
        frame_count: indices.len(),
        frame_duration,
    }
}
