use log::{debug, warn};

use super::cur::CurParser;
use super::reader::ByteCursor;
use crate::error::{CursorError, Result};
use crate::model::cursor::{AnimationTiming, DecodedFrame};

const SIGNATURE: &[u8; 4] = b"RIFF";
const ANI_TYPE: &[u8; 4] = b"ACON";
const HEADER_CHUNK: &[u8; 4] = b"anih";
const LIST_CHUNK: &[u8; 4] = b"LIST";
const SEQ_CHUNK: &[u8; 4] = b"seq ";
const RATE_CHUNK: &[u8; 4] = b"rate";
const FRAME_TYPE: &[u8; 4] = b"fram";
const ICON_CHUNK: &[u8; 4] = b"icon";

const ANIH_SIZE: usize = 36;
const CHUNK_HEADER_SIZE: usize = 8;
const DEFAULT_DISPLAY_RATE: u32 = 10;

/// The fixed `anih` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnihHeader {
    pub header_size: u32,
    pub frame_count: u32,
    pub step_count: u32,
    pub width: u32,
    pub height: u32,
    pub bit_count: u32,
    pub planes: u32,
    pub display_rate: u32,
    pub flags: u32,
}

impl AnihHeader {
    /// Stand-in used when the chunk is missing or too short.
    fn fallback(frame_count: u32) -> Self {
        Self {
            header_size: ANIH_SIZE as u32,
            frame_count,
            step_count: frame_count,
            width: 0,
            height: 0,
            bit_count: 0,
            planes: 0,
            display_rate: DEFAULT_DISPLAY_RATE,
            flags: 0,
        }
    }

    fn read(payload: &[u8]) -> Result<Self> {
        if payload.len() < ANIH_SIZE {
            debug!("anih chunk is {} bytes, using defaults", payload.len());
            return Ok(Self::fallback(1));
        }

        let cursor = ByteCursor::new(payload);
        let (header_size, cursor) = cursor.read_u32()?;
        let (frame_count, cursor) = cursor.read_u32()?;
        let (step_count, cursor) = cursor.read_u32()?;
        let (width, cursor) = cursor.read_u32()?;
        let (height, cursor) = cursor.read_u32()?;
        let (bit_count, cursor) = cursor.read_u32()?;
        let (planes, cursor) = cursor.read_u32()?;
        let (display_rate, cursor) = cursor.read_u32()?;
        let (flags, _) = cursor.read_u32()?;

        Ok(Self {
            header_size,
            frame_count,
            step_count,
            width,
            height,
            bit_count,
            planes,
            display_rate,
            flags,
        })
    }

    /// Upper bound on the number of `rate` entries worth reading.
    fn rate_capacity(&self) -> usize {
        self.frame_count.max(self.step_count) as usize
    }
}

/// An animated cursor. `frames` holds each decoded image once; `steps`
/// lists playback order as indices into `frames`.
#[derive(Debug, Clone)]
pub struct AniCursor {
    pub header: Option<AnihHeader>,
    pub frames: Vec<DecodedFrame>,
    pub steps: Vec<usize>,
    pub timing: AnimationTiming,
}

impl AniCursor {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// The frame shown at playback step `step`.
    pub fn step_frame(&self, step: usize) -> Option<&DecodedFrame> {
        self.steps.get(step).and_then(|&index| self.frames.get(index))
    }

    pub fn first_frame(&self) -> Option<&DecodedFrame> {
        self.step_frame(0)
    }
}

pub struct AniParser;

impl AniParser {
    pub fn can_parse(data: &[u8]) -> bool {
        data.len() >= 12 && &data[0..4] == SIGNATURE && &data[8..12] == ANI_TYPE
    }

    pub fn parse(data: &[u8]) -> Result<AniCursor> {
        let cursor = ByteCursor::new(data);
        let (signature, cursor) = cursor.read_fourcc()?;
        if &signature != SIGNATURE {
            return Err(CursorError::invalid("not a RIFF file"));
        }
        let (_riff_size, cursor) = cursor.read_u32()?;
        let (form_type, mut cursor) = cursor.read_fourcc()?;
        if &form_type != ANI_TYPE {
            return Err(CursorError::invalid("not an ACON (animated cursor) RIFF file"));
        }

        let mut header: Option<AnihHeader> = None;
        let mut rates: Option<Vec<u32>> = None;
        let mut sequence: Option<Vec<u32>> = None;
        let mut frames: Vec<Option<DecodedFrame>> = Vec::new();

        while cursor.remaining() >= CHUNK_HEADER_SIZE {
            let (id, next) = cursor.read_fourcc()?;
            let (size, next) = next.read_u32()?;
            let (payload, next) = next.read_bytes(size as usize)?;

            match &id {
                HEADER_CHUNK => header = Some(AnihHeader::read(payload)?),
                RATE_CHUNK => {
                    let capacity = header
                        .map(|h| h.rate_capacity())
                        .unwrap_or(payload.len() / 4);
                    rates = Some(read_u32_array(payload, capacity)?);
                }
                SEQ_CHUNK => sequence = Some(read_u32_array(payload, payload.len() / 4)?),
                LIST_CHUNK => {
                    if payload.get(0..4) == Some(&FRAME_TYPE[..]) {
                        frames.extend(Self::read_frames(&payload[4..])?);
                    } else {
                        debug!("skipping LIST chunk that is not a frame list");
                    }
                }
                other => debug!(
                    "skipping unknown chunk {:?} ({} bytes)",
                    String::from_utf8_lossy(other),
                    size
                ),
            }

            cursor = next.align_even();
        }

        if frames.is_empty() {
            return Err(CursorError::invalid("no frames found in ANI file"));
        }

        let display_rate = header
            .map(|h| h.display_rate)
            .unwrap_or(DEFAULT_DISPLAY_RATE);
        let (frames, steps, step_rates) =
            Self::expand_steps(frames, sequence.as_deref(), rates.as_deref())?;

        if steps.is_empty() {
            return Err(CursorError::invalid("no ANI frame could be decoded"));
        }

        let timing = if step_rates.is_empty() {
            AnimationTiming::Uniform(display_rate)
        } else {
            AnimationTiming::PerFrame(step_rates)
        };

        Ok(AniCursor {
            header,
            frames,
            steps,
            timing,
        })
    }

    /// Decodes every `icon` sub-chunk of a `fram` list. Frames that fail to
    /// decode keep their slot as `None` so `seq` indices still line up.
    fn read_frames(list: &[u8]) -> Result<Vec<Option<DecodedFrame>>> {
        let mut cursor = ByteCursor::new(list);
        let mut frames = Vec::new();

        while cursor.remaining() >= CHUNK_HEADER_SIZE {
            let (id, next) = cursor.read_fourcc()?;
            let (size, next) = next.read_u32()?;
            let (payload, next) = next.read_bytes(size as usize)?;

            if &id == ICON_CHUNK {
                match CurParser::parse_ani_frame(payload) {
                    Ok(frame) => frames.push(Some(frame)),
                    Err(e) => {
                        warn!("skipping ANI frame {}: {}", frames.len(), e);
                        frames.push(None);
                    }
                }
            }

            cursor = next.align_even();
        }

        Ok(frames)
    }

    /// Orders frames by the `seq` chunk (or file order without one) and pairs
    /// each surviving step with its `rate` entry. Steps are frame indices, so a
    /// long sequence never copies pixel data.
    fn expand_steps(
        slots: Vec<Option<DecodedFrame>>,
        sequence: Option<&[u32]>,
        rates: Option<&[u32]>,
    ) -> Result<(Vec<DecodedFrame>, Vec<usize>, Vec<u32>)> {
        let slot_count = slots.len();
        let mut frames = Vec::with_capacity(slot_count);
        let remap: Vec<Option<usize>> = slots
            .into_iter()
            .map(|slot| {
                slot.map(|frame| {
                    frames.push(frame);
                    frames.len() - 1
                })
            })
            .collect();

        let order: Vec<usize> = match sequence {
            Some(seq) => seq.iter().map(|&i| i as usize).collect(),
            None => (0..slot_count).collect(),
        };

        let mut steps = Vec::with_capacity(order.len());
        let mut step_rates = Vec::with_capacity(order.len());

        for (step, &slot) in order.iter().enumerate() {
            let mapped = remap.get(slot).ok_or_else(|| {
                CursorError::invalid(format!(
                    "sequence step {} references frame {} of {}",
                    step, slot, slot_count
                ))
            })?;

            let Some(index) = *mapped else {
                continue;
            };
            steps.push(index);
            if let Some(rate) = rates.and_then(|r| r.get(step)) {
                step_rates.push(*rate);
            }
        }

        Ok((frames, steps, step_rates))
    }
}

fn read_u32_array(payload: &[u8], capacity: usize) -> Result<Vec<u32>> {
    let count = capacity.min(payload.len() / 4);
    let mut cursor = ByteCursor::new(payload);
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let (value, next) = cursor.read_u32()?;
        values.push(value);
        cursor = next;
    }
    Ok(values)
}
