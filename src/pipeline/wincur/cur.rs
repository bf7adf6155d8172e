use log::debug;

use super::dib;
use super::reader::ByteCursor;
use crate::error::{CursorError, Result};
use crate::model::cursor::DecodedFrame;

pub const ICO_TYPE_ICON: u16 = 1;
pub const ICO_TYPE_CUR: u16 = 2;
const MAGIC: &[u8] = &[0x00, 0x00, 0x02, 0x00];

const ICONDIR_SIZE: usize = 6;
const ICONDIRENTRY_SIZE: usize = 16;

/// One `ICONDIRENTRY`, with the 0-means-256 size encoding resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconDirEntry {
    pub width: u32,
    pub height: u32,
    pub color_count: u8,
    pub hotspot_x: u16,
    pub hotspot_y: u16,
    pub data_size: u32,
    pub data_offset: u32,
}

impl IconDirEntry {
    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    fn read(cursor: ByteCursor<'_>) -> Result<(Self, ByteCursor<'_>)> {
        let (width, cursor) = cursor.read_u8()?;
        let (height, cursor) = cursor.read_u8()?;
        let (color_count, cursor) = cursor.read_u8()?;
        let cursor = cursor.skip(1)?; // reserved
        let (hotspot_x, cursor) = cursor.read_u16()?;
        let (hotspot_y, cursor) = cursor.read_u16()?;
        let (data_size, cursor) = cursor.read_u32()?;
        let (data_offset, cursor) = cursor.read_u32()?;

        Ok((
            Self {
                width: if width == 0 { 256 } else { width as u32 },
                height: if height == 0 { 256 } else { height as u32 },
                color_count,
                hotspot_x,
                hotspot_y,
                data_size,
                data_offset,
            },
            cursor,
        ))
    }
}

/// The `ICONDIR` table at the start of a `.cur` file or an ANI `icon` chunk.
#[derive(Debug, Clone)]
pub struct IconDir {
    pub image_type: u16,
    pub entries: Vec<IconDirEntry>,
}

impl IconDir {
    /// Parses the directory. `accept_icons` allows type 1 (icon) as well as
    /// type 2 (cursor), which ANI frames need.
    pub fn parse(data: &[u8], accept_icons: bool) -> Result<Self> {
        let cursor = ByteCursor::new(data);
        let (reserved, cursor) = cursor.read_u16()?;
        let (image_type, cursor) = cursor.read_u16()?;
        let (image_count, mut cursor) = cursor.read_u16()?;

        if reserved != 0 {
            return Err(CursorError::invalid("invalid reserved field in ICONDIR"));
        }
        let type_ok = image_type == ICO_TYPE_CUR || (accept_icons && image_type == ICO_TYPE_ICON);
        if !type_ok {
            return Err(CursorError::invalid(format!(
                "not a cursor image (type {}, expected {})",
                image_type, ICO_TYPE_CUR
            )));
        }
        if image_count == 0 {
            return Err(CursorError::invalid("no images in ICONDIR"));
        }

        let mut entries = Vec::with_capacity(image_count as usize);
        for _ in 0..image_count {
            let (entry, next) = IconDirEntry::read(cursor)?;
            entries.push(entry);
            cursor = next;
        }

        Ok(Self {
            image_type,
            entries,
        })
    }

    /// The entry with the largest pixel area; the first one wins ties.
    pub fn best_entry(&self) -> Option<&IconDirEntry> {
        self.entries
            .iter()
            .fold(None, |best: Option<&IconDirEntry>, entry| match best {
                Some(current) if current.area() >= entry.area() => Some(current),
                _ => Some(entry),
            })
    }

    /// Hotspots only exist in cursor directories; in icons those fields
    /// hold planes and bit count.
    pub fn hotspot_of(&self, entry: &IconDirEntry) -> (u32, u32) {
        if self.image_type == ICO_TYPE_CUR {
            (entry.hotspot_x as u32, entry.hotspot_y as u32)
        } else {
            (0, 0)
        }
    }
}

/// Directory entry chosen from a buffer plus the image bytes it points at.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedImage<'a> {
    pub entry: IconDirEntry,
    pub hotspot: (u32, u32),
    pub data: &'a [u8],
}

pub struct CurParser;

impl CurParser {
    pub fn can_parse(data: &[u8]) -> bool {
        data.len() >= 4 && &data[0..4] == MAGIC
    }

    /// Picks the largest directory entry and slices out its image data.
    pub fn locate(data: &[u8], accept_icons: bool) -> Result<EmbeddedImage<'_>> {
        let dir = IconDir::parse(data, accept_icons)?;
        let entry = *dir
            .best_entry()
            .ok_or_else(|| CursorError::invalid("no valid ICONDIR entries"))?;

        let table_end = ICONDIR_SIZE + dir.entries.len() * ICONDIRENTRY_SIZE;
        if (entry.data_offset as usize) < table_end {
            debug!(
                "image offset {} overlaps the directory table ({} bytes)",
                entry.data_offset, table_end
            );
        }

        let cursor = ByteCursor::new(data).seek(entry.data_offset as usize)?;
        let (image_data, _) = cursor.read_bytes(entry.data_size as usize)?;

        Ok(EmbeddedImage {
            entry,
            hotspot: dir.hotspot_of(&entry),
            data: image_data,
        })
    }

    /// Decodes a static `.cur` file into its best frame.
    pub fn parse(data: &[u8]) -> Result<DecodedFrame> {
        Self::decode(data, false)
    }

    /// Decodes the ICO blob inside an ANI `icon` chunk.
    pub fn parse_ani_frame(data: &[u8]) -> Result<DecodedFrame> {
        Self::decode(data, true)
    }

    fn decode(data: &[u8], accept_icons: bool) -> Result<DecodedFrame> {
        let embedded = Self::locate(data, accept_icons)?;
        let image = dib::decode_image(embedded.data, embedded.entry.width)?;
        Ok(DecodedFrame::new(image, embedded.hotspot))
    }
}
