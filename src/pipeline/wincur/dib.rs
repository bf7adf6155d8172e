// Pixel decoding for images embedded in ICO/CUR directories: PNG passthrough
// or a legacy DIB (XOR color data followed by a 1-bpp AND mask).

use byteorder::{LittleEndian, WriteBytesExt};
use image::{ImageFormat, Rgba, RgbaImage};
use log::{debug, warn};
use std::fmt::Display;
use std::io::Write;

use super::reader::ByteCursor;
use crate::error::{CursorError, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

const BITMAPINFOHEADER_SIZE: u32 = 40;
const BITMAPFILEHEADER_SIZE: u32 = 14;

pub const BI_RGB: u32 = 0;
pub const BI_RLE8: u32 = 1;
pub const BI_RLE4: u32 = 2;
pub const BI_BITFIELDS: u32 = 3;

pub(crate) const MAX_DIMENSION: u32 = 1024;

/// Fill color used when a DIB cannot be decoded at all.
pub const PLACEHOLDER_COLOR: Rgba<u8> = Rgba([255, 0, 255, 128]);

const MISSING_PALETTE_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// `BITMAPINFOHEADER`. For icons `height` covers the XOR and AND planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DibHeader {
    pub header_size: u32,
    pub width: i32,
    pub height: i32,
    pub bit_count: u16,
    pub compression: u32,
    pub image_size: u32,
    pub clr_used: u32,
}

impl DibHeader {
    /// Reads the header and positions the cursor at the palette (or at the
    /// pixel data when there is no palette).
    pub fn read(cursor: ByteCursor<'_>) -> Result<(Self, ByteCursor<'_>)> {
        let (header_size, cursor) = cursor.read_u32()?;
        if header_size < BITMAPINFOHEADER_SIZE {
            return Err(CursorError::UnsupportedFormat(format!(
                "DIB header of {} bytes",
                header_size
            )));
        }

        let (width, cursor) = cursor.read_i32()?;
        let (height, cursor) = cursor.read_i32()?;
        let cursor = cursor.skip(2)?; // planes
        let (bit_count, cursor) = cursor.read_u16()?;
        let (compression, cursor) = cursor.read_u32()?;
        let (image_size, cursor) = cursor.read_u32()?;
        let cursor = cursor.skip(8)?; // pixels per meter
        let (clr_used, cursor) = cursor.read_u32()?;
        let cursor = cursor.skip(4)?; // important colors

        let mut cursor = cursor.skip((header_size - BITMAPINFOHEADER_SIZE) as usize)?;

        let header = Self {
            header_size,
            width,
            height,
            bit_count,
            compression,
            image_size,
            clr_used,
        };

        // BI_BITFIELDS with a plain info header stores three channel masks
        // between the header and the pixels.
        if header.has_trailing_masks() {
            cursor = cursor.skip(12)?;
        }

        Ok((header, cursor))
    }

    fn has_trailing_masks(&self) -> bool {
        self.compression == BI_BITFIELDS && self.header_size == BITMAPINFOHEADER_SIZE
    }

    /// Number of palette entries stored after the header.
    pub fn palette_len(&self) -> usize {
        if self.bit_count > 8 {
            0
        } else if self.clr_used > 0 {
            self.clr_used as usize
        } else {
            1 << self.bit_count
        }
    }

    fn layout(&self, fallback_width: u32) -> Result<Layout> {
        let width = if self.width > 0 {
            self.width as u32
        } else {
            fallback_width
        };
        let height = self.height.unsigned_abs() / 2;

        if width == 0 || height == 0 {
            return Err(CursorError::invalid(format!(
                "DIB has empty dimensions {}x{}",
                width, height
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(CursorError::invalid(format!(
                "DIB dimensions {}x{} exceed {}",
                width, height, MAX_DIMENSION
            )));
        }

        Ok(Layout {
            width,
            height,
            top_down: self.height < 0,
        })
    }
}

/// Decoded dimensions and row order of a DIB.
#[derive(Debug, Clone, Copy)]
struct Layout {
    width: u32,
    height: u32,
    top_down: bool,
}

impl Layout {
    /// Maps the n-th stored row to its output row (0 = top).
    fn target_row(&self, stored: u32) -> u32 {
        if self.top_down {
            stored
        } else {
            self.height - 1 - stored
        }
    }

    fn and_mask_row_size(&self) -> usize {
        ((self.width as usize + 31) / 32) * 4
    }
}

/// How a DIB's pixel data is reconstructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DibStrategy {
    /// 32-bpp BGRA, alpha channel authoritative.
    Bgra32,
    /// 24-bpp BGR plus AND mask.
    Bgr24,
    /// 16-bpp RGB565 (bitfields) or RGB555 plus AND mask.
    Rgb16 { rgb565: bool },
    /// 1/4/8-bpp palette indices plus AND mask.
    Indexed { bits: u8 },
    /// Run-length encoded 8-bpp indices plus AND mask.
    Rle8,
    /// Run-length encoded 4-bpp indices plus AND mask.
    Rle4,
    /// Anything else: handed to the generic BMP decoder.
    Wrapped,
}

impl DibStrategy {
    pub fn select(header: &DibHeader) -> Self {
        match (header.bit_count, header.compression) {
            (32, BI_RGB | BI_BITFIELDS) => DibStrategy::Bgra32,
            (24, BI_RGB) => DibStrategy::Bgr24,
            (16, BI_RGB) => DibStrategy::Rgb16 { rgb565: false },
            (16, BI_BITFIELDS) => DibStrategy::Rgb16 { rgb565: true },
            (bits @ (1 | 4 | 8), BI_RGB) => DibStrategy::Indexed { bits: bits as u8 },
            (8, BI_RLE8) => DibStrategy::Rle8,
            (4, BI_RLE4) => DibStrategy::Rle4,
            _ => DibStrategy::Wrapped,
        }
    }

    fn decode(
        self,
        header: &DibHeader,
        layout: Layout,
        cursor: ByteCursor<'_>,
    ) -> Result<RgbaImage> {
        match self {
            DibStrategy::Bgra32 => decode_bgra32(layout, cursor),
            DibStrategy::Bgr24 => decode_bgr24(layout, cursor),
            DibStrategy::Rgb16 { rgb565 } => decode_rgb16(layout, cursor, rgb565),
            DibStrategy::Indexed { bits } => {
                let (palette, cursor) = read_palette(cursor, header.palette_len())?;
                decode_indexed(layout, cursor, &palette, bits)
            }
            DibStrategy::Rle8 => {
                let (palette, cursor) = read_palette(cursor, header.palette_len())?;
                decode_rle(layout, cursor, &palette, false)
            }
            DibStrategy::Rle4 => {
                let (palette, cursor) = read_palette(cursor, header.palette_len())?;
                decode_rle(layout, cursor, &palette, true)
            }
            DibStrategy::Wrapped => decode_wrapped(header, layout, cursor.data()),
        }
    }
}

/// Decodes the image bytes of one directory entry. `entry_width` comes from
/// the ICONDIRENTRY and stands in for a DIB width that is not positive.
pub fn decode_image(data: &[u8], entry_width: u32) -> Result<RgbaImage> {
    if data.starts_with(PNG_SIGNATURE) {
        return decode_png(data);
    }
    decode_dib(data, entry_width)
}

fn decode_png(data: &[u8]) -> Result<RgbaImage> {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .map(|img| img.to_rgba8())
        .map_err(|e| CursorError::DecodingFailed(format!("PNG cursor image: {}", e)))
}

pub fn decode_dib(data: &[u8], entry_width: u32) -> Result<RgbaImage> {
    let (header, cursor) = DibHeader::read(ByteCursor::new(data))?;
    let layout = header.layout(entry_width)?;
    let strategy = DibStrategy::select(&header);

    debug!(
        "DIB {}x{} {}bpp compression {} -> {:?}",
        layout.width, layout.height, header.bit_count, header.compression, strategy
    );

    match strategy {
        DibStrategy::Wrapped => Ok(strategy
            .decode(&header, layout, cursor)
            .unwrap_or_else(|e| recover_with_placeholder(layout.width, layout.height, &e))),
        _ => strategy.decode(&header, layout, cursor),
    }
}

/// Lossy recovery for DIB variants nothing can decode: a translucent
/// magenta image of the expected size, so a batch keeps going.
pub fn recover_with_placeholder(width: u32, height: u32, reason: &dyn Display) -> RgbaImage {
    warn!(
        "Substituting {}x{} placeholder for undecodable bitmap: {}",
        width, height, reason
    );
    RgbaImage::from_pixel(width, height, PLACEHOLDER_COLOR)
}

fn read_palette(cursor: ByteCursor<'_>, count: usize) -> Result<(Vec<Rgba<u8>>, ByteCursor<'_>)> {
    let (bytes, cursor) = cursor.read_bytes(count * 4)?;
    let palette = bytes
        .chunks_exact(4)
        .map(|bgrx| Rgba([bgrx[2], bgrx[1], bgrx[0], 255]))
        .collect();
    Ok((palette, cursor))
}

fn palette_color(palette: &[Rgba<u8>], index: u8) -> Rgba<u8> {
    palette
        .get(index as usize)
        .copied()
        .unwrap_or(MISSING_PALETTE_COLOR)
}

fn padded_row_size(width: u32, bits: u32) -> usize {
    ((width as usize * bits as usize + 31) / 32) * 4
}

/// Clears alpha wherever the trailing 1-bpp AND mask has a set bit.
///
/// A short or missing mask leaves the remaining pixels opaque.
fn apply_and_mask(image: &mut RgbaImage, layout: Layout, mut cursor: ByteCursor<'_>) {
    let row_size = layout.and_mask_row_size();

    for stored in 0..layout.height {
        let Ok((row, next)) = cursor.read_bytes(row_size) else {
            debug!("AND mask truncated at row {}", stored);
            return;
        };
        cursor = next;

        let y = layout.target_row(stored);
        for x in 0..layout.width {
            let byte = row[(x / 8) as usize];
            if (byte >> (7 - (x % 8))) & 1 == 1 {
                image.get_pixel_mut(x, y)[3] = 0;
            }
        }
    }
}

fn decode_bgra32(layout: Layout, cursor: ByteCursor<'_>) -> Result<RgbaImage> {
    let row_size = padded_row_size(layout.width, 32);
    let mut image = RgbaImage::new(layout.width, layout.height);
    let mut cursor = cursor;

    for stored in 0..layout.height {
        let (row, next) = cursor.read_bytes(row_size)?;
        cursor = next;

        let y = layout.target_row(stored);
        for (x, bgra) in row.chunks_exact(4).take(layout.width as usize).enumerate() {
            image.put_pixel(x as u32, y, Rgba([bgra[2], bgra[1], bgra[0], bgra[3]]));
        }
    }

    // Pre-alpha cursors store 0 in the fourth byte and rely on the mask.
    if image.pixels().all(|p| p[3] == 0) {
        debug!("32bpp DIB has an empty alpha channel, using the AND mask");
        for pixel in image.pixels_mut() {
            pixel[3] = 255;
        }
        apply_and_mask(&mut image, layout, cursor);
    }

    Ok(image)
}

fn decode_bgr24(layout: Layout, cursor: ByteCursor<'_>) -> Result<RgbaImage> {
    let row_size = padded_row_size(layout.width, 24);
    let mut image = RgbaImage::new(layout.width, layout.height);
    let mut cursor = cursor;

    for stored in 0..layout.height {
        let (row, next) = cursor.read_bytes(row_size)?;
        cursor = next;

        let y = layout.target_row(stored);
        for (x, bgr) in row.chunks_exact(3).take(layout.width as usize).enumerate() {
            image.put_pixel(x as u32, y, Rgba([bgr[2], bgr[1], bgr[0], 255]));
        }
    }

    apply_and_mask(&mut image, layout, cursor);
    Ok(image)
}

fn decode_rgb16(layout: Layout, cursor: ByteCursor<'_>, rgb565: bool) -> Result<RgbaImage> {
    let row_size = padded_row_size(layout.width, 16);
    let mut image = RgbaImage::new(layout.width, layout.height);
    let mut cursor = cursor;

    for stored in 0..layout.height {
        let (row, next) = cursor.read_bytes(row_size)?;
        cursor = next;

        let y = layout.target_row(stored);
        for (x, pair) in row.chunks_exact(2).take(layout.width as usize).enumerate() {
            let pixel = u16::from_le_bytes([pair[0], pair[1]]);
            let (r, g, b) = if rgb565 {
                (
                    ((pixel >> 11) & 0x1F) as u8,
                    ((pixel >> 5) & 0x3F) as u8,
                    (pixel & 0x1F) as u8,
                )
            } else {
                (
                    ((pixel >> 10) & 0x1F) as u8,
                    ((pixel >> 5) & 0x1F) as u8,
                    (pixel & 0x1F) as u8,
                )
            };
            let g = if rgb565 { g << 2 } else { g << 3 };
            image.put_pixel(x as u32, y, Rgba([r << 3, g, b << 3, 255]));
        }
    }

    apply_and_mask(&mut image, layout, cursor);
    Ok(image)
}

fn decode_indexed(
    layout: Layout,
    cursor: ByteCursor<'_>,
    palette: &[Rgba<u8>],
    bits: u8,
) -> Result<RgbaImage> {
    let row_size = padded_row_size(layout.width, bits as u32);
    let mask = (1u16 << bits) - 1;
    let mut image = RgbaImage::new(layout.width, layout.height);
    let mut cursor = cursor;

    for stored in 0..layout.height {
        let (row, next) = cursor.read_bytes(row_size)?;
        cursor = next;

        let y = layout.target_row(stored);
        for x in 0..layout.width {
            let bit_offset = x as usize * bits as usize;
            let byte = row[bit_offset / 8] as u16;
            let shift = 8 - bits as usize - (bit_offset % 8);
            let index = ((byte >> shift) & mask) as u8;
            image.put_pixel(x, y, palette_color(palette, index));
        }
    }

    apply_and_mask(&mut image, layout, cursor);
    Ok(image)
}

/// Write head for RLE streams; pixels outside the bitmap are dropped.
struct RleCanvas {
    image: RgbaImage,
    layout: Layout,
    x: u32,
    row: u32,
}

impl RleCanvas {
    fn new(layout: Layout) -> Self {
        Self {
            image: RgbaImage::new(layout.width, layout.height),
            layout,
            x: 0,
            row: 0,
        }
    }

    fn put(&mut self, color: Rgba<u8>) {
        if self.x < self.layout.width && self.row < self.layout.height {
            let y = self.layout.target_row(self.row);
            self.image.put_pixel(self.x, y, color);
        }
        self.x = self.x.saturating_add(1);
    }

    fn end_of_line(&mut self) {
        self.x = 0;
        self.row = self.row.saturating_add(1);
    }

    fn delta(&mut self, dx: u8, dy: u8) {
        self.x = self.x.saturating_add(dx as u32);
        self.row = self.row.saturating_add(dy as u32);
    }
}

fn nibble(byte: u8, index: usize) -> u8 {
    if index % 2 == 0 { byte >> 4 } else { byte & 0x0F }
}

/// Decodes a BI_RLE8 (`nibbles == false`) or BI_RLE4 stream, then applies
/// the AND mask that follows it.
fn decode_rle(
    layout: Layout,
    cursor: ByteCursor<'_>,
    palette: &[Rgba<u8>],
    nibbles: bool,
) -> Result<RgbaImage> {
    let mut canvas = RleCanvas::new(layout);
    let mut cursor = cursor;

    while cursor.remaining() >= 2 {
        let (count, next) = cursor.read_u8()?;
        let (value, next) = next.read_u8()?;
        cursor = next;

        if count > 0 {
            for i in 0..count as usize {
                let index = if nibbles { nibble(value, i) } else { value };
                canvas.put(palette_color(palette, index));
            }
            continue;
        }

        match value {
            0 => canvas.end_of_line(),
            1 => break,
            2 => {
                let (dx, next) = cursor.read_u8()?;
                let (dy, next) = next.read_u8()?;
                cursor = next;
                canvas.delta(dx, dy);
            }
            literal_count => {
                let literal_count = literal_count as usize;
                let byte_count = if nibbles {
                    literal_count.div_ceil(2)
                } else {
                    literal_count
                };
                let (literals, next) = cursor.read_bytes(byte_count)?;
                cursor = next;

                for i in 0..literal_count {
                    let index = if nibbles {
                        nibble(literals[i / 2], i)
                    } else {
                        literals[i]
                    };
                    canvas.put(palette_color(palette, index));
                }

                // Absolute runs are padded to a 16-bit boundary.
                if byte_count % 2 == 1 && cursor.remaining() > 0 {
                    cursor = cursor.skip(1)?;
                }
            }
        }
    }

    let mut image = canvas.image;
    apply_and_mask(&mut image, layout, cursor);
    Ok(image)
}

/// Hands the DIB to the generic BMP decoder behind a synthetic file header.
fn decode_wrapped(header: &DibHeader, layout: Layout, dib_data: &[u8]) -> Result<RgbaImage> {
    let bmp_data = create_bmp_from_dib(header, layout, dib_data)
        .map_err(|e| CursorError::DecodingFailed(format!("BMP wrapper: {}", e)))?;

    let image = image::load_from_memory_with_format(&bmp_data, ImageFormat::Bmp)
        .map_err(|e| CursorError::DecodingFailed(format!("wrapped DIB: {}", e)))?
        .to_rgba8();

    debug!(
        "generic BMP decoder produced {}x{}",
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Builds a complete BMP file around DIB data, halving the icon height so
/// the AND plane is not read as color rows.
fn create_bmp_from_dib(
    header: &DibHeader,
    layout: Layout,
    dib_data: &[u8],
) -> std::io::Result<Vec<u8>> {
    let palette_size = (header.palette_len() as u32).saturating_mul(4);
    let masks_size = if header.has_trailing_masks() { 12 } else { 0 };
    let pixel_data_offset = BITMAPFILEHEADER_SIZE
        .saturating_add(header.header_size)
        .saturating_add(masks_size)
        .saturating_add(palette_size);
    let file_size = BITMAPFILEHEADER_SIZE.saturating_add(dib_data.len() as u32);

    let mut bmp_data = Vec::with_capacity(file_size as usize);

    bmp_data.write_all(b"BM")?;
    bmp_data.write_u32::<LittleEndian>(file_size)?;
    bmp_data.write_u16::<LittleEndian>(0)?;
    bmp_data.write_u16::<LittleEndian>(0)?;
    bmp_data.write_u32::<LittleEndian>(pixel_data_offset)?;

    bmp_data.write_all(&dib_data[..8])?;
    let height = if layout.top_down {
        -(layout.height as i32)
    } else {
        layout.height as i32
    };
    bmp_data.write_i32::<LittleEndian>(height)?;
    bmp_data.write_all(&dib_data[12..])?;

    Ok(bmp_data)
}
