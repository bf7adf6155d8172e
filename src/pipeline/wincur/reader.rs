// Bounds-checked little-endian reader over an immutable byte buffer.
//
// Every read consumes the cursor and hands back the advanced copy, so a
// cursor value can be kept around to retry or peek from an earlier position.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{CursorError, Result};

#[derive(Debug, Clone, Copy)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// The whole backing buffer, independent of the current position.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn take(self, count: usize) -> Result<(&'a [u8], Self)> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                CursorError::invalid(format!(
                    "unexpected end of data: need {} bytes at offset {}, have {}",
                    count,
                    self.pos,
                    self.remaining()
                ))
            })?;

        Ok((
            &self.data[self.pos..end],
            Self {
                data: self.data,
                pos: end,
            },
        ))
    }

    pub fn read_u8(self) -> Result<(u8, Self)> {
        let (bytes, next) = self.take(1)?;
        Ok((bytes[0], next))
    }

    pub fn read_u16(self) -> Result<(u16, Self)> {
        let (bytes, next) = self.take(2)?;
        Ok((LittleEndian::read_u16(bytes), next))
    }

    pub fn read_u32(self) -> Result<(u32, Self)> {
        let (bytes, next) = self.take(4)?;
        Ok((LittleEndian::read_u32(bytes), next))
    }

    pub fn read_i32(self) -> Result<(i32, Self)> {
        let (bytes, next) = self.take(4)?;
        Ok((LittleEndian::read_i32(bytes), next))
    }

    pub fn read_bytes(self, count: usize) -> Result<(&'a [u8], Self)> {
        self.take(count)
    }

    /// Reads a RIFF four-character code.
    pub fn read_fourcc(self) -> Result<([u8; 4], Self)> {
        let (bytes, next) = self.take(4)?;
        Ok(([bytes[0], bytes[1], bytes[2], bytes[3]], next))
    }

    pub fn skip(self, count: usize) -> Result<Self> {
        self.take(count).map(|(_, next)| next)
    }

    pub fn seek(self, pos: usize) -> Result<Self> {
        if pos > self.data.len() {
            return Err(CursorError::invalid(format!(
                "seek to {} outside buffer of {} bytes",
                pos,
                self.data.len()
            )));
        }
        Ok(Self {
            data: self.data,
            pos,
        })
    }

    pub fn peek_bytes(&self, count: usize) -> Option<&'a [u8]> {
        self.take(count).ok().map(|(bytes, _)| bytes)
    }

    /// Skips the RIFF pad byte after an odd-sized chunk, if one is present.
    pub fn align_even(self) -> Self {
        if self.pos % 2 == 1 && self.pos < self.data.len() {
            Self {
                data: self.data,
                pos: self.pos + 1,
            }
        } else {
            self
        }
    }
}
