//! Endian-aware reader over an in-memory Unity stream

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Byte order of a Unity stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Cursor over a byte slice with Unity's primitive readers.
///
/// Bundle headers are big-endian, web data is little-endian and serialized
/// files switch after their header, so the order is mutable.
#[derive(Debug, Clone)]
pub struct EndianReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

macro_rules! read_num {
    ($name:ident, $ty:ty, $size:expr, $read:ident) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the current byte order.")]
        pub fn $name(&mut self) -> Result<$ty> {
            let bytes = self.read_bytes($size)?;
            Ok(match self.endian {
                Endian::Big => BigEndian::$read(bytes),
                Endian::Little => LittleEndian::$read(bytes),
            })
        }
    };
}

impl<'a> EndianReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(Error::UnexpectedEof {
                offset: pos,
                needed: 0,
            });
        }
        self.pos = pos;
        Ok(())
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

    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_bytes(count).map(|_| ())
    }

    /// Borrow the next `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|end| *end <= self.data.len())
            .ok_or(Error::UnexpectedEof {
                offset: self.pos,
                needed: count,
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    read_num!(read_u16, u16, 2, read_u16);
    read_num!(read_u32, u32, 4, read_u32);
    read_num!(read_i32, i32, 4, read_i32);
    read_num!(read_u64, u64, 8, read_u64);
    read_num!(read_i64, i64, 8, read_i64);
    read_num!(read_f32, f32, 4, read_f32);

    /// Advance to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<()> {
        let rem = self.pos % alignment;
        if rem != 0 {
            self.skip(alignment - rem)?;
        }
        Ok(())
    }

    /// Null-terminated UTF-8 string of at most `max_len` bytes.
    pub fn read_cstring(&mut self, max_len: usize) -> Result<String> {
        let window = &self.data[self.pos..];
        let limit = window.len().min(max_len);
        let len = window[..limit].iter().position(|&b| b == 0).unwrap_or(limit);
        let text = String::from_utf8_lossy(&window[..len]).into_owned();
        // consume the terminator when present
        self.pos += if len < window.len() && window[len] == 0 { len + 1 } else { len };
        Ok(text)
    }

    /// Length-prefixed string padded to 4 bytes.
    pub fn read_aligned_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        if len <= 0 {
            return Ok(String::new());
        }
        let len = len as usize;
        if len > self.remaining() {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                needed: len,
            });
        }
        let text = String::from_utf8_lossy(self.read_bytes(len)?).into_owned();
        self.align(4)?;
        Ok(text)
    }

    /// Element count that must fit in the remaining data at `min_elem_size` bytes each.
    pub fn read_count(&mut self, min_elem_size: usize) -> Result<usize> {
        let offset = self.pos;
        let count = self.read_i32()?;
        let count = usize::try_from(count).map_err(|_| {
            Error::InvalidSerializedFile(format!("negative element count {count} at {offset}"))
        })?;
        if count.saturating_mul(min_elem_size) > self.remaining() {
            return Err(Error::UnexpectedEof {
                offset,
                needed: count.saturating_mul(min_elem_size),
            });
        }
        Ok(count)
    }
}
