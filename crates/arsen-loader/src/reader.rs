//! Bounds-checked, endian-aware reads over a file image.

use std::io::Cursor;

use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Endianness;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};

/// Cursor over a byte slice that reports out-of-range reads as
/// [`ArsenError::Malformed`] for the format being parsed.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    cursor: Cursor<&'a [u8]>,
    endianness: Endianness,
    format: &'static str,
}

macro_rules! read_int {
    ($name:ident, $at:ident, $ty:ty, $method:ident) => {
        #[doc = concat!("Reads a `", stringify!($ty), "` at the cursor and advances.")]
        ///
        /// # Errors
        ///
        /// Returns `ArsenError::Malformed` if the value extends past the data.
        pub fn $name(&mut self) -> Result<$ty> {
            let pos = self.cursor.position();
            let value = match self.endianness {
                Endianness::Little => self.cursor.$method::<LittleEndian>(),
                Endianness::Big => self.cursor.$method::<BigEndian>(),
            };
            value.map_err(|_| self.out_of_range(pos, std::mem::size_of::<$ty>()))
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` at `offset` without moving the cursor.")]
        ///
        /// # Errors
        ///
        /// Returns `ArsenError::Malformed` if the value extends past the data.
        pub fn $at(&self, offset: u64) -> Result<$ty> {
            let mut probe = self.clone();
            probe.seek(offset);
            probe.$name()
        }
    };
}

impl<'a> ByteReader<'a> {
    /// Creates a reader positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8], endianness: Endianness, format: &'static str) -> Self {
        Self {
            cursor: Cursor::new(data),
            endianness,
            format,
        }
    }

    /// Byte order used for multi-byte reads.
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cursor.get_ref().len() as u64
    }

    /// Whether the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Current cursor position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Moves the cursor to an absolute offset. Positions past the end are
    /// allowed; the next read fails.
    pub fn seek(&mut self, offset: u64) {
        self.cursor.set_position(offset);
    }

    /// Advances the cursor by `count` bytes.
    pub fn skip(&mut self, count: u64) {
        self.cursor.set_position(self.cursor.position().saturating_add(count));
    }

    /// Reads one byte at the cursor.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` at end of data.
    pub fn read_u8(&mut self) -> Result<u8> {
        let pos = self.cursor.position();
        self.cursor.read_u8().map_err(|_| self.out_of_range(pos, 1))
    }

    /// Reads one byte at `offset` without moving the cursor.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` when `offset` is out of range.
    pub fn u8_at(&self, offset: u64) -> Result<u8> {
        let mut probe = self.clone();
        probe.seek(offset);
        probe.read_u8()
    }

    read_int!(read_u16, u16_at, u16, read_u16);
    read_int!(read_u32, u32_at, u32, read_u32);
    read_int!(read_u64, u64_at, u64, read_u64);

    /// Reads a pointer-sized word: `u64` for 64-bit images, `u32` otherwise.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` if the word extends past the data.
    pub fn read_word(&mut self, is_64: bool) -> Result<u64> {
        if is_64 {
            self.read_u64()
        } else {
            self.read_u32().map(u64::from)
        }
    }

    /// Returns `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` if the range is not fully inside the data.
    pub fn slice(&self, offset: u64, len: u64) -> Result<&'a [u8]> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = usize::try_from(offset).map_err(|_| self.out_of_range(offset, 0))?;
        let count = usize::try_from(len).map_err(|_| self.out_of_range(offset, 0))?;
        let end = start
            .checked_add(count)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| self.out_of_range(offset, count))?;
        Ok(&data[start..end])
    }

    /// Returns the bytes from `offset` up to `offset + len`, clamped to the
    /// end of the data. Empty when `offset` is past the end.
    #[must_use]
    pub fn slice_clamped(&self, offset: u64, len: u64) -> &'a [u8] {
        let data: &'a [u8] = *self.cursor.get_ref();
        let Ok(start) = usize::try_from(offset) else {
            return &[];
        };
        if start >= data.len() {
            return &[];
        }
        let end = usize::try_from(offset.saturating_add(len))
            .unwrap_or(usize::MAX)
            .min(data.len());
        &data[start..end]
    }

    /// Reads a NUL-terminated string starting at `offset`. A string that runs
    /// to the end of the data is returned as-is.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` if `offset` is past the end.
    pub fn cstr_at(&self, offset: u64) -> Result<String> {
        let data: &'a [u8] = *self.cursor.get_ref();
        let start = usize::try_from(offset)
            .ok()
            .filter(|s| *s < data.len())
            .ok_or_else(|| self.out_of_range(offset, 1))?;
        let tail = &data[start..];
        let end = tail.iter().position(|b| *b == 0).unwrap_or(tail.len());
        Ok(String::from_utf8_lossy(&tail[..end]).into_owned())
    }

    /// Decodes a fixed-width, NUL-padded name field.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Malformed` if the field is out of range.
    pub fn fixed_str_at(&self, offset: u64, width: u64) -> Result<String> {
        let raw = self.slice(offset, width)?;
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Builds a malformed-image error for this reader's format.
    pub fn error(&self, message: impl Into<String>) -> ArsenError {
        ArsenError::malformed(self.format, message)
    }

    fn out_of_range(&self, offset: u64, len: usize) -> ArsenError {
        self.error(format!(
            "read of {len} bytes at offset {offset:#x} exceeds file size {:#x}",
            self.len()
        ))
    }
}
