//! Record reader for the BIFF8 stream of Excel 97-2003 (`.xls`) workbooks.
//! Records longer than 8224 bytes are split into CONTINUE records; the reader
//! presents a record and its continuations as one logical payload.

use crate::error::ClippingsError;
use crate::helpers::bytes::to_f64;
use crate::helpers::bytes::to_u16;
use crate::helpers::bytes::to_u32;
use crate::helpers::bytes::to_u64;
use crate::helpers::bytes::to_usize;
use encoding_rs::Encoding;
use encoding_rs::UTF_16BE;
use encoding_rs::UTF_16LE;
use thiserror::Error;

const CONTINUE: u16 = 60;

#[derive(Error, Debug)]
pub enum Biff8Error {
    #[error("Fewer than {0} bytes remaining")]
    NoEnoughDataError(usize),
}

pub(crate) struct Biff8Reader {
    /// Encoding of compressed (8-bit) strings, taken from the CODEPAGE record
    pub(crate) encoding: &'static Encoding,
    buffer: Vec<u8>,
    pointer: usize, // Start of the next record
    chunks: Vec<(usize, usize)>, // Payload ranges of the current record and its continuations
    index: usize,  // Current chunk
    offset: usize, // Read position inside the current chunk
}

impl Biff8Reader {
    pub(crate) fn new(data: Vec<u8>) -> Biff8Reader {
        Biff8Reader {
            encoding: encoding_rs::WINDOWS_1252,
            buffer: data,
            pointer: 0,
            chunks: Vec::new(),
            index: 0,
            offset: 0,
        }
    }

    /// Advances to the next record and returns its type, or `None` at the end of the stream.
    pub(crate) fn next(&mut self) -> Result<Option<u16>, ClippingsError> {
        if self.pointer + 4 > self.buffer.len() {
            return Ok(None);
        }
        self.index = 0;
        self.offset = 0;
        self.chunks.clear();

        let kind = self.get_u16_at(self.pointer)?;
        self.push_chunk()?;
        while self.pointer + 4 <= self.buffer.len() && self.get_u16_at(self.pointer)? == CONTINUE {
            self.push_chunk()?;
        }
        Ok(Some(kind))
    }

    fn push_chunk(&mut self) -> Result<(), ClippingsError> {
        let size = self.get_u16_at(self.pointer + 2)? as usize;
        let lower = self.pointer + 4;
        let upper = (lower + size).min(self.buffer.len());
        self.pointer = lower + size;
        self.chunks.push((lower, upper));
        Ok(())
    }

    /// Type of the record after the current one, without moving.
    pub(crate) fn peek(&self) -> Option<u16> {
        self.get_u16_at(self.pointer).ok()
    }

    /// Moves to an absolute stream position, as given by BOUNDSHEET8 records.
    pub(crate) fn goto(&mut self, pointer: usize) {
        self.pointer = pointer;
        self.chunks.clear();
    }

    /// Reads up to `length` bytes without crossing into the next continuation.
    fn read(&mut self, length: usize) -> &[u8] {
        if let Some((lower, upper)) = self.chunks.get(self.index).copied() {
            let source = upper.min(lower + self.offset);
            let target = upper.min(source + length);
            if target == upper {
                self.index += 1;
                self.offset = 0;
            } else {
                self.offset += target - source;
            }
            return &self.buffer[source..target];
        }
        &[]
    }

    fn read_exact(&mut self, length: usize) -> Result<&[u8], ClippingsError> {
        let (index, offset) = (self.index, self.offset);
        if self.read(length).len() == length {
            // Re-slice so the returned borrow is independent of the lookahead above
            let (lower, _) = self.chunks[index];
            let source = lower + offset;
            Ok(&self.buffer[source..source + length])
        } else {
            Err(Biff8Error::NoEnoughDataError(length))?
        }
    }

    /// Skips `length` bytes, crossing continuation boundaries if needed.
    pub(crate) fn skip(&mut self, length: usize) -> Result<(), ClippingsError> {
        let mut remaining = length;
        while remaining > 0 {
            let size = self.read(remaining).len();
            if size == 0 {
                Err(Biff8Error::NoEnoughDataError(remaining))?
            }
            remaining -= size;
        }
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ClippingsError> {
        self.read_exact(1).map(|data| data[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ClippingsError> {
        self.read_exact(2).map(to_u16)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, ClippingsError> {
        self.read_exact(4).map(to_u32)
    }

    pub(crate) fn read_usize(&mut self) -> Result<usize, ClippingsError> {
        self.read_exact(4).map(to_usize)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, ClippingsError> {
        self.read_exact(8).map(to_u64)
    }

    pub(crate) fn read_f64(&mut self) -> Result<f64, ClippingsError> {
        self.read_exact(8).map(to_f64)
    }

    /// Reads the u16 located `offset` bytes before the end of the record (MULRK stores its last column there).
    pub(crate) fn get_u16_back(&self, offset: usize) -> Result<u16, ClippingsError> {
        let mut offset = offset;
        for (lower, upper) in self.chunks.iter().rev() {
            if *lower + offset <= *upper {
                return self.get_u16_at(*upper - offset);
            }
            offset -= *upper - *lower;
        }
        Err(Biff8Error::NoEnoughDataError(2))?
    }

    fn get_u16_at(&self, index: usize) -> Result<u16, ClippingsError> {
        if index + 2 <= self.buffer.len() {
            Ok(to_u16(&self.buffer[index..index + 2]))
        } else {
            Err(Biff8Error::NoEnoughDataError(2))?
        }
    }

    /// Decodes an RK value: a 30-bit integer or the high 30 bits of a double, optionally divided by 100.
    pub(crate) fn read_rk_number(&mut self) -> Result<String, ClippingsError> {
        let value = self.read_u32()?;
        let is_percentage = (value & 0x01) != 0;
        let is_integer = (value & 0x02) != 0;

        let number = if is_integer {
            ((value as i32) >> 2) as f64
        } else {
            f64::from_bits(((value & 0xFFFF_FFFC) as u64) << 32)
        };
        Ok(if is_percentage {
            (number / 100.0).to_string()
        } else {
            number.to_string()
        })
    }

    /// ShortXLUnicodeString: 1-byte character count.
    pub(crate) fn read_short_xl_unicode_string(&mut self) -> Result<String, ClippingsError> {
        let chars = self.read_u8()? as usize;
        self.read_unicode_string(chars, false)
    }

    /// XLUnicodeString: 2-byte character count.
    pub(crate) fn read_xl_unicode_string(&mut self) -> Result<String, ClippingsError> {
        let chars = self.read_u16()? as usize;
        self.read_unicode_string(chars, false)
    }

    /// XLUnicodeRichExtendedString, the shared string table entry.
    pub(crate) fn read_xl_unicode_rich_extended_string(&mut self) -> Result<String, ClippingsError> {
        let chars = self.read_u16()? as usize;
        self.read_unicode_string(chars, true)
    }

    /// Reads `chars` characters. When the characters run into a CONTINUE record,
    /// the continuation starts with a fresh option byte that may switch the width.
    fn read_unicode_string(&mut self, chars: usize, is_extended: bool) -> Result<String, ClippingsError> {
        let flag = self.read_u8()?;
        let rich_runs = if is_extended && (flag & 0x8) != 0 {
            self.read_u16()? as usize
        } else {
            0
        };
        let phonetic_size = if is_extended && (flag & 0x4) != 0 {
            self.read_usize()?
        } else {
            0
        };

        let encoding = self.encoding;
        let mut is_high_byte = (flag & 0x1) != 0;
        let mut remaining = chars;
        let mut content = String::new();
        while remaining > 0 {
            let bytes = self.read(chars_to_bytes(is_high_byte, remaining));
            if bytes.is_empty() {
                Err(Biff8Error::NoEnoughDataError(chars_to_bytes(is_high_byte, remaining)))?
            }
            let read = bytes_to_chars(is_high_byte, bytes.len());
            decode_into(encoding, is_high_byte, bytes, &mut content);
            remaining = remaining.saturating_sub(read);
            if remaining > 0 {
                is_high_byte = (self.read_u8()? & 0x1) != 0;
            }
        }

        self.skip(4 * rich_runs)?;
        self.skip(phonetic_size)?;
        Ok(content)
    }
}

#[inline]
fn chars_to_bytes(is_high_byte: bool, chars: usize) -> usize {
    if is_high_byte { chars << 1 } else { chars }
}

#[inline]
fn bytes_to_chars(is_high_byte: bool, bytes: usize) -> usize {
    if is_high_byte { bytes >> 1 } else { bytes }
}

/// Uncompressed strings are UTF-16LE. Compressed strings drop the high byte,
/// which makes them Latin-1 unless the workbook declares an 8-bit code page.
fn decode_into(encoding: &'static Encoding, is_high_byte: bool, bytes: &[u8], content: &mut String) {
    if is_high_byte {
        let (string, _, _) = UTF_16LE.decode(bytes);
        content.push_str(&string);
    } else if encoding == UTF_16LE || encoding == UTF_16BE {
        content.extend(bytes.iter().map(|byte| char::from(*byte)));
    } else {
        let (string, _, _) = encoding.decode(bytes);
        content.push_str(&string);
    }
}

#[macro_export]
macro_rules! match_biff8_record {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(kind) = $reader.next()? {
            match kind {
                $($arms)*
                _ => (),
            }
        }
    };
}
