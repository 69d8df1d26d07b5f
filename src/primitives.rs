//! Primitive value codecs shared by the tight and loose marshalling drivers.
//!
//! Every multi-byte integer on the wire is big-endian. Writers append to a
//! [`BytesMut`]; readers pull from a bounds-checked [`ByteReader`] that fails
//! with [`Error::BufferTooSmall`] instead of reading past the supplied
//! buffer.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};

/// Two-byte length value that switches a string to its long (4-byte length)
/// form.
pub const LONG_STRING_MARKER: u16 = 0xFFFF;

/// Bounds-checked cursor over a borrowed byte slice.
///
/// This is the byte-source abstraction the whole decode path runs on: read
/// exactly N bytes or fail, never silently truncate.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over a byte slice.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Whether the reader is exhausted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Current offset into the underlying slice.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Consume exactly `len` bytes.
    pub fn read_exact(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::BufferTooSmall {
                needed: len,
                got: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Consume a single byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_exact(1)?[0])
    }

    /// Consume a big-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.read_exact(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Consume a big-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.read_exact(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Consume a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_exact(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Consume a big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_exact(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Consume a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        let bytes = self.read_exact(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }
}

/// Number of bytes a tagged variable-width long occupies, marker included.
#[must_use]
pub const fn varlong_size(value: u64) -> usize {
    1 + significant_bytes(value)
}

const fn significant_bytes(value: u64) -> usize {
    ((64 - value.leading_zeros() as usize) + 7) / 8
}

/// Write a tagged variable-width long: one marker byte holding the count of
/// value bytes (0..=8), then that many low-order big-endian bytes.
///
/// Signed longs go through their `u64` bit pattern, so negative values always
/// take the full eight bytes and still round-trip exactly.
pub fn write_varlong(out: &mut BytesMut, value: u64) {
    let len = significant_bytes(value);
    out.put_u8(len as u8);
    out.put_slice(&value.to_be_bytes()[8 - len..]);
}

/// Read a tagged variable-width long.
pub fn read_varlong(reader: &mut ByteReader<'_>) -> Result<u64> {
    let marker = reader.read_u8()?;
    if marker > 8 {
        return Err(Error::InvalidVarlongMarker { marker });
    }
    let mut value = 0u64;
    for byte in reader.read_exact(marker as usize)? {
        value = (value << 8) | u64::from(*byte);
    }
    Ok(value)
}

/// Number of bytes a non-null string occupies on the wire.
#[must_use]
pub fn str_size(value: &str) -> usize {
    let len = value.len();
    if len < LONG_STRING_MARKER as usize {
        2 + len
    } else {
        2 + 4 + len
    }
}

/// Write a non-null UTF-8 string.
///
/// Short form is `[u16 len][bytes]`; when the encoded length no longer fits
/// below [`LONG_STRING_MARKER`], the marker itself is written as the two-byte
/// length followed by a real `u32` length.
pub fn write_str(out: &mut BytesMut, value: &str) {
    let bytes = value.as_bytes();
    if bytes.len() < LONG_STRING_MARKER as usize {
        out.put_u16(bytes.len() as u16);
    } else {
        out.put_u16(LONG_STRING_MARKER);
        out.put_u32(bytes.len() as u32);
    }
    out.put_slice(bytes);
}

/// Read a non-null UTF-8 string in either the short or long form.
pub fn read_str(reader: &mut ByteReader<'_>) -> Result<String> {
    let short_len = reader.read_u16()?;
    let len = if short_len == LONG_STRING_MARKER {
        reader.read_u32()? as usize
    } else {
        short_len as usize
    };
    let bytes = reader.read_exact(len)?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn varlong_roundtrip(value: u64) -> (u64, usize) {
        let mut out = BytesMut::new();
        write_varlong(&mut out, value);
        let written = out.len();
        let mut reader = ByteReader::new(&out);
        let decoded = read_varlong(&mut reader).unwrap();
        assert!(reader.is_empty());
        (decoded, written)
    }

    #[test]
    fn test_varlong_edge_values() {
        assert_eq!(varlong_roundtrip(0), (0, 1));
        assert_eq!(varlong_roundtrip(1), (1, 2));
        assert_eq!(varlong_roundtrip(255), (255, 2));
        assert_eq!(varlong_roundtrip(256), (256, 3));
        assert_eq!(varlong_roundtrip(0xFFFF), (0xFFFF, 3));
        assert_eq!(varlong_roundtrip(0x0001_0000), (0x0001_0000, 4));
        assert_eq!(varlong_roundtrip(u64::MAX), (u64::MAX, 9));
    }

    #[test]
    fn test_varlong_negative_long_uses_eight_bytes() {
        let value = -42i64;
        let (decoded, written) = varlong_roundtrip(value as u64);
        assert_eq!(decoded as i64, value);
        assert_eq!(written, 9);
    }

    #[test]
    fn test_varlong_size_matches_written_bytes() {
        for value in [0, 1, 127, 128, 300, 70_000, u64::from(u32::MAX), u64::MAX] {
            let mut out = BytesMut::new();
            write_varlong(&mut out, value);
            assert_eq!(out.len(), varlong_size(value));
        }
    }

    #[test]
    fn test_varlong_invalid_marker() {
        let mut reader = ByteReader::new(&[9, 0, 0]);
        let result = read_varlong(&mut reader);
        assert!(matches!(
            result,
            Err(Error::InvalidVarlongMarker { marker: 9 })
        ));
    }

    #[test]
    fn test_varlong_truncated_body() {
        let mut reader = ByteReader::new(&[4, 1, 2]);
        let result = read_varlong(&mut reader);
        assert!(matches!(result, Err(Error::BufferTooSmall { .. })));
    }

    #[test]
    fn test_short_string_roundtrip() {
        let mut out = BytesMut::new();
        write_str(&mut out, "queue://orders");
        assert_eq!(out.len(), 2 + 14);

        let mut reader = ByteReader::new(&out);
        assert_eq!(read_str(&mut reader).unwrap(), "queue://orders");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_long_string_roundtrip() {
        let value = "x".repeat(70_000);
        let mut out = BytesMut::new();
        write_str(&mut out, &value);
        // Marker + u32 length form.
        assert_eq!(out.len(), 2 + 4 + 70_000);
        assert_eq!(out[0], 0xFF);
        assert_eq!(out[1], 0xFF);

        let mut reader = ByteReader::new(&out);
        assert_eq!(read_str(&mut reader).unwrap(), value);
    }

    #[test]
    fn test_string_length_past_buffer_rejected() {
        // Declares 100 bytes but supplies 3.
        let mut out = BytesMut::new();
        out.put_u16(100);
        out.put_slice(b"abc");

        let mut reader = ByteReader::new(&out);
        let result = read_str(&mut reader);
        assert!(matches!(
            result,
            Err(Error::BufferTooSmall { needed: 100, got: 3 })
        ));
    }

    #[test]
    fn test_string_invalid_utf8_rejected() {
        let mut out = BytesMut::new();
        out.put_u16(2);
        out.put_slice(&[0xC3, 0x28]);

        let mut reader = ByteReader::new(&out);
        assert!(matches!(read_str(&mut reader), Err(Error::InvalidUtf8(_))));
    }

    #[test]
    fn test_reader_bounds() {
        let mut reader = ByteReader::new(&[1, 2, 3]);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.remaining(), 1);
        assert!(matches!(
            reader.read_u32(),
            Err(Error::BufferTooSmall { needed: 4, got: 1 })
        ));
        assert_eq!(reader.read_u8().unwrap(), 3);
        assert!(reader.is_empty());
    }
}
