//! Bit-packing buffer for tight-mode marshalling.
//!
//! All boolean field values and is-present flags emitted while marshalling
//! one top-level command land in a single stream, serialized as a dense byte
//! run immediately before the command's literal field bytes. Nested
//! structures share the top-level stream. The two-pass tight protocol
//! guarantees that bits are read back in exactly the order they were
//! written.

use bytes::{BufMut, BytesMut};

use crate::error::{Error, Result};
use crate::primitives::{ByteReader, read_varlong, varlong_size, write_varlong};

/// Ephemeral per-command bit buffer.
#[derive(Debug, Default)]
pub struct BooleanStream {
    data: Vec<u8>,
    /// Bits written so far.
    write_pos: usize,
    /// Bits consumed so far.
    read_pos: usize,
}

impl BooleanStream {
    /// Create an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one bit.
    pub fn write_bool(&mut self, value: bool) {
        let byte = self.write_pos / 8;
        let bit = self.write_pos % 8;
        if bit == 0 {
            self.data.push(0);
        }
        if value {
            self.data[byte] |= 1 << bit;
        }
        self.write_pos += 1;
    }

    /// Consume the next bit.
    ///
    /// Reading past the stream's declared bit count is a structural decode
    /// error, never a silent default.
    pub fn read_bool(&mut self) -> Result<bool> {
        let limit = self.data.len() * 8;
        if self.read_pos >= limit {
            return Err(Error::BooleanStreamUnderrun { limit });
        }
        let byte = self.data[self.read_pos / 8];
        let bit = self.read_pos % 8;
        self.read_pos += 1;
        Ok(byte & (1 << bit) != 0)
    }

    /// Rewind the read cursor to the first bit.
    ///
    /// Tight pass 2 replays the bits pass 1 wrote; the driver rewinds between
    /// the passes.
    pub fn reset_read(&mut self) {
        self.read_pos = 0;
    }

    /// Bits written so far.
    #[must_use]
    pub const fn bit_len(&self) -> usize {
        self.write_pos
    }

    /// Whether no bits have been written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.write_pos == 0
    }

    /// Serialized size: variable-width length prefix plus the packed bytes.
    #[must_use]
    pub fn marshalled_size(&self) -> usize {
        varlong_size(self.data.len() as u64) + self.data.len()
    }

    /// Write the length prefix and packed bytes to the output.
    pub fn marshal(&self, out: &mut BytesMut) {
        write_varlong(out, self.data.len() as u64);
        out.put_slice(&self.data);
    }

    /// Read a stream back: length prefix, then that many packed bytes.
    pub fn unmarshal(reader: &mut ByteReader<'_>) -> Result<Self> {
        let len = read_varlong(reader)? as usize;
        let data = reader.read_exact(len)?.to_vec();
        Ok(Self {
            write_pos: len * 8,
            read_pos: 0,
            data,
        })
    }
}
