//! Bit streams used by the FSE and Huffman coders.
//!
//! Entropy-coded streams are written forward, least significant bit first,
//! and terminated by a single `1` marker bit. Decoders start at the marker
//! and read backward, so the last value written is the first value read.

use crate::bits::highbit32;
use tessel_core::{Error, Result};

/// Forward bit writer with a 64-bit accumulator.
#[derive(Debug, Default)]
pub struct BitWriter {
    buffer: Vec<u8>,
    container: u64,
    bit_count: u32,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with preallocated capacity in bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Append the low `nb_bits` of `value` (at most 32 bits).
    #[inline]
    pub fn add_bits(&mut self, value: u64, nb_bits: u32) {
        debug_assert!(nb_bits <= 32);
        if nb_bits == 0 {
            return;
        }
        let masked = value & ((1u64 << nb_bits) - 1);
        self.container |= masked << self.bit_count;
        self.bit_count += nb_bits;
        self.flush();
    }

    #[inline]
    fn flush(&mut self) {
        while self.bit_count >= 8 {
            self.buffer.push(self.container as u8);
            self.container >>= 8;
            self.bit_count -= 8;
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buffer.len() * 8 + self.bit_count as usize
    }

    /// Append the end marker, pad to a byte boundary and return the stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.add_bits(1, 1);
        if self.bit_count > 0 {
            self.buffer.push(self.container as u8);
        }
        self.buffer
    }

    /// Return the raw bytes without an end marker, zero-padding the last byte.
    ///
    /// Used for FSE table descriptions, which are read forward.
    pub fn finish_unmarked(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.buffer.push(self.container as u8);
        }
        self.buffer
    }
}

/// Reader over a marker-terminated stream, consuming bits from the end.
#[derive(Debug, Clone)]
pub struct BackwardBitReader<'a> {
    data: &'a [u8],
    /// Bits still unread; goes negative once reads run past the beginning.
    remaining: isize,
}

impl<'a> BackwardBitReader<'a> {
    /// Open a stream, locating the end marker in its last byte.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let last = *data
            .last()
            .ok_or_else(|| Error::corrupted("empty bitstream"))?;
        if last == 0 {
            return Err(Error::corrupted("bitstream end marker missing"));
        }
        let padding = 8 - highbit32(last as u32) as isize;
        Ok(Self {
            data,
            remaining: data.len() as isize * 8 - padding,
        })
    }

    /// Fetch `nb_bits` bits whose lowest bit sits at `start`; bits before
    /// the stream start read as zero.
    #[inline]
    fn fetch(&self, start: isize, nb_bits: u32) -> u64 {
        if start < 0 {
            let visible = nb_bits as isize + start;
            if visible <= 0 {
                return 0;
            }
            return self.fetch(0, visible as u32) << (-start) as u32;
        }
        let byte = (start / 8) as usize;
        let shift = (start % 8) as u32;
        let mut bytes = [0u8; 8];
        let available = self.data.len().saturating_sub(byte).min(8);
        bytes[..available].copy_from_slice(&self.data[byte..byte + available]);
        (u64::from_le_bytes(bytes) >> shift) & ((1u64 << nb_bits) - 1)
    }

    /// Read `nb_bits` (at most 32) as an unsigned value.
    #[inline]
    pub fn read_bits(&mut self, nb_bits: u32) -> u64 {
        debug_assert!(nb_bits <= 32);
        if nb_bits == 0 {
            return 0;
        }
        self.remaining -= nb_bits as isize;
        self.fetch(self.remaining, nb_bits)
    }

    /// Look at the next `nb_bits` without consuming them.
    #[inline]
    pub fn peek_bits(&self, nb_bits: u32) -> u64 {
        if nb_bits == 0 {
            return 0;
        }
        self.fetch(self.remaining - nb_bits as isize, nb_bits)
    }

    /// Consume bits previously peeked.
    #[inline]
    pub fn skip_bits(&mut self, nb_bits: u32) {
        self.remaining -= nb_bits as isize;
    }

    /// Bits left before the stream start (negative after an overread).
    pub fn remaining(&self) -> isize {
        self.remaining
    }

    /// Whether every bit has been consumed exactly.
    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    /// Whether a read ran past the stream start.
    pub fn is_overflowed(&self) -> bool {
        self.remaining < 0
    }
}

/// Forward little-endian bit reader for table descriptions.
#[derive(Debug, Clone)]
pub struct ForwardBitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ForwardBitReader<'a> {
    /// Start reading at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Read `nb_bits` (at most 32), failing when the input is exhausted.
    pub fn read_bits(&mut self, nb_bits: u32) -> Result<u32> {
        debug_assert!(nb_bits <= 32);
        if self.position + nb_bits as usize > self.data.len() * 8 {
            return Err(Error::corrupted_at(
                "truncated table description",
                self.position / 8,
            ));
        }
        let value = self.peek_bits(nb_bits);
        self.position += nb_bits as usize;
        Ok(value)
    }

    /// Look at up to 32 upcoming bits, zero-filled past the end.
    pub fn peek_bits(&self, nb_bits: u32) -> u32 {
        if nb_bits == 0 {
            return 0;
        }
        let byte = self.position / 8;
        let shift = (self.position % 8) as u32;
        let mut bytes = [0u8; 8];
        let available = self.data.len().saturating_sub(byte).min(8);
        if available > 0 {
            bytes[..available].copy_from_slice(&self.data[byte..byte + available]);
        }
        ((u64::from_le_bytes(bytes) >> shift) & ((1u64 << nb_bits) - 1)) as u32
    }

    /// Number of whole bytes touched so far.
    pub fn bytes_consumed(&self) -> usize {
        self.position.div_ceil(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backward_reads_reverse_order() {
        let mut writer = BitWriter::new();
        writer.add_bits(0b101, 3);
        writer.add_bits(0x1234, 16);
        writer.add_bits(1, 1);
        writer.add_bits(0x7FFF_FFFF, 31);
        let stream = writer.finish();

        let mut reader = BackwardBitReader::new(&stream).unwrap();
        assert_eq!(reader.read_bits(31), 0x7FFF_FFFF);
        assert_eq!(reader.read_bits(1), 1);
        assert_eq!(reader.read_bits(16), 0x1234);
        assert_eq!(reader.read_bits(3), 0b101);
        assert!(reader.is_finished());
    }

    #[test]
    fn test_overread_yields_zeros() {
        let mut writer = BitWriter::new();
        writer.add_bits(0b11, 2);
        let stream = writer.finish();

        let mut reader = BackwardBitReader::new(&stream).unwrap();
        assert_eq!(reader.peek_bits(4), 0b1100);
        assert_eq!(reader.read_bits(4), 0b1100);
        assert!(reader.is_overflowed());
    }

    #[test]
    fn test_missing_end_marker_rejected() {
        assert!(BackwardBitReader::new(&[0x12, 0x00]).is_err());
        assert!(BackwardBitReader::new(&[]).is_err());
    }

    #[test]
    fn test_forward_reader() {
        let mut writer = BitWriter::new();
        writer.add_bits(0xA, 4);
        writer.add_bits(0x155, 9);
        let bytes = writer.finish_unmarked();

        let mut reader = ForwardBitReader::new(&bytes);
        assert_eq!(reader.read_bits(4).unwrap(), 0xA);
        assert_eq!(reader.read_bits(9).unwrap(), 0x155);
        assert_eq!(reader.bytes_consumed(), 2);
        assert!(reader.read_bits(8).is_err());
    }
}
