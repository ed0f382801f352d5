//! Block layer.
//!
//! Every block starts with a 3-byte little-endian header: bit 0 flags the
//! last block, bits 1-2 hold the block type and the upper 21 bits the block
//! size. A compressed block holds a literals section followed by a
//! sequences section; executing the sequences against the literals and the
//! output produced so far regenerates the block.
//!
//! ## References
//!
//! - [RFC 8878 Section 3.1.1.2](https://datatracker.ietf.org/doc/html/rfc8878#section-3.1.1.2)

mod literals;
mod sequences;

pub use literals::{
    decode_literals, write_compressed_header, write_raw_header, LiteralsHeader, LiteralsType,
};
pub use sequences::{
    decode_sequences, modes_byte, parse_sequence_count, write_sequence_count, Sequence,
    SequenceMode, SequenceTables, LONG_NB_SEQ,
};

use crate::copy::{copy_match, wildcopy, WILDCOPY_OVERLENGTH};
use crate::huffman::HuffmanTable;
use crate::sequence::RepeatOffsets;
use tessel_core::{Error, Result};

/// Largest amount of data a single block may regenerate.
pub const MAX_BLOCK_SIZE: usize = 1 << 17;

/// Size of a block header.
pub const BLOCK_HEADER_SIZE: usize = 3;

/// Block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Raw,
    Rle,
    Compressed,
}

impl BlockType {
    /// Parse the 2-bit type field; the fourth value is reserved.
    pub fn from_field(field: u8) -> Result<Self> {
        match field & 0x03 {
            0 => Ok(BlockType::Raw),
            1 => Ok(BlockType::Rle),
            2 => Ok(BlockType::Compressed),
            _ => Err(Error::corrupted("reserved block type")),
        }
    }

    fn field(self) -> u32 {
        match self {
            BlockType::Raw => 0,
            BlockType::Rle => 1,
            BlockType::Compressed => 2,
        }
    }
}

/// Parsed block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub last: bool,
    pub block_type: BlockType,
    /// Regenerated size for raw and RLE blocks, payload size for compressed ones.
    pub size: usize,
}

impl BlockHeader {
    /// Parse and validate a block header.
    pub fn parse(src: &[u8]) -> Result<Self> {
        let bytes = src
            .get(..BLOCK_HEADER_SIZE)
            .ok_or_else(|| Error::corrupted("truncated block header"))?;
        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        let header = Self {
            last: value & 1 == 1,
            block_type: BlockType::from_field((value >> 1) as u8)?,
            size: (value >> 3) as usize,
        };
        if header.size > MAX_BLOCK_SIZE {
            return Err(Error::corrupted(format!(
                "block size {} exceeds maximum {MAX_BLOCK_SIZE}",
                header.size
            )));
        }
        Ok(header)
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let value = u32::from(self.last) | (self.block_type.field() << 1) | ((self.size as u32) << 3);
        let bytes = value.to_le_bytes();
        [bytes[0], bytes[1], bytes[2]]
    }

    /// Bytes following the header that belong to this block.
    pub fn content_size(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            BlockType::Raw | BlockType::Compressed => self.size,
        }
    }
}

/// Decoder state for compressed blocks.
///
/// Literal and sequence buffers are reused between blocks; the Huffman
/// tree, sequence tables and repeat offsets carry over from one block to
/// the next within a call.
#[derive(Debug, Default)]
pub struct BlockDecoder {
    literals: Vec<u8>,
    sequences: Vec<Sequence>,
    huffman: Option<HuffmanTable>,
    tables: SequenceTables,
    reps: RepeatOffsets,
}

impl BlockDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the entropy state and reseed the repeat offsets.
    pub fn reset(&mut self) {
        self.literals.clear();
        self.sequences.clear();
        self.huffman = None;
        self.tables.reset();
        self.reps = RepeatOffsets::new();
    }

    /// Number of sequences in the last decoded block.
    pub fn last_sequence_count(&self) -> usize {
        self.sequences.len()
    }

    /// Decode one compressed block, writing at `dst[pos..]`.
    ///
    /// `dst[..pos]` is the output produced so far and the only data matches
    /// may reference. Returns the number of bytes regenerated.
    pub fn decode_compressed(&mut self, src: &[u8], dst: &mut [u8], pos: usize) -> Result<usize> {
        let (literal_count, consumed) = decode_literals(src, &mut self.huffman, &mut self.literals)?;
        decode_sequences(
            &src[consumed..],
            &mut self.tables,
            &mut self.reps,
            &mut self.sequences,
        )?;
        execute_sequences(
            &self.literals,
            literal_count,
            &self.sequences,
            dst,
            pos,
        )
    }
}

/// Replay sequences into `dst` starting at `pos`.
///
/// `literals` holds `literal_count` bytes followed by
/// [`WILDCOPY_OVERLENGTH`] bytes of slack.
pub fn execute_sequences(
    literals: &[u8],
    literal_count: usize,
    sequences: &[Sequence],
    dst: &mut [u8],
    pos: usize,
) -> Result<usize> {
    let block_end = pos + MAX_BLOCK_SIZE;
    let mut op = pos;
    let mut lit_pos = 0usize;

    let reserve = |end: usize, dst_len: usize| -> Result<()> {
        if end > block_end {
            return Err(Error::corrupted("block regenerates more than 128 KiB"));
        }
        if end > dst_len {
            return Err(Error::destination_too_small(end, dst_len));
        }
        Ok(())
    };

    for seq in sequences {
        let lit_length = seq.lit_length as usize;
        if lit_pos + lit_length > literal_count {
            return Err(Error::corrupted("literal length exceeds available literals"));
        }
        let end = op + lit_length;
        reserve(end, dst.len())?;
        if lit_length > 0 {
            if end + WILDCOPY_OVERLENGTH <= dst.len()
                && lit_pos + lit_length + WILDCOPY_OVERLENGTH <= literals.len()
            {
                wildcopy(&mut dst[op..], &literals[lit_pos..], lit_length);
            } else {
                dst[op..end].copy_from_slice(&literals[lit_pos..lit_pos + lit_length]);
            }
        }
        lit_pos += lit_length;
        op = end;

        let offset = seq.offset as usize;
        if offset > op {
            return Err(Error::corrupted(format!(
                "match offset {offset} reaches before the start of output ({op} bytes)"
            )));
        }
        let match_length = seq.match_length as usize;
        let end = op + match_length;
        reserve(end, dst.len())?;
        copy_match(dst, op, offset, match_length);
        op = end;
    }

    let rest = literal_count - lit_pos;
    let end = op + rest;
    reserve(end, dst.len())?;
    dst[op..end].copy_from_slice(&literals[lit_pos..literal_count]);
    Ok(end - pos)
}
