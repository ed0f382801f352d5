//! Literals section.
//!
//! The section header packs the literals type in bits 0-1 and a size
//! format in bits 2-3; the remaining header bits carry the regenerated
//! size and, for Huffman-coded literals, the compressed size (tree
//! description included).

use crate::copy::WILDCOPY_OVERLENGTH;
use crate::huffman::{decode_four_streams, decode_stream, parse_huffman_weights, HuffmanTable};
use tessel_core::{Error, Result};

use super::MAX_BLOCK_SIZE;

/// Literals block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsType {
    /// Stored bytes.
    Raw,
    /// One byte repeated.
    Rle,
    /// Huffman-coded with a new tree.
    Compressed,
    /// Huffman-coded with the previous block's tree.
    Treeless,
}

impl LiteralsType {
    /// Parse the 2-bit type field.
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => LiteralsType::Raw,
            1 => LiteralsType::Rle,
            2 => LiteralsType::Compressed,
            _ => LiteralsType::Treeless,
        }
    }

    fn field(self) -> u8 {
        match self {
            LiteralsType::Raw => 0,
            LiteralsType::Rle => 1,
            LiteralsType::Compressed => 2,
            LiteralsType::Treeless => 3,
        }
    }
}

/// Decoded literals header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsHeader {
    pub literals_type: LiteralsType,
    pub regenerated_size: usize,
    /// Payload size for Huffman-coded literals, tree description included.
    pub compressed_size: usize,
    pub four_streams: bool,
    pub header_size: usize,
}

impl LiteralsHeader {
    /// Parse a literals header.
    pub fn parse(src: &[u8]) -> Result<Self> {
        let first = *src
            .first()
            .ok_or_else(|| Error::corrupted("empty literals section"))?;
        let literals_type = LiteralsType::from_field(first);
        let size_format = (first >> 2) & 0x03;

        match literals_type {
            LiteralsType::Raw | LiteralsType::Rle => {
                let (regenerated_size, header_size) = match size_format {
                    0 | 2 => ((first >> 3) as usize, 1),
                    1 => {
                        let bytes = header_bytes(src, 2)?;
                        (((bytes as usize) >> 4) & 0xFFF, 2)
                    }
                    _ => {
                        let bytes = header_bytes(src, 3)?;
                        (((bytes as usize) >> 4) & 0xF_FFFF, 3)
                    }
                };
                Ok(Self {
                    literals_type,
                    regenerated_size,
                    compressed_size: 0,
                    four_streams: false,
                    header_size,
                })
            }
            LiteralsType::Compressed | LiteralsType::Treeless => {
                let (size_bits, header_size) = match size_format {
                    0 | 1 => (10, 3),
                    2 => (14, 4),
                    _ => (18, 5),
                };
                let value = header_bytes(src, header_size)?;
                let mask = (1u64 << size_bits) - 1;
                Ok(Self {
                    literals_type,
                    regenerated_size: ((value >> 4) & mask) as usize,
                    compressed_size: ((value >> (4 + size_bits)) & mask) as usize,
                    four_streams: size_format != 0,
                    header_size,
                })
            }
        }
    }
}

fn header_bytes(src: &[u8], size: usize) -> Result<u64> {
    let bytes = src
        .get(..size)
        .ok_or_else(|| Error::corrupted("truncated literals header"))?;
    Ok(bytes
        .iter()
        .rev()
        .fold(0u64, |value, &byte| (value << 8) | byte as u64))
}

/// Append a raw or RLE literals header for `size` literals.
pub fn write_raw_header(out: &mut Vec<u8>, literals_type: LiteralsType, size: usize) {
    debug_assert!(matches!(literals_type, LiteralsType::Raw | LiteralsType::Rle));
    debug_assert!(size <= 0xF_FFFF);
    let kind = literals_type.field() as u32;
    let size = size as u32;
    if size < 32 {
        out.push((kind | (size << 3)) as u8);
    } else if size < 4096 {
        let value = kind | (1 << 2) | (size << 4);
        out.extend_from_slice(&value.to_le_bytes()[..2]);
    } else {
        let value = kind | (3 << 2) | (size << 4);
        out.extend_from_slice(&value.to_le_bytes()[..3]);
    }
}

/// Append a Huffman literals header.
///
/// A single stream requires both sizes below 1024, four streams below
/// 2^18; larger sizes fail with `PreconditionViolated` and write nothing.
pub fn write_compressed_header(
    out: &mut Vec<u8>,
    literals_type: LiteralsType,
    regenerated_size: usize,
    compressed_size: usize,
    four_streams: bool,
) -> Result<()> {
    debug_assert!(matches!(
        literals_type,
        LiteralsType::Compressed | LiteralsType::Treeless
    ));
    let largest = regenerated_size.max(compressed_size);
    let (size_format, size_bits, header_size) = if !four_streams {
        if largest >= 1 << 10 {
            return Err(Error::PreconditionViolated(
                "single-stream literals must stay below 1024 bytes",
            ));
        }
        (0u64, 10, 3)
    } else if largest < 1 << 10 {
        (1, 10, 3)
    } else if largest < 1 << 14 {
        (2, 14, 4)
    } else if largest < 1 << 18 {
        (3, 18, 5)
    } else {
        return Err(Error::PreconditionViolated(
            "literals section exceeds 18-bit sizes",
        ));
    };
    let value = literals_type.field() as u64
        | (size_format << 2)
        | ((regenerated_size as u64) << 4)
        | ((compressed_size as u64) << (4 + size_bits));
    out.extend_from_slice(&value.to_le_bytes()[..header_size]);
    Ok(())
}

/// Decode a literals section into `out`.
///
/// `out` is resized to the regenerated size plus [`WILDCOPY_OVERLENGTH`]
/// bytes of slack. A new Huffman tree replaces `huffman`; treeless literals
/// require one from an earlier block. Returns the regenerated size and the
/// bytes consumed from `src`.
pub fn decode_literals(
    src: &[u8],
    huffman: &mut Option<HuffmanTable>,
    out: &mut Vec<u8>,
) -> Result<(usize, usize)> {
    let header = LiteralsHeader::parse(src)?;
    let regenerated = header.regenerated_size;
    if regenerated > MAX_BLOCK_SIZE {
        return Err(Error::corrupted(format!(
            "literals size {regenerated} exceeds block maximum"
        )));
    }

    out.clear();
    out.resize(regenerated + WILDCOPY_OVERLENGTH, 0);
    let body = &src[header.header_size..];

    let consumed = match header.literals_type {
        LiteralsType::Raw => {
            let bytes = body
                .get(..regenerated)
                .ok_or_else(|| Error::corrupted("truncated raw literals"))?;
            out[..regenerated].copy_from_slice(bytes);
            regenerated
        }
        LiteralsType::Rle => {
            let byte = *body
                .first()
                .ok_or_else(|| Error::corrupted("missing RLE literal byte"))?;
            out[..regenerated].fill(byte);
            1
        }
        LiteralsType::Compressed | LiteralsType::Treeless => {
            let payload = body
                .get(..header.compressed_size)
                .ok_or_else(|| Error::corrupted("truncated Huffman literals"))?;
            let streams = if header.literals_type == LiteralsType::Compressed {
                let (weights, description) = parse_huffman_weights(payload)?;
                *huffman = Some(HuffmanTable::from_weights(&weights)?);
                payload
                    .get(description..)
                    .ok_or_else(|| Error::corrupted("Huffman tree exceeds literals"))?
            } else {
                payload
            };
            let table = huffman
                .as_ref()
                .ok_or_else(|| Error::corrupted("treeless literals without a previous tree"))?;

            if header.four_streams {
                decode_four_streams(table, streams, &mut out[..regenerated])?;
            } else {
                decode_stream(table, streams, &mut out[..regenerated])?;
            }
            header.compressed_size
        }
    };

    Ok((regenerated, header.header_size + consumed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::huffman::HuffmanEncoder;

    #[test]
    fn test_raw_header_sizes() {
        for (size, expected_len) in [(0, 1), (31, 1), (32, 2), (4095, 2), (4096, 3), (131_072, 3)] {
            let mut out = Vec::new();
            write_raw_header(&mut out, LiteralsType::Raw, size);
            assert_eq!(out.len(), expected_len);
            let header = LiteralsHeader::parse(&out).unwrap();
            assert_eq!(header.literals_type, LiteralsType::Raw);
            assert_eq!(header.regenerated_size, size);
            assert_eq!(header.header_size, expected_len);
        }
    }

    #[test]
    fn test_compressed_header_formats() {
        let cases = [
            (200, 150, false, 3),
            (1000, 700, true, 3),
            (10_000, 6_000, true, 4),
            (131_072, 90_000, true, 5),
        ];
        for (regenerated, compressed, four, expected_len) in cases {
            let mut out = Vec::new();
            write_compressed_header(&mut out, LiteralsType::Compressed, regenerated, compressed, four).unwrap();
            assert_eq!(out.len(), expected_len);
            let header = LiteralsHeader::parse(&out).unwrap();
            assert_eq!(header.regenerated_size, regenerated);
            assert_eq!(header.compressed_size, compressed);
            assert_eq!(header.four_streams, four);
        }
    }

    #[test]
    fn test_compressed_header_rejects_oversized() {
        let mut out = Vec::new();
        let err = write_compressed_header(&mut out, LiteralsType::Compressed, 1024, 700, false)
            .unwrap_err();
        assert!(matches!(err, Error::PreconditionViolated(_)));
        assert!(write_compressed_header(&mut out, LiteralsType::Treeless, 300, 1024, false).is_err());
        assert!(write_compressed_header(&mut out, LiteralsType::Compressed, 1 << 18, 10, true).is_err());
        assert!(out.is_empty());

        write_compressed_header(&mut out, LiteralsType::Compressed, 1023, 1023, false).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_decode_rle_literals() {
        let mut src = Vec::new();
        write_raw_header(&mut src, LiteralsType::Rle, 100);
        src.push(b'z');
        let mut out = Vec::new();
        let mut huffman = None;
        let (size, consumed) = decode_literals(&src, &mut huffman, &mut out).unwrap();
        assert_eq!((size, consumed), (100, 3));
        assert!(out[..100].iter().all(|&b| b == b'z'));
        assert_eq!(out.len(), 100 + WILDCOPY_OVERLENGTH);
    }

    #[test]
    fn test_decode_huffman_then_treeless() {
        let data: Vec<u8> = b"abracadabra alakazam ".iter().cycle().take(300).copied().collect();
        let mut counts = [0u32; 256];
        for &b in &data {
            counts[b as usize] += 1;
        }
        let encoder = HuffmanEncoder::build(&counts).unwrap();
        let description = encoder.write_description().unwrap();
        let streams = encoder.encode_four_streams(&data).unwrap();

        let mut src = Vec::new();
        write_compressed_header(
            &mut src,
            LiteralsType::Compressed,
            data.len(),
            description.len() + streams.len(),
            true,
        )
        .unwrap();
        src.extend_from_slice(&description);
        src.extend_from_slice(&streams);

        let mut huffman = None;
        let mut out = Vec::new();
        let (size, consumed) = decode_literals(&src, &mut huffman, &mut out).unwrap();
        assert_eq!(consumed, src.len());
        assert_eq!(&out[..size], &data[..]);

        let mut treeless = Vec::new();
        write_compressed_header(&mut treeless, LiteralsType::Treeless, data.len(), streams.len(), true)
            .unwrap();
        treeless.extend_from_slice(&streams);
        let (size, _) = decode_literals(&treeless, &mut huffman, &mut out).unwrap();
        assert_eq!(&out[..size], &data[..]);
    }

    #[test]
    fn test_treeless_without_tree_fails() {
        let mut src = Vec::new();
        write_compressed_header(&mut src, LiteralsType::Treeless, 10, 4, false).unwrap();
        src.extend_from_slice(&[1, 2, 3, 4]);
        let mut out = Vec::new();
        assert!(decode_literals(&src, &mut None, &mut out).is_err());
    }

    #[test]
    fn test_truncated_raw_literals_fail() {
        let mut src = Vec::new();
        write_raw_header(&mut src, LiteralsType::Raw, 20);
        src.extend_from_slice(&[0u8; 10]);
        let mut out = Vec::new();
        assert!(decode_literals(&src, &mut None, &mut out).is_err());
    }
}
