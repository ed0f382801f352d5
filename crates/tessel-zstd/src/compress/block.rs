//! Block-level encoding: the literals and sequences sections of a
//! compressed block.
//!
//! ## Parallel Encoding
//!
//! When the `parallel` feature is enabled, 4-stream Huffman encoding
//! compresses the four literal segments on the rayon pool.

use tracing::trace;

use super::sequences::{SequenceEncoder, SequenceEntropy};
use crate::block::{write_compressed_header, write_raw_header, LiteralsType};
use crate::huffman::HuffmanEncoder;
use crate::sequence::SequenceStore;
use tessel_core::Result;

/// Literals shorter than this are stored raw unless a previous tree exists.
const MIN_LITERALS_FOR_HUFFMAN: usize = 64;

/// With a reusable tree, even short literal runs can pay off.
const MIN_LITERALS_FOR_TREELESS: usize = 8;

/// Single-stream Huffman literals stay below this length.
const SINGLE_STREAM_LIMIT: usize = 256;

/// Entropy tables the decoder will hold after the blocks emitted so far.
///
/// Cloned before each block so a raw fallback can restore it.
#[derive(Debug, Clone, Default)]
pub struct EntropyState {
    huffman: Option<HuffmanEncoder>,
    sequences: SequenceEntropy,
}

impl EntropyState {
    /// Forget every table.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Encoder for the body of compressed blocks.
#[derive(Debug, Default)]
pub struct BlockEncoder {
    sequences: SequenceEncoder,
}

impl BlockEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the literals and sequences sections of `store` to `out`.
    pub fn encode(
        &mut self,
        store: &SequenceStore,
        entropy: &mut EntropyState,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let literals_type = encode_literals(store.literals(), &mut entropy.huffman, out)?;
        trace!(
            literals = store.literals().len(),
            literals_type = ?literals_type,
            "encoded literals"
        );
        self.sequences.encode(store, &mut entropy.sequences, out)
    }
}

/// Encode the literals section, returning the representation chosen.
///
/// Tries a fresh Huffman tree and the previous block's tree, keeps the
/// cheaper one and falls back to raw literals when neither is smaller.
/// `huffman` is replaced when a new tree is written. Single-stream bodies
/// hold fewer than `SINGLE_STREAM_LIMIT` literals and stay below 1024 bytes.
pub fn encode_literals(
    literals: &[u8],
    huffman: &mut Option<HuffmanEncoder>,
    out: &mut Vec<u8>,
) -> Result<LiteralsType> {
    let size = literals.len();
    if size > 1 && literals.iter().all(|&b| b == literals[0]) {
        write_raw_header(out, LiteralsType::Rle, size);
        out.push(literals[0]);
        return Ok(LiteralsType::Rle);
    }

    let minimum = if huffman.is_some() {
        MIN_LITERALS_FOR_TREELESS
    } else {
        MIN_LITERALS_FOR_HUFFMAN
    };
    if size >= minimum {
        if let Some((literals_type, body, encoder)) = huffman_literals(literals, huffman.as_ref()) {
            let raw_size = raw_header_size(size) + size;
            if compressed_header_size(size, body.len()) + body.len() < raw_size {
                write_compressed_header(
                    out,
                    literals_type,
                    size,
                    body.len(),
                    size >= SINGLE_STREAM_LIMIT,
                )?;
                out.extend_from_slice(&body);
                if let Some(encoder) = encoder {
                    *huffman = Some(encoder);
                }
                return Ok(literals_type);
            }
        }
    }

    write_raw_header(out, LiteralsType::Raw, size);
    out.extend_from_slice(literals);
    Ok(LiteralsType::Raw)
}

/// Huffman-coded body of the literals section: the tree description (if
/// any) followed by the streams. The new encoder is returned when a tree
/// was written.
fn huffman_literals(
    literals: &[u8],
    previous: Option<&HuffmanEncoder>,
) -> Option<(LiteralsType, Vec<u8>, Option<HuffmanEncoder>)> {
    let mut counts = [0u32; 256];
    for &byte in literals {
        counts[byte as usize] += 1;
    }

    let fresh = HuffmanEncoder::build(&counts).and_then(|encoder| {
        let description = encoder.write_description()?;
        let bits = description.len() * 8 + encoder.estimate_bits(&counts);
        Some((bits, encoder, description))
    });
    let reuse = previous
        .filter(|encoder| encoder.can_encode(&counts))
        .map(|encoder| encoder.estimate_bits(&counts));

    let use_previous = match (&fresh, reuse) {
        (Some((fresh_bits, _, _)), Some(reuse_bits)) => reuse_bits <= *fresh_bits,
        (None, Some(_)) => true,
        (_, None) => false,
    };

    if use_previous {
        let body = encode_streams(previous?, literals)?;
        Some((LiteralsType::Treeless, body, None))
    } else {
        let (_, encoder, mut body) = fresh?;
        body.extend_from_slice(&encode_streams(&encoder, literals)?);
        Some((LiteralsType::Compressed, body, Some(encoder)))
    }
}

fn encode_streams(encoder: &HuffmanEncoder, literals: &[u8]) -> Option<Vec<u8>> {
    if literals.len() < SINGLE_STREAM_LIMIT {
        Some(encoder.encode_stream(literals))
    } else {
        encoder.encode_four_streams(literals)
    }
}

fn raw_header_size(size: usize) -> usize {
    match size {
        0..=31 => 1,
        32..=4095 => 2,
        _ => 3,
    }
}

fn compressed_header_size(regenerated: usize, compressed: usize) -> usize {
    match regenerated.max(compressed) {
        0..=1023 => 3,
        1024..=16383 => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::decode_literals;
    use crate::huffman::HuffmanTable;

    fn decode(section: &[u8], table: &mut Option<HuffmanTable>) -> Vec<u8> {
        let mut out = Vec::new();
        let (regenerated, consumed) = decode_literals(section, table, &mut out).unwrap();
        assert_eq!(consumed, section.len());
        out.truncate(regenerated);
        out
    }

    fn text(len: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog; "
            .iter()
            .cycle()
            .take(len)
            .copied()
            .collect()
    }

    #[test]
    fn test_empty_literals() {
        let mut out = Vec::new();
        assert_eq!(encode_literals(&[], &mut None, &mut out).unwrap(), LiteralsType::Raw);
        assert_eq!(out, vec![0x00]);
    }

    #[test]
    fn test_short_literals_stay_raw() {
        let mut out = Vec::new();
        let literals = b"abcdefg";
        assert_eq!(encode_literals(literals, &mut None, &mut out).unwrap(), LiteralsType::Raw);
        assert_eq!(out.len(), 1 + literals.len());
        assert_eq!(decode(&out, &mut None), literals);
    }

    #[test]
    fn test_rle_literals() {
        let mut out = Vec::new();
        assert_eq!(encode_literals(&[9; 500], &mut None, &mut out).unwrap(), LiteralsType::Rle);
        assert_eq!(out.len(), 3);
        assert_eq!(decode(&out, &mut None), vec![9; 500]);
    }

    #[test]
    fn test_huffman_single_and_four_streams() {
        for len in [200, 255, 256, 5000, 100_000] {
            let literals = text(len);
            let mut encoder = None;
            let mut out = Vec::new();
            let kind = encode_literals(&literals, &mut encoder, &mut out).unwrap();
            assert_eq!(kind, LiteralsType::Compressed, "len {len}");
            assert!(out.len() < literals.len());
            assert!(encoder.is_some());
            assert_eq!(decode(&out, &mut None), literals, "len {len}");
        }
    }

    #[test]
    fn test_treeless_reuses_previous_tree() {
        let literals = text(4000);
        let mut encoder = None;
        let mut table = None;

        let mut first = Vec::new();
        encode_literals(&literals, &mut encoder, &mut first).unwrap();
        assert_eq!(decode(&first, &mut table), literals);

        let mut second = Vec::new();
        let kind = encode_literals(&literals[..1000], &mut encoder, &mut second).unwrap();
        assert_eq!(kind, LiteralsType::Treeless);
        assert_eq!(decode(&second, &mut table), &literals[..1000]);
    }

    #[test]
    fn test_incompressible_literals_stay_raw() {
        let literals: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let mut encoder = None;
        let mut out = Vec::new();
        assert_eq!(encode_literals(&literals, &mut encoder, &mut out).unwrap(), LiteralsType::Raw);
        assert!(encoder.is_none());
        assert_eq!(decode(&out, &mut None), literals);
    }

    #[test]
    fn test_header_sizes() {
        assert_eq!(raw_header_size(31), 1);
        assert_eq!(raw_header_size(32), 2);
        assert_eq!(raw_header_size(4096), 3);
        assert_eq!(compressed_header_size(1023, 10), 3);
        assert_eq!(compressed_header_size(1024, 10), 4);
        assert_eq!(compressed_header_size(20_000, 16_384), 5);
    }
}
