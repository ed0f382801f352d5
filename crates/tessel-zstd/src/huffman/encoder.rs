//! Huffman encoding for literals.
//!
//! Code lengths come from a plain Huffman tree and are then limited to
//! [`HUFFMAN_MAX_BITS`] by rebalancing the Kraft sum. Codes are assigned
//! canonically from the resulting weights, so the decoder's table built
//! from the same weights maps every code back to its symbol.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::decoder::HUFFMAN_WEIGHTS_MAX_LOG;
use super::HUFFMAN_MAX_BITS;
use crate::bitstream::BitWriter;
use crate::fse::{normalize_counts, optimal_table_log, write_ncount, FseEncoder, FseTable};

/// Code assigned to one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanCode {
    pub code: u16,
    pub num_bits: u8,
}

/// Literal encoder built from a byte histogram.
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    codes: [HuffmanCode; 256],
    /// Weight of every symbol up to the last present one.
    weights: Vec<u8>,
    table_log: u32,
}

impl HuffmanEncoder {
    /// Build an encoder for a histogram of byte values.
    ///
    /// Returns `None` when fewer than two distinct symbols occur, since
    /// those inputs are stored raw or as a single repeated byte.
    pub fn build(counts: &[u32; 256]) -> Option<Self> {
        let lengths = code_lengths(counts)?;
        let table_log = lengths.iter().copied().max().unwrap_or(0) as u32;
        let last = lengths.iter().rposition(|&len| len > 0)?;
        let weights = lengths[..=last]
            .iter()
            .map(|&len| if len == 0 { 0 } else { (table_log + 1 - len as u32) as u8 })
            .collect();
        Some(Self::from_weights(weights, table_log))
    }

    /// Rebuild the encoder matching a set of complete weights.
    pub(crate) fn from_weights(weights: Vec<u8>, table_log: u32) -> Self {
        let mut codes = [HuffmanCode::default(); 256];
        let mut position = 0u32;
        for weight in 1..=table_log as u8 {
            for (symbol, _) in weights.iter().enumerate().filter(|&(_, &w)| w == weight) {
                codes[symbol] = HuffmanCode {
                    code: (position >> (weight - 1)) as u16,
                    num_bits: (table_log + 1 - weight as u32) as u8,
                };
                position += 1 << (weight - 1);
            }
        }
        Self {
            codes,
            weights,
            table_log,
        }
    }

    /// Longest code length.
    pub fn table_log(&self) -> u32 {
        self.table_log
    }

    /// Weight of every symbol up to the last present one.
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }

    /// Code of a symbol (zero bits when absent).
    pub fn code(&self, symbol: u8) -> HuffmanCode {
        self.codes[symbol as usize]
    }

    /// Whether every symbol of the histogram has a code.
    pub fn can_encode(&self, counts: &[u32; 256]) -> bool {
        counts
            .iter()
            .zip(self.codes.iter())
            .all(|(&count, code)| count == 0 || code.num_bits > 0)
    }

    /// Bits needed to encode the histogram, excluding stream overhead.
    pub fn estimate_bits(&self, counts: &[u32; 256]) -> usize {
        counts
            .iter()
            .zip(self.codes.iter())
            .map(|(&count, code)| count as usize * code.num_bits as usize)
            .sum()
    }

    /// Serialize the tree description.
    ///
    /// Weights are FSE-compressed when that is smaller, and must be when
    /// there are more than 128 of them. `None` when neither form fits.
    pub fn write_description(&self) -> Option<Vec<u8>> {
        let explicit = &self.weights[..self.weights.len() - 1];
        let count = explicit.len();
        let direct_size = 1 + count.div_ceil(2);

        if let Some(compressed) = compress_weights(explicit, self.table_log) {
            if compressed.len() < 128 && (count > 128 || compressed.len() + 1 < direct_size) {
                let mut out = Vec::with_capacity(compressed.len() + 1);
                out.push(compressed.len() as u8);
                out.extend_from_slice(&compressed);
                return Some(out);
            }
        }
        if count > 128 {
            return None;
        }

        let mut out = Vec::with_capacity(direct_size);
        out.push((127 + count) as u8);
        for pair in explicit.chunks(2) {
            let low = pair.get(1).copied().unwrap_or(0);
            out.push((pair[0] << 4) | low);
        }
        Some(out)
    }

    /// Encode one stream; the first literal ends up read first.
    pub fn encode_stream(&self, literals: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::with_capacity(literals.len());
        for &byte in literals.iter().rev() {
            let code = self.codes[byte as usize];
            writer.add_bits(code.code as u64, code.num_bits as u32);
        }
        writer.finish()
    }

    /// Encode four streams behind a jump table.
    ///
    /// `None` when one of the first three streams exceeds the jump table's
    /// 16-bit sizes.
    pub fn encode_four_streams(&self, literals: &[u8]) -> Option<Vec<u8>> {
        let segment = literals.len().div_ceil(4);
        let segments: Vec<&[u8]> = literals.chunks(segment.max(1)).collect();

        #[cfg(feature = "parallel")]
        let streams: Vec<Vec<u8>> = segments
            .par_iter()
            .map(|segment| self.encode_stream(segment))
            .collect();

        #[cfg(not(feature = "parallel"))]
        let streams: Vec<Vec<u8>> = segments
            .iter()
            .map(|segment| self.encode_stream(segment))
            .collect();

        if streams.len() != 4 {
            return None;
        }
        let mut out = Vec::with_capacity(6 + streams.iter().map(Vec::len).sum::<usize>());
        for stream in &streams[..3] {
            let size = u16::try_from(stream.len()).ok()?;
            out.extend_from_slice(&size.to_le_bytes());
        }
        for stream in &streams {
            out.extend_from_slice(stream);
        }
        Some(out)
    }
}

/// FSE-compress explicit weights with two interleaved states.
fn compress_weights(weights: &[u8], table_log: u32) -> Option<Vec<u8>> {
    let count = weights.len();
    if count < 2 || weights.iter().all(|&w| w == weights[0]) {
        return None;
    }

    let mut histogram = vec![0u32; table_log as usize + 1];
    for &weight in weights {
        histogram[weight as usize] += 1;
    }
    let max_weight = histogram.iter().rposition(|&c| c > 0)? as u8;
    histogram.truncate(max_weight as usize + 1);

    let log = optimal_table_log(HUFFMAN_WEIGHTS_MAX_LOG, count as u32, max_weight);
    let normalized = normalize_counts(&histogram, count as u32, log);
    let table = FseTable::build(&normalized, log).ok()?;
    let encoder = FseEncoder::new(&table);

    let mut writer = BitWriter::with_capacity(count);
    let mut states = [0u32; 2];
    states[(count - 2) % 2] = encoder.init_state(weights[count - 2]);
    states[(count - 1) % 2] = encoder.init_state(weights[count - 1]);
    for index in (0..count - 2).rev() {
        encoder.encode(&mut writer, &mut states[index % 2], weights[index]);
    }
    encoder.flush(&mut writer, states[1]);
    encoder.flush(&mut writer, states[0]);

    let mut out = write_ncount(&normalized, log);
    out.extend_from_slice(&writer.finish());
    Some(out)
}

/// Code lengths per byte value, limited to [`HUFFMAN_MAX_BITS`].
///
/// `None` when fewer than two symbols are present.
fn code_lengths(counts: &[u32; 256]) -> Option<[u8; 256]> {
    let leaves: Vec<usize> = (0..256).filter(|&s| counts[s] > 0).collect();
    if leaves.len() < 2 {
        return None;
    }

    // Ties go to the lower node index so the tree is deterministic.
    let mut parent = vec![0usize; 2 * leaves.len() - 1];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = leaves
        .iter()
        .enumerate()
        .map(|(node, &symbol)| Reverse((counts[symbol] as u64, node)))
        .collect();
    let mut next = leaves.len();
    while let (Some(Reverse((wa, a))), Some(Reverse((wb, b)))) = (heap.pop(), heap.pop()) {
        parent[a] = next;
        parent[b] = next;
        heap.push(Reverse((wa + wb, next)));
        next += 1;
    }

    let root = next - 1;
    let mut depth = vec![0u32; next];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node]] + 1;
    }

    let max_bits = HUFFMAN_MAX_BITS;
    let mut lengths = [0u8; 256];
    for (node, &symbol) in leaves.iter().enumerate() {
        lengths[symbol] = depth[node].min(max_bits) as u8;
    }

    let capacity = 1u64 << max_bits;
    let kraft = |lengths: &[u8; 256]| -> u64 {
        leaves
            .iter()
            .map(|&s| 1u64 << (max_bits - lengths[s] as u32))
            .sum()
    };

    let mut sum = kraft(&lengths);
    while sum > capacity {
        let symbol = leaves
            .iter()
            .copied()
            .filter(|&s| (lengths[s] as u32) < max_bits)
            .max_by_key(|&s| (lengths[s], Reverse(counts[s])))?;
        sum -= 1u64 << (max_bits - lengths[symbol] as u32 - 1);
        lengths[symbol] += 1;
    }
    while sum < capacity {
        let gap = capacity - sum;
        let Some(symbol) = leaves
            .iter()
            .copied()
            .filter(|&s| lengths[s] > 1 && (1u64 << (max_bits - lengths[s] as u32)) <= gap)
            .max_by_key(|&s| (lengths[s], counts[s]))
        else {
            break;
        };
        sum += 1u64 << (max_bits - lengths[symbol] as u32);
        lengths[symbol] -= 1;
    }

    Some(lengths)
}
