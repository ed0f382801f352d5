//! FSE encoding.
//!
//! The encoder walks the decoding table backward: given the state the
//! decoder will be in after a symbol, it finds the unique state of that
//! symbol whose transition range covers it and emits the offset inside that
//! range. Symbols are therefore encoded last to first.

use super::table::FseTable;
use crate::bits::highbit32;
use crate::bitstream::BitWriter;

/// Encoder derived from an [`FseTable`].
#[derive(Debug, Clone)]
pub struct FseEncoder {
    accuracy_log: u32,
    /// Occurrences of each symbol in the table (`-1` counts as one).
    counts: Vec<u32>,
    /// Start of each symbol's run in `states`.
    starts: Vec<u32>,
    /// States grouped by symbol, ascending within a group.
    states: Vec<u16>,
}

impl FseEncoder {
    /// Build the encoder for a decoding table.
    pub fn new(table: &FseTable) -> Self {
        let alphabet = table.normalized().len();
        let mut counts = vec![0u32; alphabet];
        for entry in table.entries() {
            counts[entry.symbol as usize] += 1;
        }

        let mut starts = Vec::with_capacity(alphabet);
        let mut cursor = 0u32;
        for &count in &counts {
            starts.push(cursor);
            cursor += count;
        }

        let mut states = vec![0u16; table.size()];
        let mut fill = starts.clone();
        for (state, entry) in table.entries().iter().enumerate() {
            let slot = &mut fill[entry.symbol as usize];
            states[*slot as usize] = state as u16;
            *slot += 1;
        }

        Self {
            accuracy_log: table.accuracy_log(),
            counts,
            starts,
            states,
        }
    }

    /// Whether `symbol` has a nonzero probability.
    pub fn can_encode(&self, symbol: u8) -> bool {
        self.counts.get(symbol as usize).is_some_and(|&count| count > 0)
    }

    /// State the decoder ends on for the last symbol of a stream.
    ///
    /// Picks the symbol's first state, which reads the most bits on update.
    #[inline]
    pub fn init_state(&self, symbol: u8) -> u32 {
        debug_assert!(self.can_encode(symbol));
        self.states[self.starts[symbol as usize] as usize] as u32
    }

    /// Encode `symbol` in front of `state`.
    #[inline]
    pub fn encode(&self, writer: &mut BitWriter, state: &mut u32, symbol: u8) {
        let count = self.counts[symbol as usize];
        debug_assert!(count > 0);
        let z = *state + (1 << self.accuracy_log);
        let mut nb_bits = self.accuracy_log - highbit32(count);
        if (z >> nb_bits) < count {
            nb_bits -= 1;
        }
        let next = z >> nb_bits;
        writer.add_bits((z - (next << nb_bits)) as u64, nb_bits);
        let index = self.starts[symbol as usize] + (next - count);
        *state = self.states[index as usize] as u32;
    }

    /// Write the final state so the decoder can start from it.
    #[inline]
    pub fn flush(&self, writer: &mut BitWriter, state: u32) {
        writer.add_bits(state as u64, self.accuracy_log);
    }
}

/// Estimated bits to encode a histogram against a distribution.
///
/// `None` when a symbol present in `counts` has no probability.
pub fn estimate_bits(normalized: &[i16], accuracy_log: u32, counts: &[u32]) -> Option<f64> {
    let mut bits = 0.0;
    for (symbol, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let probability = match normalized.get(symbol).copied().unwrap_or(0) {
            0 => return None,
            -1 => 1.0,
            p => p as f64,
        };
        bits += count as f64 * (accuracy_log as f64 - probability.log2());
    }
    Some(bits)
}
