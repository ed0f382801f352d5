//! Huffman decoding tables.

use super::HUFFMAN_MAX_BITS;
use crate::bits::highbit32;
use tessel_core::{Error, Result};

/// A single entry in a Huffman decoding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HuffmanTableEntry {
    /// The symbol this code decodes to.
    pub symbol: u8,
    /// Number of bits in the code.
    pub num_bits: u8,
}

/// Huffman decoding table.
///
/// Single-level lookup indexed by the next `table_log` bits of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    entries: Vec<HuffmanTableEntry>,
    table_log: u32,
    /// Weight of every symbol up to the last present one.
    weights: Vec<u8>,
}

impl HuffmanTable {
    /// Build a table from the explicit weights of a tree description.
    ///
    /// The weight of the final symbol is implied: it completes the total to
    /// the next power of two.
    pub fn from_weights(explicit: &[u8]) -> Result<Self> {
        if explicit.is_empty() || explicit.len() > 255 {
            return Err(Error::corrupted("Huffman weight count out of range"));
        }

        let mut total = 0u32;
        for &weight in explicit {
            if weight as u32 > HUFFMAN_MAX_BITS {
                return Err(Error::corrupted(format!("Huffman weight {weight} too large")));
            }
            if weight > 0 {
                total += 1 << (weight - 1);
            }
        }
        if total == 0 {
            return Err(Error::corrupted("all Huffman weights are zero"));
        }

        let table_log = highbit32(total) + 1;
        if table_log > HUFFMAN_MAX_BITS {
            return Err(Error::corrupted(format!(
                "Huffman table log {table_log} too large"
            )));
        }
        let rest = (1u32 << table_log) - total;
        if !rest.is_power_of_two() {
            return Err(Error::corrupted("Huffman weights do not complete a tree"));
        }

        let mut weights = explicit.to_vec();
        weights.push((highbit32(rest) + 1) as u8);
        Ok(Self::from_complete_weights(weights, table_log))
    }

    /// Build from weights of every symbol, including the last.
    pub(crate) fn from_complete_weights(weights: Vec<u8>, table_log: u32) -> Self {
        let mut entries = vec![HuffmanTableEntry::default(); 1 << table_log];
        let mut position = 0usize;
        for weight in 1..=table_log as u8 {
            let span = 1usize << (weight - 1);
            let num_bits = (table_log + 1 - weight as u32) as u8;
            for (symbol, _) in weights.iter().enumerate().filter(|&(_, &w)| w == weight) {
                entries[position..position + span].fill(HuffmanTableEntry {
                    symbol: symbol as u8,
                    num_bits,
                });
                position += span;
            }
        }
        debug_assert_eq!(position, entries.len());

        Self {
            entries,
            table_log,
            weights,
        }
    }

    /// Number of bits peeked per lookup.
    pub fn table_log(&self) -> u32 {
        self.table_log
    }

    /// Entry for a peeked index.
    #[inline(always)]
    pub fn decode(&self, index: usize) -> HuffmanTableEntry {
        self.entries[index]
    }

    /// Weight of every symbol up to the last present one.
    pub fn weights(&self) -> &[u8] {
        &self.weights
    }
}
