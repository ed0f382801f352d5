//! FSE state machine for decoding.

use super::table::FseTable;
use crate::bitstream::BackwardBitReader;

/// Decoding state over a shared [`FseTable`].
#[derive(Debug, Clone, Copy)]
pub struct FseDecoder {
    state: usize,
}

impl FseDecoder {
    /// Read the initial state (`accuracy_log` bits).
    #[inline]
    pub fn init(reader: &mut BackwardBitReader<'_>, table: &FseTable) -> Self {
        Self {
            state: reader.read_bits(table.accuracy_log()) as usize,
        }
    }

    /// Symbol of the current state.
    #[inline(always)]
    pub fn symbol(&self, table: &FseTable) -> u8 {
        table.entry(self.state).symbol
    }

    /// Move to the next state, reading the bits the current state asks for.
    #[inline(always)]
    pub fn update(&mut self, reader: &mut BackwardBitReader<'_>, table: &FseTable) {
        let entry = table.entry(self.state);
        let low_bits = reader.read_bits(entry.num_bits as u32) as usize;
        self.state = entry.baseline as usize + low_bits;
    }

    /// Current state index.
    pub fn state(&self) -> usize {
        self.state
    }
}
