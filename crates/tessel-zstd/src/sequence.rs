//! Sequence model: the match finder's output and the repeat-offset set.
//!
//! A sequence is a run of literals followed by a back-reference. Lengths
//! are kept in 16-bit fields with the match length biased by
//! [`MINMATCH`]. A single sequence per block may exceed the 16-bit range;
//! the store remembers which one and which field, and
//! [`SequenceStore::sequence_length`] adds [`LONG_LENGTH_BIAS`] back.

use crate::copy::{wildcopy, WILDCOPY_OVERLENGTH};
use tessel_core::{Error, Result};

/// Minimum match length of the format.
pub const MINMATCH: u32 = 3;

/// Amount added back to the escaped field of the long sequence.
pub const LONG_LENGTH_BIAS: u32 = 0xFFFF;

/// Number of repeat-offset slots.
pub const REP_NUM: usize = 3;

/// Initial repeat offsets at the start of every compress/decompress call.
pub const REP_START_VALUE: [u32; REP_NUM] = [1, 4, 8];

/// Largest length a sequence field can carry through the escape.
pub const MAX_SEQUENCE_LENGTH: u32 = 0xFFFF + LONG_LENGTH_BIAS;

/// Which field of the long sequence is escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LongLengthType {
    /// No sequence in this block is long.
    #[default]
    None,
    /// The literal length is escaped.
    LiteralLength,
    /// The match length is escaped.
    MatchLength,
}

/// Stored form of one sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqDef {
    /// Offset code: 1..=3 select a repeat offset, larger values are `offset + 3`.
    off_base: u32,
    lit_length: u16,
    ml_base: u16,
}

impl SeqDef {
    /// Offset code of this sequence.
    pub fn off_base(&self) -> u32 {
        self.off_base
    }
}

/// True lengths of a sequence after removing bias and applying the escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLength {
    pub lit_length: u32,
    pub match_length: u32,
}

/// Sequences and literals of one block.
#[derive(Debug, Default)]
pub struct SequenceStore {
    sequences: Vec<SeqDef>,
    literals: Vec<u8>,
    long_length_type: LongLengthType,
    long_length_pos: usize,
}

impl SequenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store sized for a block of `block_size` bytes.
    pub fn with_capacity(block_size: usize) -> Self {
        Self {
            sequences: Vec::with_capacity(block_size / MINMATCH as usize + 1),
            literals: Vec::with_capacity(block_size + WILDCOPY_OVERLENGTH),
            ..Self::default()
        }
    }

    /// Empty the store, keeping its allocations.
    pub fn reset(&mut self) {
        self.sequences.clear();
        self.literals.clear();
        self.long_length_type = LongLengthType::None;
        self.long_length_pos = 0;
    }

    /// Number of sequences stored.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Whether no sequence has been stored.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Literal bytes of the block, including trailing literals.
    pub fn literals(&self) -> &[u8] {
        &self.literals
    }

    /// Stored form of the sequence at `index`.
    pub fn seq_def(&self, index: usize) -> SeqDef {
        self.sequences[index]
    }

    /// The escaped field and the index of its sequence.
    pub fn long_length(&self) -> (LongLengthType, usize) {
        (self.long_length_type, self.long_length_pos)
    }

    /// Append a sequence whose literals are `src[lit_start..lit_start + lit_length]`.
    ///
    /// Fails with `PreconditionViolated` when a length exceeds
    /// [`MAX_SEQUENCE_LENGTH`], when both fields are long, or when another
    /// sequence of this block already uses the escape.
    pub fn store_sequence(
        &mut self,
        src: &[u8],
        lit_start: usize,
        lit_length: usize,
        off_base: u32,
        match_length: usize,
    ) -> Result<()> {
        debug_assert!(off_base > 0);
        debug_assert!(match_length >= MINMATCH as usize);

        let lit_length = u32::try_from(lit_length)
            .map_err(|_| Error::PreconditionViolated("literal length out of range"))?;
        let ml_base = u32::try_from(match_length)
            .map_err(|_| Error::PreconditionViolated("match length out of range"))?
            - MINMATCH;
        if lit_length > MAX_SEQUENCE_LENGTH || ml_base > MAX_SEQUENCE_LENGTH {
            return Err(Error::PreconditionViolated(
                "sequence length exceeds escape range",
            ));
        }

        let escape = match (lit_length > 0xFFFF, ml_base > 0xFFFF) {
            (false, false) => LongLengthType::None,
            (true, false) => LongLengthType::LiteralLength,
            (false, true) => LongLengthType::MatchLength,
            (true, true) => {
                return Err(Error::PreconditionViolated(
                    "literal and match length both exceed 16 bits",
                ))
            }
        };
        if escape != LongLengthType::None {
            if self.long_length_type != LongLengthType::None {
                return Err(Error::PreconditionViolated(
                    "second long-length sequence in one block",
                ));
            }
            self.long_length_type = escape;
            self.long_length_pos = self.sequences.len();
        }

        self.push_literals(src, lit_start, lit_length as usize);

        let stored = |value: u32, long: bool| {
            if long {
                (value - LONG_LENGTH_BIAS) as u16
            } else {
                value as u16
            }
        };
        self.sequences.push(SeqDef {
            off_base,
            lit_length: stored(lit_length, escape == LongLengthType::LiteralLength),
            ml_base: stored(ml_base, escape == LongLengthType::MatchLength),
        });
        Ok(())
    }

    /// Append trailing literals that follow the last sequence.
    pub fn store_last_literals(&mut self, src: &[u8], lit_start: usize, lit_length: usize) {
        self.push_literals(src, lit_start, lit_length);
    }

    fn push_literals(&mut self, src: &[u8], start: usize, length: usize) {
        if length == 0 {
            return;
        }
        let old = self.literals.len();
        if start + length + WILDCOPY_OVERLENGTH <= src.len() {
            self.literals.resize(old + length + WILDCOPY_OVERLENGTH, 0);
            wildcopy(&mut self.literals[old..], &src[start..], length);
            self.literals.truncate(old + length);
        } else {
            self.literals.extend_from_slice(&src[start..start + length]);
        }
    }

    /// True lengths of the sequence at `index`.
    pub fn sequence_length(&self, index: usize) -> SequenceLength {
        let seq = &self.sequences[index];
        let mut length = SequenceLength {
            lit_length: seq.lit_length as u32,
            match_length: seq.ml_base as u32 + MINMATCH,
        };
        if index == self.long_length_pos {
            match self.long_length_type {
                LongLengthType::LiteralLength => length.lit_length += LONG_LENGTH_BIAS,
                LongLengthType::MatchLength => length.match_length += LONG_LENGTH_BIAS,
                LongLengthType::None => {}
            }
        }
        length
    }

    /// Iterate over `(lengths, off_base)` of every sequence.
    pub fn iter(&self) -> impl Iterator<Item = (SequenceLength, u32)> + '_ {
        (0..self.sequences.len()).map(|i| (self.sequence_length(i), self.sequences[i].off_base))
    }
}

/// The three most recently used offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    offsets: [u32; REP_NUM],
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        Self {
            offsets: REP_START_VALUE,
        }
    }
}

impl RepeatOffsets {
    /// Slots seeded with [`REP_START_VALUE`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slot values, most recent first.
    pub fn offsets(&self) -> [u32; REP_NUM] {
        self.offsets
    }

    /// Which repeat slot a code selects, accounting for the shift when the
    /// literal length is zero. Index 3 means "slot 0 minus one".
    #[inline]
    fn repeat_index(off_base: u32, lit_length: u32) -> usize {
        (off_base - 1) as usize + usize::from(lit_length == 0)
    }

    fn promote(&mut self, index: usize, offset: u32) {
        match index {
            0 => {}
            1 => self.offsets.swap(0, 1),
            _ => {
                self.offsets[2] = self.offsets[1];
                self.offsets[1] = self.offsets[0];
                self.offsets[0] = offset;
            }
        }
    }

    /// Resolve an offset code to a distance and update the slots.
    pub fn resolve(&mut self, off_base: u32, lit_length: u32) -> Result<u32> {
        if off_base == 0 {
            return Err(Error::corrupted("offset code zero"));
        }
        if off_base > REP_NUM as u32 {
            let offset = off_base - REP_NUM as u32;
            self.promote(3, offset);
            return Ok(offset);
        }

        let index = Self::repeat_index(off_base, lit_length);
        let offset = if index == REP_NUM {
            self.offsets[0].wrapping_sub(1)
        } else {
            self.offsets[index]
        };
        if offset == 0 {
            return Err(Error::corrupted("repeat offset resolves to zero"));
        }
        self.promote(index, offset);
        Ok(offset)
    }

    /// Choose the offset code for `offset` and update the slots identically
    /// to [`resolve`](Self::resolve).
    pub fn encode(&mut self, offset: u32, lit_length: u32) -> u32 {
        debug_assert!(offset > 0);
        let candidates: [u32; REP_NUM] = if lit_length == 0 {
            [
                self.offsets[1],
                self.offsets[2],
                self.offsets[0].wrapping_sub(1),
            ]
        } else {
            self.offsets
        };

        match candidates.iter().position(|&rep| rep == offset) {
            Some(code) => {
                let off_base = code as u32 + 1;
                self.promote(Self::repeat_index(off_base, lit_length), offset);
                off_base
            }
            None => {
                self.promote(3, offset);
                offset + REP_NUM as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_length_applies_bias() {
        let src = vec![b'x'; 64];
        let mut store = SequenceStore::new();
        store.store_sequence(&src, 0, 5, 10, 7).unwrap();
        assert_eq!(
            store.sequence_length(0),
            SequenceLength {
                lit_length: 5,
                match_length: 7
            }
        );
        assert_eq!(store.literals(), &src[..5]);
    }

    #[test]
    fn test_long_match_length_round_trips() {
        let src = vec![0u8; 16];
        let mut store = SequenceStore::new();
        store.store_sequence(&src, 0, 2, 4, 16).unwrap();
        store.store_sequence(&src, 2, 3, 4, 70_000).unwrap();
        assert_eq!(store.long_length(), (LongLengthType::MatchLength, 1));
        assert_eq!(store.sequence_length(1).match_length, 70_000);
        assert_eq!(store.sequence_length(1).lit_length, 3);
        assert_eq!(store.sequence_length(0).match_length, 16);
    }

    #[test]
    fn test_long_literal_length_round_trips() {
        let src = vec![1u8; 80_000];
        let mut store = SequenceStore::new();
        store.store_sequence(&src, 0, 70_000, 9, 4).unwrap();
        assert_eq!(store.long_length(), (LongLengthType::LiteralLength, 0));
        assert_eq!(store.sequence_length(0).lit_length, 70_000);
        assert_eq!(store.literals().len(), 70_000);
    }

    #[test]
    fn test_second_escape_in_block_fails() {
        let src = vec![0u8; 8];
        let mut store = SequenceStore::new();
        store.store_sequence(&src, 0, 0, 4, 70_000).unwrap();
        let err = store.store_sequence(&src, 0, 0, 4, 80_000).unwrap_err();
        assert!(matches!(err, Error::PreconditionViolated(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.sequence_length(0).match_length, 70_000);
    }

    #[test]
    fn test_reset_clears_escape() {
        let src = vec![0u8; 8];
        let mut store = SequenceStore::new();
        store.store_sequence(&src, 0, 0, 4, 70_000).unwrap();
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.long_length(), (LongLengthType::None, 0));
        store.store_sequence(&src, 0, 0, 4, 70_000).unwrap();
    }

    #[test]
    fn test_resolve_new_offset_pushes_front() {
        let mut reps = RepeatOffsets::new();
        assert_eq!(reps.resolve(103, 5).unwrap(), 100);
        assert_eq!(reps.offsets(), [100, 1, 4]);
    }

    #[test]
    fn test_resolve_repeat_codes() {
        let mut reps = RepeatOffsets::new();
        assert_eq!(reps.resolve(1, 3).unwrap(), 1);
        assert_eq!(reps.offsets(), [1, 4, 8]);
        assert_eq!(reps.resolve(2, 3).unwrap(), 4);
        assert_eq!(reps.offsets(), [4, 1, 8]);
        assert_eq!(reps.resolve(3, 3).unwrap(), 8);
        assert_eq!(reps.offsets(), [8, 4, 1]);
    }

    #[test]
    fn test_resolve_shifted_when_no_literals() {
        let mut reps = RepeatOffsets::new();
        assert_eq!(reps.resolve(1, 0).unwrap(), 4);
        assert_eq!(reps.offsets(), [4, 1, 8]);
        assert_eq!(reps.resolve(2, 0).unwrap(), 8);
        assert_eq!(reps.offsets(), [8, 4, 1]);
        assert_eq!(reps.resolve(3, 0).unwrap(), 7);
        assert_eq!(reps.offsets(), [7, 8, 4]);
    }

    #[test]
    fn test_resolve_zero_offset_is_corruption() {
        let mut reps = RepeatOffsets::new();
        reps.resolve(4, 1).unwrap();
        assert_eq!(reps.offsets()[0], 1);
        assert!(reps.resolve(3, 0).is_err());
        assert!(reps.resolve(0, 1).is_err());
    }

    #[test]
    fn test_encode_mirrors_resolve() {
        let distances = [(100, 3), (100, 2), (7, 0), (100, 0), (99, 0), (4, 1), (7, 5)];
        let mut encoder = RepeatOffsets::new();
        let mut decoder = RepeatOffsets::new();
        for (offset, lit_length) in distances {
            let code = encoder.encode(offset, lit_length);
            assert_eq!(decoder.resolve(code, lit_length).unwrap(), offset);
            assert_eq!(encoder, decoder);
        }
    }

    #[test]
    fn test_encode_prefers_repeat_code() {
        let mut reps = RepeatOffsets::new();
        assert_eq!(reps.encode(300, 4), 303);
        assert_eq!(reps.encode(300, 4), 1);
        assert_eq!(reps.encode(300, 9), 1);
    }
}
