//! LZ77 match finding with hash chains.
//!
//! The head table maps a multiplicative hash of four bytes to the most
//! recent position with that hash; the chain ring links every position to
//! the previous one with the same hash. Entries hold `position + 1`, so zero
//! marks an empty slot. The tables live for a whole compress call, letting
//! matches reach into earlier blocks.

use crate::bits::{count_match, highbit32, read_u32};
use crate::sequence::{RepeatOffsets, SequenceStore};
use tessel_core::Result;

use super::params::{LevelParams, DEFAULT_LEVEL};

/// Shortest match the finder reports.
pub const MIN_MATCH_LENGTH: usize = 4;

/// Golden ratio multiplier for the 4-byte hash.
const HASH_PRIME: u32 = 0x9E37_79B9;

/// Literal runs longer than `1 << SKIP_STRENGTH` make greedy parsing skip ahead.
const SKIP_STRENGTH: u32 = 8;

/// A match candidate at some position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Distance back to the matching data.
    pub offset: usize,
    pub length: usize,
}

impl Match {
    /// Rough benefit of taking the match: bytes covered against offset cost.
    #[inline]
    fn gain(&self) -> i64 {
        self.length as i64 * 4 - highbit32(self.offset as u32 + 1) as i64
    }
}

/// Hash chain match finder.
#[derive(Debug)]
pub struct MatchFinder {
    params: LevelParams,
    hash_table: Vec<u32>,
    chain_table: Vec<u32>,
    /// First position not yet inserted.
    next_to_update: usize,
}

impl Default for MatchFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchFinder {
    pub fn new() -> Self {
        Self {
            params: LevelParams::for_level(DEFAULT_LEVEL),
            hash_table: Vec::new(),
            chain_table: Vec::new(),
            next_to_update: 0,
        }
    }

    /// Prepare for an input of `src_len` bytes.
    ///
    /// Tables shrink for small inputs; allocations are kept between calls.
    pub fn reset(&mut self, params: LevelParams, src_len: usize) {
        let size_log = (src_len.max(64).next_power_of_two().trailing_zeros()).max(6);
        self.params = LevelParams {
            hash_log: params.hash_log.min(size_log + 1),
            chain_log: params.chain_log.min(size_log),
            ..params
        };
        self.hash_table.clear();
        self.hash_table.resize(1 << self.params.hash_log, 0);
        self.chain_table.clear();
        self.chain_table.resize(1 << self.params.chain_log, 0);
        self.next_to_update = 0;
    }

    /// Parameters in effect after size adjustment.
    pub fn params(&self) -> &LevelParams {
        &self.params
    }

    #[inline(always)]
    fn hash(&self, src: &[u8], pos: usize) -> usize {
        (read_u32(src, pos).wrapping_mul(HASH_PRIME) >> (32 - self.params.hash_log)) as usize
    }

    /// Insert every position before `target` that has four bytes to hash.
    fn insert_until(&mut self, src: &[u8], target: usize) {
        let last = target.min(src.len().saturating_sub(MIN_MATCH_LENGTH - 1));
        let mask = self.chain_table.len() - 1;
        while self.next_to_update < last {
            let pos = self.next_to_update;
            let hash = self.hash(src, pos);
            self.chain_table[pos & mask] = self.hash_table[hash];
            self.hash_table[hash] = pos as u32 + 1;
            self.next_to_update += 1;
        }
    }

    /// Best match at `pos` that ends no later than `end`.
    ///
    /// Repeat offsets are tried first and win ties against chain candidates.
    pub fn find_match(
        &mut self,
        src: &[u8],
        pos: usize,
        end: usize,
        reps: &RepeatOffsets,
    ) -> Option<Match> {
        debug_assert!(pos + MIN_MATCH_LENGTH <= end && end <= src.len());
        self.insert_until(src, pos);

        let window = 1usize << self.params.window_log;
        let max_length = end - pos;
        let mut best = Match {
            offset: 0,
            length: MIN_MATCH_LENGTH - 1,
        };

        for rep in reps.offsets() {
            let rep = rep as usize;
            if rep == 0 || rep > pos || rep > window {
                continue;
            }
            let length = count_match(src, pos - rep, pos, end);
            if length > best.length {
                best = Match {
                    offset: rep,
                    length,
                };
            }
        }

        let target = self.params.target_length.min(max_length);
        let chain_len = self.chain_table.len();
        let mask = chain_len - 1;
        let mut candidate = self.hash_table[self.hash(src, pos)];
        let mut depth = 0;

        while candidate != 0 && depth < self.params.search_depth && best.length < target {
            let cpos = (candidate - 1) as usize;
            let offset = pos - cpos;
            if offset >= chain_len || offset > window {
                break;
            }
            if src[cpos + best.length] == src[pos + best.length] {
                let length = count_match(src, cpos, pos, end);
                if length > best.length {
                    best = Match { offset, length };
                }
            }
            candidate = self.chain_table[cpos & mask];
            depth += 1;
        }

        (best.length >= MIN_MATCH_LENGTH).then_some(best)
    }

    /// Parse `src[start..end]` into sequences appended to `store`.
    ///
    /// Offsets are turned into offset codes through `reps`, which is updated
    /// as the decoder will update it.
    pub fn compress_block(
        &mut self,
        src: &[u8],
        start: usize,
        end: usize,
        reps: &mut RepeatOffsets,
        store: &mut SequenceStore,
    ) -> Result<()> {
        let mut anchor = start;
        let mut pos = start;

        while pos + MIN_MATCH_LENGTH <= end {
            let Some(mut found) = self.find_match(src, pos, end, reps) else {
                pos += if self.params.lazy {
                    1
                } else {
                    1 + ((pos - anchor) >> SKIP_STRENGTH)
                };
                continue;
            };

            if self.params.lazy {
                while pos + 1 + MIN_MATCH_LENGTH <= end {
                    match self.find_match(src, pos + 1, end, reps) {
                        Some(next) if next.gain() > found.gain() + 4 => {
                            pos += 1;
                            found = next;
                        }
                        _ => break,
                    }
                }
            }

            let lit_length = pos - anchor;
            let off_base = reps.encode(found.offset as u32, lit_length as u32);
            store.store_sequence(src, anchor, lit_length, off_base, found.length)?;
            pos += found.length;
            anchor = pos;
        }

        store.store_last_literals(src, anchor, end - anchor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::params::LevelParams;

    /// Rebuild the input from a sequence store.
    fn replay(store: &SequenceStore) -> Vec<u8> {
        let mut reps = RepeatOffsets::new();
        let literals = store.literals();
        let mut out = Vec::new();
        let mut lit_pos = 0;
        for (lengths, off_base) in store.iter() {
            let ll = lengths.lit_length as usize;
            out.extend_from_slice(&literals[lit_pos..lit_pos + ll]);
            lit_pos += ll;
            let offset = reps.resolve(off_base, lengths.lit_length).unwrap() as usize;
            for _ in 0..lengths.match_length {
                out.push(out[out.len() - offset]);
            }
        }
        out.extend_from_slice(&literals[lit_pos..]);
        out
    }

    fn parse(src: &[u8], level: i32) -> SequenceStore {
        let mut finder = MatchFinder::new();
        finder.reset(LevelParams::for_level(level), src.len());
        let mut store = SequenceStore::with_capacity(src.len());
        let mut reps = RepeatOffsets::new();
        finder
            .compress_block(src, 0, src.len(), &mut reps, &mut store)
            .unwrap();
        store
    }

    #[test]
    fn test_simple_repeat() {
        let src = b"abcdefgh-abcdefgh-abcdefgh";
        let store = parse(src, 3);
        assert!(!store.is_empty());
        let (lengths, off_base) = store.iter().next().unwrap();
        assert_eq!(lengths.lit_length, 9);
        assert_eq!(off_base, 9 + 3);
        assert_eq!(replay(&store), src);
    }

    #[test]
    fn test_unique_input_has_no_sequences() {
        let src: Vec<u8> = (0..=255u8).collect();
        let store = parse(&src, 3);
        assert!(store.is_empty());
        assert_eq!(store.literals(), &src[..]);
    }

    #[test]
    fn test_short_input() {
        let store = parse(b"abc", 1);
        assert!(store.is_empty());
        assert_eq!(store.literals(), b"abc");
    }

    #[test]
    fn test_overlapping_run() {
        let mut src = b"xy".to_vec();
        src.extend(std::iter::repeat(b'z').take(500));
        let store = parse(&src, 3);
        assert_eq!(replay(&store), src);
        assert!(store.len() <= 2);
    }

    #[test]
    fn test_repeated_distance_uses_repeat_code() {
        // Same 16-byte period separated by fresh literals each time.
        let mut src = Vec::new();
        let pattern = b"0123456789ABCDEF";
        src.extend_from_slice(pattern);
        for filler in [b'!', b'?', b'#'] {
            src.push(filler);
            src.extend_from_slice(pattern);
        }
        let store = parse(&src, 3);
        let codes: Vec<u32> = store.iter().map(|(_, off_base)| off_base).collect();
        assert_eq!(codes.len(), 3);
        assert_eq!(codes[0], 17 + 3);
        assert_eq!(&codes[1..], &[1, 1]);
        assert_eq!(replay(&store), src);
    }

    #[test]
    fn test_all_levels_replay() {
        let src: Vec<u8> = b"It was the best of times, it was the worst of times, "
            .iter()
            .cycle()
            .take(5000)
            .enumerate()
            .map(|(i, &b)| if i % 97 == 0 { b'#' } else { b })
            .collect();
        for level in [1, 3, 5, 12, 22] {
            let store = parse(&src, level);
            assert_eq!(replay(&store), src, "level {level}");
        }
    }
}
