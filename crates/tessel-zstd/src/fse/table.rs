//! FSE decoding tables and table descriptions.
//!
//! ## Table description format
//!
//! A description (RFC 8878 Section 4.1.1) is read forward, LSB first:
//! - 4 bits: accuracy_log - 5
//! - one variable-width value per symbol, `probability + 1`, whose width
//!   shrinks as the remaining probability mass shrinks
//! - after a zero probability, 2-bit repeat flags give the number of
//!   further zero-probability symbols (a flag of 3 means "3 more, continue")

use crate::bits::highbit32;
use crate::bitstream::{BitWriter, ForwardBitReader};
use tessel_core::{Error, Result};

/// Smallest accuracy log a table description can carry.
pub const FSE_MIN_ACCURACY_LOG: u32 = 5;

/// Largest accuracy log any FSE table in the format uses.
pub const FSE_MAX_ACCURACY_LOG: u32 = 9;

/// A single entry in an FSE decoding table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FseTableEntry {
    /// Symbol this state decodes to.
    pub symbol: u8,
    /// Bits to read for the next state.
    pub num_bits: u8,
    /// Added to the bits read to form the next state.
    pub baseline: u16,
}

/// FSE decoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseTable {
    entries: Vec<FseTableEntry>,
    accuracy_log: u32,
    /// Probability of each symbol, with `-1` kept as the low-probability marker.
    normalized: Vec<i16>,
}

impl FseTable {
    /// Build a table from a normalized distribution.
    ///
    /// The distribution must sum to `2^accuracy_log`, counting each `-1`
    /// entry as one.
    pub fn build(normalized: &[i16], accuracy_log: u32) -> Result<Self> {
        if !(FSE_MIN_ACCURACY_LOG..=FSE_MAX_ACCURACY_LOG).contains(&accuracy_log) {
            return Err(Error::corrupted(format!(
                "FSE accuracy log {accuracy_log} out of range"
            )));
        }
        if normalized.is_empty() || normalized.len() > 256 {
            return Err(Error::corrupted("FSE alphabet size out of range"));
        }

        let mut total = 0i32;
        for &count in normalized {
            if count < -1 {
                return Err(Error::corrupted("negative FSE probability"));
            }
            total += if count == -1 { 1 } else { count as i32 };
        }
        if total != 1 << accuracy_log {
            return Err(Error::corrupted(format!(
                "FSE probabilities sum to {total}, expected {}",
                1 << accuracy_log
            )));
        }

        Ok(Self::spread(normalized, accuracy_log))
    }

    /// Table for a field where every sequence uses `symbol`.
    pub fn rle(symbol: u8) -> Self {
        let mut normalized = vec![0i16; symbol as usize + 1];
        normalized[symbol as usize] = 1;
        Self::spread(&normalized, 0)
    }

    /// Spread symbols over the table and derive state transitions.
    /// `normalized` has already been validated.
    pub(crate) fn spread(normalized: &[i16], accuracy_log: u32) -> Self {
        let size = 1usize << accuracy_log;
        let mut entries = vec![FseTableEntry::default(); size];
        let mut symbol_next = vec![0u32; normalized.len()];
        let mut high_threshold = size - 1;

        for (symbol, &count) in normalized.iter().enumerate() {
            if count == -1 {
                entries[high_threshold].symbol = symbol as u8;
                high_threshold = high_threshold.wrapping_sub(1);
                symbol_next[symbol] = 1;
            } else {
                symbol_next[symbol] = count as u32;
            }
        }

        let step = (size >> 1) + (size >> 3) + 3;
        let mask = size - 1;
        let mut position = 0usize;
        for (symbol, &count) in normalized.iter().enumerate() {
            for _ in 0..count.max(0) {
                entries[position].symbol = symbol as u8;
                loop {
                    position = (position + step) & mask;
                    if position <= high_threshold {
                        break;
                    }
                }
            }
        }
        debug_assert_eq!(position, 0, "FSE spread did not close");

        for entry in entries.iter_mut() {
            let next = &mut symbol_next[entry.symbol as usize];
            let num_bits = accuracy_log - highbit32(*next);
            entry.num_bits = num_bits as u8;
            entry.baseline = ((*next << num_bits) - size as u32) as u16;
            *next += 1;
        }

        Self {
            entries,
            accuracy_log,
            normalized: normalized.to_vec(),
        }
    }

    /// Parse a table description, returning the table and bytes consumed.
    pub fn parse(input: &[u8], max_symbol: u8, max_log: u32) -> Result<(Self, usize)> {
        let (normalized, accuracy_log, consumed) = read_ncount(input, max_symbol, max_log)?;
        let table = Self::build(&normalized, accuracy_log)?;
        Ok((table, consumed))
    }

    /// Accuracy log (table size is `1 << accuracy_log`).
    pub fn accuracy_log(&self) -> u32 {
        self.accuracy_log
    }

    /// Number of states.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// Entry for a state.
    #[inline(always)]
    pub fn entry(&self, state: usize) -> &FseTableEntry {
        &self.entries[state]
    }

    /// All entries in state order.
    pub fn entries(&self) -> &[FseTableEntry] {
        &self.entries
    }

    /// Normalized distribution the table was built from.
    pub fn normalized(&self) -> &[i16] {
        &self.normalized
    }

    /// Largest symbol with nonzero probability.
    pub fn max_symbol(&self) -> u8 {
        self.normalized
            .iter()
            .rposition(|&count| count != 0)
            .unwrap_or(0) as u8
    }
}

/// Read a table description.
///
/// Returns the normalized distribution, its accuracy log and the number of
/// bytes consumed.
pub fn read_ncount(input: &[u8], max_symbol: u8, max_log: u32) -> Result<(Vec<i16>, u32, usize)> {
    let mut reader = ForwardBitReader::new(input);
    let accuracy_log = reader.read_bits(4)? + FSE_MIN_ACCURACY_LOG;
    if accuracy_log > max_log {
        return Err(Error::corrupted(format!(
            "FSE accuracy log {accuracy_log} exceeds {max_log}"
        )));
    }

    let mut remaining: i32 = (1 << accuracy_log) + 1;
    let mut threshold: i32 = 1 << accuracy_log;
    let mut nb_bits = accuracy_log + 1;
    let mut normalized: Vec<i16> = Vec::with_capacity(max_symbol as usize + 1);
    let mut previous_zero = false;
    let limit = max_symbol as usize + 1;

    while remaining > 1 {
        if previous_zero {
            loop {
                let repeat = reader.read_bits(2)?;
                for _ in 0..repeat {
                    normalized.push(0);
                }
                if repeat != 3 || normalized.len() > limit {
                    break;
                }
            }
        }
        if normalized.len() >= limit {
            return Err(Error::corrupted("FSE description has too many symbols"));
        }

        let max = (2 * threshold - 1) - remaining;
        let low = reader.peek_bits(nb_bits - 1) as i32;
        let mut count = if low < max {
            reader.read_bits(nb_bits - 1)?;
            low
        } else {
            let value = reader.read_bits(nb_bits)? as i32;
            if value >= threshold {
                value - max
            } else {
                value
            }
        };
        count -= 1;

        remaining -= count.abs();
        if remaining < 1 {
            return Err(Error::corrupted("FSE probabilities overflow table"));
        }
        normalized.push(count as i16);
        previous_zero = count == 0;

        while remaining < threshold {
            nb_bits -= 1;
            threshold >>= 1;
        }
    }

    if remaining != 1 {
        return Err(Error::corrupted("FSE probabilities do not fill table"));
    }
    Ok((normalized, accuracy_log, reader.bytes_consumed()))
}

/// Serialize a normalized distribution as a table description.
pub fn write_ncount(normalized: &[i16], accuracy_log: u32) -> Vec<u8> {
    debug_assert!(accuracy_log >= FSE_MIN_ACCURACY_LOG);
    let mut writer = BitWriter::with_capacity(normalized.len());
    writer.add_bits((accuracy_log - FSE_MIN_ACCURACY_LOG) as u64, 4);

    let mut remaining: i32 = (1 << accuracy_log) + 1;
    let mut threshold: i32 = 1 << accuracy_log;
    let mut nb_bits = accuracy_log + 1;
    let mut symbol = 0usize;
    let mut previous_zero = false;

    while symbol < normalized.len() && remaining > 1 {
        if previous_zero {
            let mut start = symbol;
            while symbol < normalized.len() && normalized[symbol] == 0 {
                symbol += 1;
            }
            if symbol == normalized.len() {
                break;
            }
            while symbol >= start + 3 {
                start += 3;
                writer.add_bits(3, 2);
            }
            writer.add_bits((symbol - start) as u64, 2);
        }

        let probability = normalized[symbol] as i32;
        symbol += 1;
        let max = (2 * threshold - 1) - remaining;
        remaining -= probability.abs();
        let mut value = probability + 1;
        if value >= threshold {
            value += max;
        }
        let width = if value < max { nb_bits - 1 } else { nb_bits };
        writer.add_bits(value as u64, width);
        previous_zero = value == 1;

        while remaining < threshold {
            nb_bits -= 1;
            threshold >>= 1;
        }
    }

    writer.finish_unmarked()
}

/// Pick an accuracy log for `total` symbols drawn from `0..=max_symbol`.
pub fn optimal_table_log(max_log: u32, total: u32, max_symbol: u8) -> u32 {
    debug_assert!(total > 1);
    let mut log = max_log.min(highbit32(total - 1).saturating_sub(2));
    let min_bits = (highbit32(total) + 1).min(highbit32(max_symbol.max(1) as u32) + 2);
    log = log.max(min_bits);
    log.clamp(FSE_MIN_ACCURACY_LOG, max_log)
}

/// Scale symbol counts to a distribution summing to `2^accuracy_log`.
///
/// Every present symbol keeps a probability of at least one.
pub fn normalize_counts(counts: &[u32], total: u32, accuracy_log: u32) -> Vec<i16> {
    debug_assert!(total > 0);
    let size = 1i64 << accuracy_log;
    let mut normalized: Vec<i16> = counts
        .iter()
        .map(|&count| {
            if count == 0 {
                0
            } else {
                let scaled = (count as i64 * size + total as i64 / 2) / total as i64;
                scaled.max(1) as i16
            }
        })
        .collect();

    let mut sum: i64 = normalized.iter().map(|&n| n as i64).sum();
    let largest = |normalized: &[i16]| {
        normalized
            .iter()
            .enumerate()
            .max_by_key(|&(index, &n)| (n, std::cmp::Reverse(index)))
            .map(|(index, _)| index)
            .unwrap_or(0)
    };

    if sum < size {
        let index = largest(&normalized);
        normalized[index] += (size - sum) as i16;
    }
    while sum > size {
        let index = largest(&normalized);
        let spare = (normalized[index] as i64 - 1).min(sum - size);
        if spare <= 0 {
            break;
        }
        let step = spare.min((spare / 8).max(1));
        normalized[index] -= step as i16;
        sum -= step;
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{LL_DEFAULT_NORM, LL_DEFAULT_NORM_LOG, OF_DEFAULT_NORM};

    #[test]
    fn test_build_default_ll_table() {
        let table = FseTable::build(&LL_DEFAULT_NORM, LL_DEFAULT_NORM_LOG).unwrap();
        assert_eq!(table.size(), 64);
        // Low-probability symbols occupy the top of the table.
        assert_eq!(table.entry(63).symbol, 32);
        assert_eq!(table.entry(60).symbol, 35);
        assert_eq!(table.entry(63).num_bits, 6);
        assert_eq!(table.entry(63).baseline, 0);
        // First state of the reference predefined LL table.
        assert_eq!(table.entry(0).symbol, 0);
        assert_eq!(table.entry(0).num_bits, 4);
        assert_eq!(table.entry(0).baseline, 0);
    }

    #[test]
    fn test_every_state_reachable_per_symbol() {
        let table = FseTable::build(&OF_DEFAULT_NORM, 5).unwrap();
        for symbol in 0..OF_DEFAULT_NORM.len() as u8 {
            let mut covered = vec![false; table.size()];
            for entry in table.entries().iter().filter(|e| e.symbol == symbol) {
                let span = 1usize << entry.num_bits;
                for next in entry.baseline as usize..entry.baseline as usize + span {
                    assert!(!covered[next]);
                    covered[next] = true;
                }
            }
            assert!(covered.iter().all(|&c| c), "symbol {symbol}");
        }
    }

    #[test]
    fn test_build_rejects_bad_sum() {
        let err = FseTable::build(&[10, 10, 10], 5).unwrap_err();
        assert!(matches!(err, Error::CorruptedData { .. }));
        assert!(FseTable::build(&[-2, 34], 5).is_err());
        assert!(FseTable::build(&[1024, 0], 10).is_err());
    }

    #[test]
    fn test_rle_table() {
        let table = FseTable::rle(17);
        assert_eq!(table.size(), 1);
        assert_eq!(table.accuracy_log(), 0);
        assert_eq!(*table.entry(0), FseTableEntry { symbol: 17, num_bits: 0, baseline: 0 });
    }

    #[test]
    fn test_ncount_round_trip() {
        let mut wide = vec![0i16; 200];
        wide[0] = 100;
        wide[11] = 1;
        wide[12] = 150;
        wide[13] = -1;
        wide[14] = -1;
        wide[16] = 1;
        wide[199] = 2;
        let distributions: [(&[i16], u32); 4] = [
            (&LL_DEFAULT_NORM, 6),
            (&OF_DEFAULT_NORM, 5),
            (&[20, 0, 0, 0, 0, 0, 0, 5, -1, 6], 5),
            (&wide, 8),
        ];
        for (normalized, log) in distributions {
            let bytes = write_ncount(normalized, log);
            let (decoded, decoded_log, consumed) = read_ncount(&bytes, u8::MAX, 9).unwrap();
            assert_eq!(decoded_log, log);
            assert_eq!(consumed, bytes.len());
            let last = normalized.iter().rposition(|&n| n != 0).unwrap();
            assert_eq!(&decoded[..], &normalized[..=last]);
        }
    }

    #[test]
    fn test_read_ncount_rejects_large_log() {
        let bytes = write_ncount(&LL_DEFAULT_NORM, 6);
        assert!(read_ncount(&bytes, 35, 5).is_err());
    }

    #[test]
    fn test_read_ncount_truncated() {
        let bytes = write_ncount(&LL_DEFAULT_NORM, 6);
        assert!(read_ncount(&bytes[..bytes.len() / 2], 35, 9).is_err());
    }

    #[test]
    fn test_normalize_counts_sums_to_table() {
        let counts = [1000, 1, 1, 0, 3, 700, 2, 0, 0, 9];
        let total: u32 = counts.iter().sum();
        for log in 5..=9 {
            let normalized = normalize_counts(&counts, total, log);
            let sum: i32 = normalized.iter().map(|&n| n as i32).sum();
            assert_eq!(sum, 1 << log);
            for (count, norm) in counts.iter().zip(&normalized) {
                assert_eq!(*count == 0, *norm == 0);
            }
            FseTable::build(&normalized, log).unwrap();
        }
    }

    #[test]
    fn test_optimal_table_log_bounds() {
        assert_eq!(optimal_table_log(9, 2, 1), 5);
        assert_eq!(optimal_table_log(9, 100_000, 35), 9);
        assert_eq!(optimal_table_log(8, 100_000, 31), 8);
        let log = optimal_table_log(9, 40, 52);
        assert!((5..=9).contains(&log));
        assert!(1 << log > 52);
    }
}
