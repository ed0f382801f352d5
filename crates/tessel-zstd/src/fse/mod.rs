//! Finite State Entropy (FSE) coding.
//!
//! FSE is the table-driven ANS variant Zstandard uses for sequence codes
//! and for compressing Huffman weights.
//!
//! ## Performance
//!
//! The predefined tables are built once per process behind `OnceLock` and
//! shared by reference between all contexts.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.1](https://datatracker.ietf.org/doc/html/rfc8878#section-4.1)

mod decoder;
mod encoder;
mod table;

use std::sync::OnceLock;

use crate::tables::SymbolKind;

pub use decoder::FseDecoder;
pub use encoder::{estimate_bits, FseEncoder};
pub use table::{
    normalize_counts, optimal_table_log, read_ncount, write_ncount, FseTable, FseTableEntry,
    FSE_MAX_ACCURACY_LOG, FSE_MIN_ACCURACY_LOG,
};

// =============================================================================
// Predefined tables
// =============================================================================

static DEFAULT_TABLES: OnceLock<[FseTable; 3]> = OnceLock::new();
static DEFAULT_ENCODERS: OnceLock<[FseEncoder; 3]> = OnceLock::new();

fn kind_index(kind: SymbolKind) -> usize {
    match kind {
        SymbolKind::LiteralLength => 0,
        SymbolKind::Offset => 1,
        SymbolKind::MatchLength => 2,
    }
}

/// Predefined decoding table for a sequence field.
#[inline]
pub fn default_table(kind: SymbolKind) -> &'static FseTable {
    let tables = DEFAULT_TABLES.get_or_init(|| {
        [
            SymbolKind::LiteralLength,
            SymbolKind::Offset,
            SymbolKind::MatchLength,
        ]
        .map(|kind| {
            let (normalized, log) = kind.default_norm();
            FseTable::spread(normalized, log)
        })
    });
    &tables[kind_index(kind)]
}

/// Predefined encoder for a sequence field.
#[inline]
pub fn default_encoder(kind: SymbolKind) -> &'static FseEncoder {
    let encoders = DEFAULT_ENCODERS.get_or_init(|| {
        [
            SymbolKind::LiteralLength,
            SymbolKind::Offset,
            SymbolKind::MatchLength,
        ]
        .map(|kind| FseEncoder::new(default_table(kind)))
    });
    &encoders[kind_index(kind)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::{BackwardBitReader, BitWriter};

    fn encode_stream(encoder: &FseEncoder, symbols: &[u8]) -> Vec<u8> {
        let mut writer = BitWriter::new();
        let (last, rest) = symbols.split_last().unwrap();
        let mut state = encoder.init_state(*last);
        for &symbol in rest.iter().rev() {
            encoder.encode(&mut writer, &mut state, symbol);
        }
        encoder.flush(&mut writer, state);
        writer.finish()
    }

    fn decode_stream(table: &FseTable, stream: &[u8], count: usize) -> Vec<u8> {
        let mut reader = BackwardBitReader::new(stream).unwrap();
        let mut decoder = FseDecoder::init(&mut reader, table);
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            out.push(decoder.symbol(table));
            if i + 1 < count {
                decoder.update(&mut reader, table);
            }
        }
        assert!(reader.is_finished());
        out
    }

    #[test]
    fn test_default_tables_are_shared() {
        let a = default_table(SymbolKind::MatchLength) as *const FseTable;
        let b = default_table(SymbolKind::MatchLength) as *const FseTable;
        assert_eq!(a, b);
        assert_eq!(default_table(SymbolKind::Offset).accuracy_log(), 5);
        assert_eq!(default_table(SymbolKind::LiteralLength).size(), 64);
    }

    #[test]
    fn test_predefined_round_trip() {
        let symbols: Vec<u8> = (0..500).map(|i| ((i * 7) % 36) as u8).collect();
        let table = default_table(SymbolKind::LiteralLength);
        let stream = encode_stream(default_encoder(SymbolKind::LiteralLength), &symbols);
        assert_eq!(decode_stream(table, &stream, symbols.len()), symbols);
    }

    #[test]
    fn test_adapted_table_round_trip() {
        let symbols: Vec<u8> = (0..2000u32)
            .map(|i| match i % 10 {
                0..=5 => 0,
                6..=8 => 3,
                _ => (i % 13) as u8,
            })
            .collect();
        let mut counts = vec![0u32; 13];
        for &s in &symbols {
            counts[s as usize] += 1;
        }
        let log = optimal_table_log(9, symbols.len() as u32, 12);
        let normalized = normalize_counts(&counts, symbols.len() as u32, log);
        let table = FseTable::build(&normalized, log).unwrap();
        let encoder = FseEncoder::new(&table);
        let stream = encode_stream(&encoder, &symbols);
        assert!(stream.len() < symbols.len());
        assert_eq!(decode_stream(&table, &stream, symbols.len()), symbols);
    }

    #[test]
    fn test_rle_table_writes_no_bits() {
        let table = FseTable::rle(9);
        let encoder = FseEncoder::new(&table);
        let stream = encode_stream(&encoder, &[9; 50]);
        assert_eq!(stream, vec![1]);
        assert_eq!(decode_stream(&table, &stream, 50), vec![9; 50]);
    }

    #[test]
    fn test_estimate_bits() {
        let normalized = [16i16, 8, 8];
        let bits = estimate_bits(&normalized, 5, &[2, 1, 0]).unwrap();
        assert!((bits - 4.0).abs() < 1e-9);
        assert!(estimate_bits(&normalized, 5, &[0, 0, 0, 1]).is_none());
    }
}
