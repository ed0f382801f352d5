//! Sequences section.
//!
//! Layout: sequence count (1-3 bytes), a mode byte selecting how each of
//! the three code tables is obtained, the table descriptions in the order
//! literal length, offset, match length, then one backward bitstream
//! interleaving the three FSE states and the extra bits.

use std::borrow::Cow;

use crate::bitstream::BackwardBitReader;
use crate::fse::{default_table, FseDecoder, FseTable};
use crate::sequence::RepeatOffsets;
use crate::tables::{SymbolKind, LL_BASE, LL_BITS, ML_BASE, ML_BITS};
use tessel_core::{Error, Result};

/// Threshold above which the sequence count takes three bytes.
pub const LONG_NB_SEQ: usize = 0x7F00;

/// How a code table is obtained for one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    Predefined,
    Rle,
    Compressed,
    Repeat,
}

impl SequenceMode {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => SequenceMode::Predefined,
            1 => SequenceMode::Rle,
            2 => SequenceMode::Compressed,
            _ => SequenceMode::Repeat,
        }
    }

    pub fn field(self) -> u8 {
        match self {
            SequenceMode::Predefined => 0,
            SequenceMode::Rle => 1,
            SequenceMode::Compressed => 2,
            SequenceMode::Repeat => 3,
        }
    }
}

/// A decoded sequence with its offset resolved to a distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub lit_length: u32,
    pub match_length: u32,
    pub offset: u32,
}

/// Decoding tables in effect, kept across blocks for repeat mode.
#[derive(Debug, Clone, Default)]
pub struct SequenceTables {
    literal_length: Option<Cow<'static, FseTable>>,
    offset: Option<Cow<'static, FseTable>>,
    match_length: Option<Cow<'static, FseTable>>,
}

impl SequenceTables {
    /// Forget every table.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn slot(&mut self, kind: SymbolKind) -> &mut Option<Cow<'static, FseTable>> {
        match kind {
            SymbolKind::LiteralLength => &mut self.literal_length,
            SymbolKind::Offset => &mut self.offset,
            SymbolKind::MatchLength => &mut self.match_length,
        }
    }

    /// Install the table for `kind` according to `mode`, returning the
    /// bytes of `src` consumed by its description.
    fn update(&mut self, kind: SymbolKind, mode: SequenceMode, src: &[u8]) -> Result<usize> {
        let (table, consumed) = match mode {
            SequenceMode::Predefined => (Cow::Borrowed(default_table(kind)), 0),
            SequenceMode::Rle => {
                let symbol = *src.first().ok_or_else(|| {
                    Error::corrupted(format!("missing {} RLE symbol", kind.name()))
                })?;
                if symbol > kind.max_symbol() {
                    return Err(Error::corrupted(format!(
                        "{} RLE symbol {symbol} out of range",
                        kind.name()
                    )));
                }
                (Cow::Owned(FseTable::rle(symbol)), 1)
            }
            SequenceMode::Compressed => {
                let (table, consumed) = FseTable::parse(src, kind.max_symbol(), kind.max_log())?;
                (Cow::Owned(table), consumed)
            }
            SequenceMode::Repeat => {
                if self.slot(kind).is_none() {
                    return Err(Error::corrupted(format!(
                        "repeat {} table without a previous table",
                        kind.name()
                    )));
                }
                return Ok(0);
            }
        };
        *self.slot(kind) = Some(table);
        Ok(consumed)
    }

    fn get(&self, kind: SymbolKind) -> Result<&FseTable> {
        let slot = match kind {
            SymbolKind::LiteralLength => &self.literal_length,
            SymbolKind::Offset => &self.offset,
            SymbolKind::MatchLength => &self.match_length,
        };
        slot.as_deref()
            .ok_or_else(|| Error::corrupted(format!("no {} table", kind.name())))
    }
}

/// Parse the sequence count, returning it and the bytes consumed.
pub fn parse_sequence_count(src: &[u8]) -> Result<(usize, usize)> {
    let truncated = || Error::corrupted("truncated sequence count");
    let b0 = *src.first().ok_or_else(truncated)? as usize;
    match b0 {
        0..=127 => Ok((b0, 1)),
        128..=254 => {
            let b1 = *src.get(1).ok_or_else(truncated)? as usize;
            Ok((((b0 - 128) << 8) + b1, 2))
        }
        _ => {
            let bytes = src.get(1..3).ok_or_else(truncated)?;
            Ok((bytes[0] as usize + ((bytes[1] as usize) << 8) + LONG_NB_SEQ, 3))
        }
    }
}

/// Append the sequence count.
pub fn write_sequence_count(out: &mut Vec<u8>, count: usize) {
    if count < 128 {
        out.push(count as u8);
    } else if count < LONG_NB_SEQ {
        out.push(((count >> 8) + 128) as u8);
        out.push(count as u8);
    } else {
        debug_assert!(count - LONG_NB_SEQ <= 0xFFFF);
        out.push(255);
        out.extend_from_slice(&((count - LONG_NB_SEQ) as u16).to_le_bytes());
    }
}

/// Pack the three table modes into the mode byte.
pub fn modes_byte(ll: SequenceMode, of: SequenceMode, ml: SequenceMode) -> u8 {
    (ll.field() << 6) | (of.field() << 4) | (ml.field() << 2)
}

/// Decode a sequences section into `out`, resolving offsets through `reps`.
pub fn decode_sequences(
    src: &[u8],
    tables: &mut SequenceTables,
    reps: &mut RepeatOffsets,
    out: &mut Vec<Sequence>,
) -> Result<()> {
    out.clear();
    let (count, mut pos) = parse_sequence_count(src)?;
    if count == 0 {
        if pos != src.len() {
            return Err(Error::corrupted("trailing bytes after empty sequences section"));
        }
        return Ok(());
    }

    let modes = *src
        .get(pos)
        .ok_or_else(|| Error::corrupted("missing sequence modes"))?;
    pos += 1;
    if modes & 0x03 != 0 {
        return Err(Error::corrupted("reserved sequence mode bits set"));
    }
    for (kind, shift) in [
        (SymbolKind::LiteralLength, 6),
        (SymbolKind::Offset, 4),
        (SymbolKind::MatchLength, 2),
    ] {
        let mode = SequenceMode::from_field(modes >> shift);
        pos += tables.update(kind, mode, &src[pos..])?;
    }

    let ll_table = tables.get(SymbolKind::LiteralLength)?;
    let of_table = tables.get(SymbolKind::Offset)?;
    let ml_table = tables.get(SymbolKind::MatchLength)?;

    let mut reader = BackwardBitReader::new(&src[pos..])?;
    let mut ll_state = FseDecoder::init(&mut reader, ll_table);
    let mut of_state = FseDecoder::init(&mut reader, of_table);
    let mut ml_state = FseDecoder::init(&mut reader, ml_table);

    out.reserve(count);
    for index in 0..count {
        let ll_code = ll_state.symbol(ll_table) as usize;
        let of_code = of_state.symbol(of_table) as u32;
        let ml_code = ml_state.symbol(ml_table) as usize;

        let off_base = (1u32 << of_code) + reader.read_bits(of_code) as u32;
        let match_length = ML_BASE[ml_code] + reader.read_bits(ML_BITS[ml_code] as u32) as u32;
        let lit_length = LL_BASE[ll_code] + reader.read_bits(LL_BITS[ll_code] as u32) as u32;
        if reader.is_overflowed() {
            return Err(Error::corrupted(format!(
                "sequence bitstream overread at sequence {index}"
            )));
        }

        let offset = reps.resolve(off_base, lit_length)?;
        out.push(Sequence {
            lit_length,
            match_length,
            offset,
        });

        if index + 1 < count {
            ll_state.update(&mut reader, ll_table);
            ml_state.update(&mut reader, ml_table);
            of_state.update(&mut reader, of_table);
        }
    }

    if !reader.is_finished() {
        return Err(Error::corrupted("sequence bitstream not fully consumed"));
    }
    Ok(())
}
