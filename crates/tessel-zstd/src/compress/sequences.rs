//! Sequences section encoding.
//!
//! Each of the three code streams picks its table by estimated cost: the
//! predefined distribution, a single-symbol RLE table, a table built from
//! this block's statistics (paying for its description), or the table the
//! previous compressed block used.

use std::borrow::Cow;

use tracing::trace;

use crate::bitstream::BitWriter;
use crate::block::{modes_byte, write_sequence_count, SequenceMode};
use crate::fse::{
    default_encoder, estimate_bits, normalize_counts, optimal_table_log, write_ncount,
    FseEncoder, FseTable,
};
use crate::sequence::SequenceStore;
use crate::tables::{ll_code, ml_code, of_code, SymbolKind, LL_BASE, LL_BITS, ML_BASE, ML_BITS};
use tessel_core::{Error, Result};

/// Encoding table of one field.
#[derive(Debug, Clone)]
pub struct FieldTable {
    normalized: Cow<'static, [i16]>,
    accuracy_log: u32,
    encoder: Cow<'static, FseEncoder>,
}

impl FieldTable {
    fn predefined(kind: SymbolKind) -> Self {
        let (normalized, accuracy_log) = kind.default_norm();
        Self {
            normalized: Cow::Borrowed(normalized),
            accuracy_log,
            encoder: Cow::Borrowed(default_encoder(kind)),
        }
    }

    fn from_table(table: &FseTable) -> Self {
        Self {
            normalized: Cow::Owned(table.normalized().to_vec()),
            accuracy_log: table.accuracy_log(),
            encoder: Cow::Owned(FseEncoder::new(table)),
        }
    }

    fn cost(&self, counts: &[u32]) -> Option<f64> {
        estimate_bits(&self.normalized, self.accuracy_log, counts)
    }
}

/// Tables of the last compressed block, available to repeat mode.
#[derive(Debug, Clone, Default)]
pub struct SequenceEntropy {
    literal_length: Option<FieldTable>,
    offset: Option<FieldTable>,
    match_length: Option<FieldTable>,
}

impl SequenceEntropy {
    fn slot(&mut self, kind: SymbolKind) -> &mut Option<FieldTable> {
        match kind {
            SymbolKind::LiteralLength => &mut self.literal_length,
            SymbolKind::Offset => &mut self.offset,
            SymbolKind::MatchLength => &mut self.match_length,
        }
    }
}

/// Mode decided for one field.
struct FieldChoice {
    mode: SequenceMode,
    /// Table description written after the mode byte.
    description: Vec<u8>,
    table: Option<FieldTable>,
}

/// Pick the cheapest way to transmit the table for `codes`.
fn choose_table(kind: SymbolKind, codes: &[u8], previous: Option<&FieldTable>) -> FieldChoice {
    let mut counts = vec![0u32; kind.max_symbol() as usize + 1];
    for &code in codes {
        counts[code as usize] += 1;
    }
    let max_symbol = counts.iter().rposition(|&c| c > 0).unwrap_or(0);
    let distinct = counts.iter().filter(|&&c| c > 0).count();

    let predefined = FieldTable::predefined(kind);
    let mut best = predefined.cost(&counts).map(|bits| {
        (
            bits,
            FieldChoice {
                mode: SequenceMode::Predefined,
                description: Vec::new(),
                table: Some(predefined),
            },
        )
    });
    let mut consider = |bits: f64, choice: FieldChoice| {
        if best.as_ref().map_or(true, |(best_bits, _)| bits < *best_bits) {
            best = Some((bits, choice));
        }
    };

    if let Some(bits) = previous.and_then(|table| table.cost(&counts)) {
        consider(
            bits,
            FieldChoice {
                mode: SequenceMode::Repeat,
                description: Vec::new(),
                table: None,
            },
        );
    }

    if distinct == 1 {
        let table = FieldTable::from_table(&FseTable::rle(max_symbol as u8));
        consider(
            8.0,
            FieldChoice {
                mode: SequenceMode::Rle,
                description: vec![max_symbol as u8],
                table: Some(table),
            },
        );
    } else if codes.len() > 1 {
        let total = codes.len() as u32;
        let log = optimal_table_log(kind.max_log(), total, max_symbol as u8);
        let normalized = normalize_counts(&counts[..=max_symbol], total, log);
        if let Ok(table) = FseTable::build(&normalized, log) {
            let description = write_ncount(&normalized, log);
            if let Some(bits) = estimate_bits(&normalized, log, &counts) {
                consider(
                    bits + description.len() as f64 * 8.0,
                    FieldChoice {
                        mode: SequenceMode::Compressed,
                        description,
                        table: Some(FieldTable::from_table(&table)),
                    },
                );
            }
        }
    }

    match best {
        Some((_, choice)) => choice,
        // Only reachable for codes outside every table; a fresh table always fits.
        None => FieldChoice {
            mode: SequenceMode::Predefined,
            description: Vec::new(),
            table: Some(FieldTable::predefined(kind)),
        },
    }
}

/// Encoder for the sequences section, reusing its code buffers.
#[derive(Debug, Default)]
pub struct SequenceEncoder {
    ll_codes: Vec<u8>,
    of_codes: Vec<u8>,
    ml_codes: Vec<u8>,
}

impl SequenceEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the sequences section for `store` to `out`.
    ///
    /// `entropy` holds the previous block's tables on entry and this
    /// block's tables on return.
    pub fn encode(
        &mut self,
        store: &SequenceStore,
        entropy: &mut SequenceEntropy,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let count = store.len();
        write_sequence_count(out, count);
        if count == 0 {
            return Ok(());
        }

        self.ll_codes.clear();
        self.of_codes.clear();
        self.ml_codes.clear();
        for index in 0..count {
            let lengths = store.sequence_length(index);
            self.ll_codes.push(ll_code(lengths.lit_length));
            self.ml_codes.push(ml_code(lengths.match_length - 3));
            self.of_codes.push(of_code(store.seq_def(index).off_base()));
        }

        let choices = [
            (SymbolKind::LiteralLength, &self.ll_codes),
            (SymbolKind::Offset, &self.of_codes),
            (SymbolKind::MatchLength, &self.ml_codes),
        ]
        .map(|(kind, codes)| {
            let choice = choose_table(kind, codes, entropy.slot(kind).as_ref());
            trace!(field = kind.name(), mode = ?choice.mode, "sequence table mode");
            if let Some(table) = &choice.table {
                *entropy.slot(kind) = Some(table.clone());
            }
            choice
        });

        out.push(modes_byte(choices[0].mode, choices[1].mode, choices[2].mode));
        for choice in &choices {
            out.extend_from_slice(&choice.description);
        }

        let missing = || Error::PreconditionViolated("repeat mode without a previous table");
        let ll = entropy.literal_length.as_ref().ok_or_else(missing)?;
        let of = entropy.offset.as_ref().ok_or_else(missing)?;
        let ml = entropy.match_length.as_ref().ok_or_else(missing)?;
        out.extend_from_slice(&self.write_bitstream(store, &ll.encoder, &of.encoder, &ml.encoder));
        Ok(())
    }

    fn write_bitstream(
        &self,
        store: &SequenceStore,
        ll: &FseEncoder,
        of: &FseEncoder,
        ml: &FseEncoder,
    ) -> Vec<u8> {
        let count = store.len();
        let mut writer = BitWriter::with_capacity(count * 4);
        let write_extras = |writer: &mut BitWriter, index: usize| {
            let lengths = store.sequence_length(index);
            let ll = self.ll_codes[index] as usize;
            let ml = self.ml_codes[index] as usize;
            writer.add_bits((lengths.lit_length - LL_BASE[ll]) as u64, LL_BITS[ll] as u32);
            writer.add_bits((lengths.match_length - ML_BASE[ml]) as u64, ML_BITS[ml] as u32);
            writer.add_bits(
                store.seq_def(index).off_base() as u64,
                self.of_codes[index] as u32,
            );
        };

        let last = count - 1;
        let mut ml_state = ml.init_state(self.ml_codes[last]);
        let mut of_state = of.init_state(self.of_codes[last]);
        let mut ll_state = ll.init_state(self.ll_codes[last]);
        write_extras(&mut writer, last);

        for index in (0..last).rev() {
            of.encode(&mut writer, &mut of_state, self.of_codes[index]);
            ml.encode(&mut writer, &mut ml_state, self.ml_codes[index]);
            ll.encode(&mut writer, &mut ll_state, self.ll_codes[index]);
            write_extras(&mut writer, index);
        }

        ml.flush(&mut writer, ml_state);
        of.flush(&mut writer, of_state);
        ll.flush(&mut writer, ll_state);
        writer.finish()
    }
}
