//! Entropy default tables and code baselines.
//!
//! Immutable process-wide data: the default normalized distributions used
//! by the "predefined" sequence mode, the extra-bit counts per code and the
//! baseline each code adds its extra bits to.

use crate::bits::highbit32;

/// Largest literal-length code.
pub const MAX_LL: u8 = 35;
/// Largest match-length code.
pub const MAX_ML: u8 = 52;
/// Largest offset code accepted by the decoder.
pub const MAX_OFF: u8 = 31;
/// Largest offset code with a default probability.
pub const DEFAULT_MAX_OFF: u8 = 28;

/// Maximum accuracy log of an FSE table per field.
pub const LL_FSE_LOG: u32 = 9;
pub const ML_FSE_LOG: u32 = 9;
pub const OFF_FSE_LOG: u32 = 8;

/// Extra bits read after each literal-length code.
pub static LL_BITS: [u8; 36] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    1, 1, 1, 1, 2, 2, 3, 3, 4, 6, 7, 8, 9, 10, 11, 12, //
    13, 14, 15, 16,
];

/// Default literal-length distribution.
pub static LL_DEFAULT_NORM: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, //
    2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1, //
    -1, -1, -1, -1,
];
pub const LL_DEFAULT_NORM_LOG: u32 = 6;

/// Extra bits read after each match-length code.
pub static ML_BITS: [u8; 53] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, //
    1, 1, 1, 1, 2, 2, 3, 3, 4, 4, 5, 7, 8, 9, 10, 11, //
    12, 13, 14, 15, 16,
];

/// Default match-length distribution.
pub static ML_DEFAULT_NORM: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, //
    -1, -1, -1, -1, -1,
];
pub const ML_DEFAULT_NORM_LOG: u32 = 6;

/// Default offset-code distribution.
pub static OF_DEFAULT_NORM: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, //
    1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];
pub const OF_DEFAULT_NORM_LOG: u32 = 5;

/// Literal length each code starts at.
pub static LL_BASE: [u32; 36] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, //
    16, 18, 20, 22, 24, 28, 32, 40, 48, 64, 0x80, 0x100, 0x200, 0x400, 0x800, 0x1000, //
    0x2000, 0x4000, 0x8000, 0x10000,
];

/// Match length each code starts at.
pub static ML_BASE: [u32; 53] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, //
    19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29, 30, 31, 32, 33, 34, //
    35, 37, 39, 41, 43, 47, 51, 59, 67, 83, 99, 0x83, 0x103, 0x203, 0x403, 0x803, //
    0x1003, 0x2003, 0x4003, 0x8003, 0x10003,
];

/// The three sequence fields, each with its own alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    LiteralLength,
    Offset,
    MatchLength,
}

impl SymbolKind {
    /// Largest code the field may carry.
    pub fn max_symbol(self) -> u8 {
        match self {
            SymbolKind::LiteralLength => MAX_LL,
            SymbolKind::Offset => MAX_OFF,
            SymbolKind::MatchLength => MAX_ML,
        }
    }

    /// Largest accuracy log of a table description for this field.
    pub fn max_log(self) -> u32 {
        match self {
            SymbolKind::LiteralLength => LL_FSE_LOG,
            SymbolKind::Offset => OFF_FSE_LOG,
            SymbolKind::MatchLength => ML_FSE_LOG,
        }
    }

    /// Default distribution and its accuracy log.
    pub fn default_norm(self) -> (&'static [i16], u32) {
        match self {
            SymbolKind::LiteralLength => (&LL_DEFAULT_NORM, LL_DEFAULT_NORM_LOG),
            SymbolKind::Offset => (&OF_DEFAULT_NORM, OF_DEFAULT_NORM_LOG),
            SymbolKind::MatchLength => (&ML_DEFAULT_NORM, ML_DEFAULT_NORM_LOG),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SymbolKind::LiteralLength => "literal length",
            SymbolKind::Offset => "offset",
            SymbolKind::MatchLength => "match length",
        }
    }
}

/// Literal-length code for a literal run.
#[inline]
pub fn ll_code(lit_length: u32) -> u8 {
    if lit_length >= 64 {
        (highbit32(lit_length) + 19) as u8
    } else {
        (LL_BASE.partition_point(|&base| base <= lit_length) - 1) as u8
    }
}

/// Match-length code for a biased match length (`match_length - 3`).
#[inline]
pub fn ml_code(ml_base: u32) -> u8 {
    if ml_base >= 128 {
        (highbit32(ml_base) + 36) as u8
    } else {
        (ML_BASE.partition_point(|&base| base <= ml_base + 3) - 1) as u8
    }
}

/// Offset code for an offset value (repeat code or `offset + 3`).
#[inline]
pub fn of_code(off_base: u32) -> u8 {
    highbit32(off_base) as u8
}
