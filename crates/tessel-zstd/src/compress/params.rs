//! Compression level parameters.

/// Lowest accepted level; negative requests map here.
pub const MIN_LEVEL: i32 = 1;
/// Level used when `0` is requested.
pub const DEFAULT_LEVEL: i32 = 3;
/// Highest level; larger requests clamp here.
pub const MAX_LEVEL: i32 = 22;

/// Map a requested level into `MIN_LEVEL..=MAX_LEVEL`.
///
/// `0` selects [`DEFAULT_LEVEL`], negative levels select the fastest one.
pub fn clamp_level(level: i32) -> i32 {
    match level {
        0 => DEFAULT_LEVEL,
        l if l < MIN_LEVEL => MIN_LEVEL,
        l => l.min(MAX_LEVEL),
    }
}

/// Match finder configuration for one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Largest offset a match may use, as a power of two.
    pub window_log: u32,
    /// Size of the hash chain ring, as a power of two.
    pub chain_log: u32,
    /// Size of the hash head table, as a power of two.
    pub hash_log: u32,
    /// Candidates examined per position.
    pub search_depth: u32,
    /// Re-examine the next position before committing to a match.
    pub lazy: bool,
    /// Stop searching once a match this long is found.
    pub target_length: usize,
}

impl LevelParams {
    /// Parameters for a level, clamped with [`clamp_level`] first.
    pub fn for_level(level: i32) -> Self {
        let (window_log, chain_log, hash_log, search_depth, lazy, target_length) =
            match clamp_level(level) {
                1 => (19, 16, 15, 1, false, 8),
                2 => (19, 16, 16, 2, false, 16),
                3 => (20, 17, 17, 4, false, 24),
                4 => (20, 17, 17, 6, true, 24),
                5 => (21, 18, 17, 8, true, 32),
                6 => (21, 18, 18, 12, true, 48),
                7 | 8 => (21, 19, 18, 16, true, 64),
                9..=12 => (22, 20, 19, 32, true, 96),
                13..=16 => (22, 21, 20, 64, true, 128),
                17..=19 => (23, 22, 21, 128, true, 256),
                _ => (23, 23, 22, 256, true, 1024),
            };
        Self {
            window_log,
            chain_log,
            hash_log,
            search_depth,
            lazy,
            target_length,
        }
    }

    /// Largest offset the chain can still reach.
    pub fn max_distance(&self) -> usize {
        1usize << self.window_log.min(self.chain_log)
    }
}
