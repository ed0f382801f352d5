//! Statistics for compression operations.

use crate::types::CompressionRatio;

/// Statistics from a single compress or decompress call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionStats {
    /// Original (uncompressed) size in bytes.
    pub original_size: usize,

    /// Compressed size in bytes.
    pub compressed_size: usize,

    /// Blocks stored verbatim.
    pub raw_blocks: usize,

    /// Blocks stored as a single repeated byte.
    pub rle_blocks: usize,

    /// Entropy-coded blocks.
    pub compressed_blocks: usize,

    /// Sequences emitted or executed across all blocks.
    pub sequences: usize,
}

impl CompressionStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of blocks processed.
    pub fn blocks_processed(&self) -> usize {
        self.raw_blocks + self.rle_blocks + self.compressed_blocks
    }

    /// Get compression ratio.
    pub fn ratio(&self) -> CompressionRatio {
        CompressionRatio::new(self.original_size, self.compressed_size)
    }

    /// Merge stats from another operation.
    pub fn merge(&mut self, other: &CompressionStats) {
        self.original_size += other.original_size;
        self.compressed_size += other.compressed_size;
        self.raw_blocks += other.raw_blocks;
        self.rle_blocks += other.rle_blocks;
        self.compressed_blocks += other.compressed_blocks;
        self.sequences += other.sequences;
    }
}
