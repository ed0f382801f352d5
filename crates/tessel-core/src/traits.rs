//! Core traits for compression and decompression.
//!
//! ## Trait Hierarchy
//!
//! ```text
//! Compressor / Decompressor  (one-shot operations)
//!       ↓
//! Codec  (combined compress + decompress)
//! ```

use crate::error::Result;
use crate::stats::CompressionStats;
use crate::types::{CompressionLevel, CompressionRatio};

/// One-shot compression operations.
pub trait Compressor {
    /// Short name of the format produced.
    fn name(&self) -> &'static str;

    /// Get the configured compression level.
    fn level(&self) -> CompressionLevel;

    /// Compress data in one shot.
    ///
    /// # Arguments
    /// * `input` - Data to compress
    ///
    /// # Returns
    /// Compressed data as a vector.
    fn compress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Compress data into existing buffer.
    ///
    /// # Arguments
    /// * `input` - Data to compress
    /// * `output` - Buffer to write compressed data
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Calculate maximum compressed size for input length.
    /// Useful for pre-allocating output buffers.
    fn max_compressed_size(&self, input_len: usize) -> usize;

    /// Get compression statistics after operation.
    fn stats(&self) -> Option<CompressionStats> {
        None
    }
}

/// One-shot decompression operations.
pub trait Decompressor {
    /// Short name of the format consumed.
    fn name(&self) -> &'static str;

    /// Decompress data in one shot.
    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data into existing buffer.
    ///
    /// # Returns
    /// Number of bytes written to output.
    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize>;

    /// Decompress with known output size (more efficient).
    fn decompress_with_size(&self, input: &[u8], output_size: usize) -> Result<Vec<u8>> {
        let mut output = vec![0u8; output_size];
        let written = self.decompress_to(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Get decompression statistics after operation.
    fn stats(&self) -> Option<CompressionStats> {
        None
    }
}

/// Combined compression and decompression.
pub trait Codec: Compressor + Decompressor {
    /// Create a codec with the default level.
    fn new() -> Self
    where
        Self: Sized;

    /// Create a codec with a specific level.
    fn with_level(level: CompressionLevel) -> Self
    where
        Self: Sized;

    /// Compress then decompress, checking the data survives unchanged.
    fn verify_roundtrip(&self, data: &[u8]) -> Result<bool> {
        let compressed = self.compress(data)?;
        let decompressed = self.decompress(&compressed)?;
        Ok(decompressed == data)
    }

    /// Compress and report the achieved ratio.
    fn measure_ratio(&self, data: &[u8]) -> Result<CompressionRatio> {
        let compressed = self.compress(data)?;
        Ok(CompressionRatio::new(data.len(), compressed.len()))
    }
}
