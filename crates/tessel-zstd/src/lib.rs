//! # Tessel Zstd
//!
//! Native Rust implementation of the Zstandard block layer (RFC 8878).
//!
//! `compress` turns a buffer into a **block stream**: one or more blocks,
//! each behind a 3-byte header, the final one flagged last. There is no
//! frame around it: no magic number, no content size, no checksum. Matches
//! may reference anything produced earlier in the same call.
//!
//! ## Quick Start
//!
//! ```rust
//! use tessel_core::{Codec, Compressor, Decompressor, CompressionLevel};
//! use tessel_zstd::ZstdBlockCodec;
//!
//! let codec = ZstdBlockCodec::with_level(CompressionLevel::Best);
//! let compressed = codec.compress(b"Hello, World! Hello, World!").unwrap();
//! let original = codec.decompress(&compressed).unwrap();
//! assert_eq!(original, b"Hello, World! Hello, World!");
//!
//! // One-shot helpers with a numeric level.
//! let compressed = tessel_zstd::compress(b"aaaaaaaaaa", 3).unwrap();
//! assert_eq!(compressed, [0x53, 0x00, 0x00, b'a']);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        tessel-zstd                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  compress/          │  decompress.rs                        │
//! │  ├── params.rs      │  (block stream decoding)              │
//! │  ├── match_finder   │                                       │
//! │  ├── block.rs       │                                       │
//! │  └── sequences.rs   │                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  huffman/           │  fse/                                 │
//! │  ├── encoder.rs     │  ├── encoder.rs                       │
//! │  ├── decoder.rs     │  ├── decoder.rs                       │
//! │  └── table.rs       │  └── table.rs                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  block/             │  sequence.rs  tables.rs               │
//! │  ├── literals.rs    │  bitstream.rs bits.rs  copy.rs        │
//! │  └── sequences.rs   │                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `parallel`: encode the four Huffman literal streams on the rayon pool.
//!
//! ## References
//!
//! - [RFC 8878 - Zstandard Compression](https://datatracker.ietf.org/doc/html/rfc8878)
//! - [Zstd Format Specification](https://github.com/facebook/zstd/blob/dev/doc/zstd_compression_format.md)

pub mod bits;
pub mod bitstream;
pub mod block;
pub mod compress;
pub mod copy;
pub mod decompress;
pub mod fse;
pub mod huffman;
pub mod sequence;
pub mod tables;

pub use block::MAX_BLOCK_SIZE;
pub use compress::{CompressionContext, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
pub use decompress::{decompress_bound, DecompressionContext};

use std::sync::Mutex;

use tessel_core::{Codec, CompressionLevel, CompressionStats, Compressor, Decompressor, Result};

/// Format name reported by the codec traits.
const FORMAT_NAME: &str = "zstd-block";

/// Largest block stream `compress` can produce for `src_size` bytes.
///
/// Small inputs get extra margin so the bound also covers block headers.
pub fn compress_bound(src_size: usize) -> usize {
    let margin = if src_size < MAX_BLOCK_SIZE {
        (MAX_BLOCK_SIZE - src_size) >> 11
    } else {
        0
    };
    src_size + (src_size >> 8) + margin
}

/// Compress `src` into a new buffer.
pub fn compress(src: &[u8], level: i32) -> Result<Vec<u8>> {
    let mut dst = vec![0u8; compress_bound(src.len())];
    let written = CompressionContext::new().compress(&mut dst, src, level)?;
    dst.truncate(written);
    Ok(dst)
}

/// Decompress a block stream into a new buffer.
pub fn decompress(src: &[u8]) -> Result<Vec<u8>> {
    DecompressionContext::new().decompress_to_vec(src)
}

/// Block stream compressor.
///
/// Keeps one [`CompressionContext`] behind a mutex so buffers are reused
/// across calls; concurrent callers serialize on it.
#[derive(Debug, Default)]
pub struct ZstdBlockCompressor {
    level: CompressionLevel,
    ctx: Mutex<CompressionContext>,
}

impl ZstdBlockCompressor {
    /// Create a compressor at the default level.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compressor at `level`.
    pub fn with_level(level: CompressionLevel) -> Self {
        Self {
            level,
            ctx: Mutex::default(),
        }
    }

    /// Numeric level, `0` standing for the default.
    fn numeric_level(&self) -> Result<i32> {
        self.level.validate(0, MAX_LEVEL)
    }
}

impl Compressor for ZstdBlockCompressor {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn level(&self) -> CompressionLevel {
        self.level
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut output = vec![0u8; compress_bound(input.len())];
        let written = self.compress_to(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let level = self.numeric_level()?;
        let mut ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        ctx.compress(output, input, level)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        compress_bound(input_len)
    }

    fn stats(&self) -> Option<CompressionStats> {
        let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        Some(ctx.stats().clone())
    }
}

/// Block stream decompressor.
#[derive(Debug, Default)]
pub struct ZstdBlockDecompressor {
    ctx: Mutex<DecompressionContext>,
}

impl ZstdBlockDecompressor {
    /// Create a decompressor.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decompressor for ZstdBlockDecompressor {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        let mut ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        ctx.decompress_to_vec(input)
    }

    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        let mut ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        ctx.decompress(output, input)
    }

    fn stats(&self) -> Option<CompressionStats> {
        let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        Some(ctx.stats().clone())
    }
}

/// Block stream codec combining compression and decompression.
#[derive(Debug, Default)]
pub struct ZstdBlockCodec {
    compressor: ZstdBlockCompressor,
    decompressor: ZstdBlockDecompressor,
}

impl Compressor for ZstdBlockCodec {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn level(&self) -> CompressionLevel {
        self.compressor.level()
    }

    fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.compressor.compress(input)
    }

    fn compress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.compressor.compress_to(input, output)
    }

    fn max_compressed_size(&self, input_len: usize) -> usize {
        compress_bound(input_len)
    }

    fn stats(&self) -> Option<CompressionStats> {
        Compressor::stats(&self.compressor)
    }
}

impl Decompressor for ZstdBlockCodec {
    fn name(&self) -> &'static str {
        FORMAT_NAME
    }

    fn decompress(&self, input: &[u8]) -> Result<Vec<u8>> {
        self.decompressor.decompress(input)
    }

    fn decompress_to(&self, input: &[u8], output: &mut [u8]) -> Result<usize> {
        self.decompressor.decompress_to(input, output)
    }

    fn stats(&self) -> Option<CompressionStats> {
        Decompressor::stats(&self.decompressor)
    }
}

impl Codec for ZstdBlockCodec {
    fn new() -> Self {
        Self::default()
    }

    fn with_level(level: CompressionLevel) -> Self {
        Self {
            compressor: ZstdBlockCompressor::with_level(level),
            decompressor: ZstdBlockDecompressor::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_core::Error;

    #[test]
    fn test_compress_bound() {
        assert_eq!(compress_bound(0), 64);
        assert_eq!(compress_bound(1), 1 + 63);
        assert_eq!(compress_bound(MAX_BLOCK_SIZE), MAX_BLOCK_SIZE + 512);
        assert_eq!(compress_bound(1 << 20), (1 << 20) + (1 << 12));
    }

    #[test]
    fn test_one_shot_round_trip() {
        let data = b"one shot, one shot, one shot, one shot".repeat(50);
        let compressed = compress(&data, 0).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn test_one_shot_empty() {
        let compressed = compress(&[], 3).unwrap();
        assert_eq!(compressed, [0x01, 0x00, 0x00]);
        assert!(decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(&[]).is_err());
        assert!(decompress(&[0x07, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_decompress_empty_compressed_blocks() {
        let empty_block = [0x14, 0x00, 0x00, 0x00, 0x00];
        let mut src = empty_block.repeat(50_000);
        let last = src.len() - empty_block.len();
        src[last] = 0x15;

        assert!(decompress(&src).unwrap().is_empty());
        assert!(ZstdBlockDecompressor::new().decompress(&src).unwrap().is_empty());
    }

    #[test]
    fn test_codec_levels() {
        let data = b"The quick brown fox jumps over the lazy dog. ".repeat(100);
        for level in [
            CompressionLevel::Fast,
            CompressionLevel::Default,
            CompressionLevel::Best,
            CompressionLevel::Ultra,
            CompressionLevel::Custom(0),
            CompressionLevel::Custom(22),
        ] {
            let codec = ZstdBlockCodec::with_level(level);
            assert_eq!(Compressor::name(&codec), "zstd-block");
            assert!(codec.verify_roundtrip(&data).unwrap(), "{level:?}");
            assert!(codec.measure_ratio(&data).unwrap().is_effective());
        }
    }

    #[test]
    fn test_codec_rejects_out_of_range_level() {
        let codec = ZstdBlockCodec::with_level(CompressionLevel::Custom(23));
        let err = codec.compress(b"data").unwrap_err();
        assert!(matches!(err, Error::InvalidLevel { level: 23, .. }));

        let codec = ZstdBlockCodec::with_level(CompressionLevel::Custom(-1));
        assert!(codec.compress(b"data").is_err());
    }

    #[test]
    fn test_compressor_stats() {
        let compressor = ZstdBlockCompressor::new();
        let data = vec![b'z'; 300_000];
        let compressed = compressor.compress(&data).unwrap();
        let stats = Compressor::stats(&compressor).unwrap();
        assert_eq!(stats.rle_blocks, 3);
        assert_eq!(stats.compressed_size, compressed.len());
        assert_eq!(compressed.len(), 3 * 4);

        let decompressor = ZstdBlockDecompressor::new();
        assert_eq!(decompressor.decompress(&compressed).unwrap(), data);
        let stats = Decompressor::stats(&decompressor).unwrap();
        assert_eq!(stats.original_size, data.len());
        assert_eq!(stats.rle_blocks, 3);
    }

    #[test]
    fn test_decompress_to_too_small() {
        let codec = ZstdBlockCodec::new();
        let compressed = codec.compress(&[7u8; 1000]).unwrap();
        let mut output = [0u8; 10];
        let err = codec.decompress_to(&compressed, &mut output).unwrap_err();
        assert!(matches!(
            err,
            Error::DestinationTooSmall {
                required: 1000,
                provided: 10
            }
        ));

        assert_eq!(
            codec.decompress_with_size(&compressed, 1000).unwrap(),
            vec![7u8; 1000]
        );
    }

    #[test]
    fn test_contexts_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<CompressionContext>();
        assert_send::<DecompressionContext>();
        fn assert_sync<T: Sync>() {}
        assert_sync::<ZstdBlockCodec>();
    }
}
