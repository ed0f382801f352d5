//! Block stream compression.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Input Data
//!     │  split into 128 KiB blocks
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  RLE check                          │
//! │  - every byte equal → RLE block     │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Match Finding (LZ77)               │
//! │  - repeat offsets first             │
//! │  - hash chain search                │
//! │  - greedy or lazy parsing           │
//! └─────────────────────────────────────┘
//!     │  sequence store
//!     ▼
//! ┌─────────────────────────────────────┐
//! │  Block Encoding                     │
//! │  - Literals (Raw/RLE/Huffman/reuse) │
//! │  - Sequences (FSE table per field)  │
//! └─────────────────────────────────────┘
//!     │
//!     ▼
//! Compressed block, or raw block when that is not smaller
//! ```
//!
//! The match finder's tables span the whole call, so matches may reach into
//! earlier blocks. Repeat offsets and entropy tables also carry from one
//! block to the next; a block stored raw leaves them as they were before it,
//! since the decoder never sees the state that block would have produced.

mod block;
mod match_finder;
pub mod params;
mod sequences;

pub use block::{encode_literals, BlockEncoder, EntropyState};
pub use match_finder::{Match, MatchFinder, MIN_MATCH_LENGTH};
pub use params::{clamp_level, LevelParams, DEFAULT_LEVEL, MAX_LEVEL, MIN_LEVEL};
pub use sequences::{SequenceEncoder, SequenceEntropy};

use tessel_core::{CompressionStats, Error, Result};
use tracing::{debug, trace};

use crate::block::{BlockHeader, BlockType, BLOCK_HEADER_SIZE, MAX_BLOCK_SIZE};
use crate::sequence::{RepeatOffsets, SequenceStore};

/// Reusable compression context.
///
/// Owns the hash chains, sequence store and scratch buffers so repeated
/// calls do not reallocate. A context serves one call at a time; use one
/// context per thread.
#[derive(Debug, Default)]
pub struct CompressionContext {
    finder: MatchFinder,
    store: SequenceStore,
    reps: RepeatOffsets,
    entropy: EntropyState,
    encoder: BlockEncoder,
    /// Compressed block body before it is known to beat a raw block.
    scratch: Vec<u8>,
    stats: CompressionStats,
}

impl CompressionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-call state, keeping buffer capacity.
    pub fn reset(&mut self) {
        trace!("resetting compression context");
        self.store.reset();
        self.reps = RepeatOffsets::new();
        self.entropy.reset();
        self.scratch.clear();
        self.stats = CompressionStats::new();
    }

    /// Statistics of the last call.
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Compress `src` into `dst` as a block stream, returning the bytes
    /// written.
    ///
    /// `level` is clamped with [`clamp_level`]. Fails with
    /// `DestinationTooSmall` when the output does not fit; a destination of
    /// [`compress_bound`](crate::compress_bound) bytes always suffices.
    pub fn compress(&mut self, dst: &mut [u8], src: &[u8], level: i32) -> Result<usize> {
        if src.len() >= u32::MAX as usize {
            return Err(Error::PreconditionViolated(
                "input must be smaller than 4 GiB",
            ));
        }
        self.reset();
        self.finder.reset(LevelParams::for_level(level), src.len());
        debug!(
            level = clamp_level(level),
            input = src.len(),
            "compressing block stream"
        );

        let written = if src.is_empty() {
            self.stats.raw_blocks += 1;
            let header = BlockHeader {
                last: true,
                block_type: BlockType::Raw,
                size: 0,
            };
            emit(dst, 0, header, &[])?
        } else {
            let mut op = 0;
            for (index, start) in (0..src.len()).step_by(MAX_BLOCK_SIZE).enumerate() {
                let end = (start + MAX_BLOCK_SIZE).min(src.len());
                op += self.compress_block(src, start, end, dst, op, index)?;
            }
            op
        };

        self.stats.original_size = src.len();
        self.stats.compressed_size = written;
        Ok(written)
    }

    fn compress_block(
        &mut self,
        src: &[u8],
        start: usize,
        end: usize,
        dst: &mut [u8],
        op: usize,
        index: usize,
    ) -> Result<usize> {
        let block = &src[start..end];
        let last = end == src.len();

        if block.len() > 1 && block.iter().all(|&b| b == block[0]) {
            debug!(block = index, size = block.len(), "rle block");
            self.stats.rle_blocks += 1;
            let header = BlockHeader {
                last,
                block_type: BlockType::Rle,
                size: block.len(),
            };
            return emit(dst, op, header, &block[..1]);
        }

        let saved_reps = self.reps;
        let saved_entropy = self.entropy.clone();

        self.store.reset();
        self.finder
            .compress_block(src, start, end, &mut self.reps, &mut self.store)?;
        self.scratch.clear();
        self.encoder
            .encode(&self.store, &mut self.entropy, &mut self.scratch)?;

        if self.scratch.len() < block.len() {
            debug!(
                block = index,
                size = block.len(),
                compressed = self.scratch.len(),
                sequences = self.store.len(),
                "compressed block"
            );
            self.stats.compressed_blocks += 1;
            self.stats.sequences += self.store.len();
            let header = BlockHeader {
                last,
                block_type: BlockType::Compressed,
                size: self.scratch.len(),
            };
            return emit(dst, op, header, &self.scratch);
        }

        debug!(
            block = index,
            size = block.len(),
            compressed = self.scratch.len(),
            "raw block"
        );
        self.reps = saved_reps;
        self.entropy = saved_entropy;
        self.stats.raw_blocks += 1;
        let header = BlockHeader {
            last,
            block_type: BlockType::Raw,
            size: block.len(),
        };
        emit(dst, op, header, block)
    }
}

/// Write a block header and its content at `dst[op..]`.
fn emit(dst: &mut [u8], op: usize, header: BlockHeader, content: &[u8]) -> Result<usize> {
    let size = BLOCK_HEADER_SIZE + content.len();
    let end = op + size;
    if end > dst.len() {
        return Err(Error::destination_too_small(end, dst.len()));
    }
    dst[op..op + BLOCK_HEADER_SIZE].copy_from_slice(&header.to_bytes());
    dst[op + BLOCK_HEADER_SIZE..end].copy_from_slice(content);
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress_bound;
    use crate::decompress::DecompressionContext;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;

    fn compress(src: &[u8], level: i32) -> Vec<u8> {
        let mut ctx = CompressionContext::new();
        let mut dst = vec![0u8; compress_bound(src.len())];
        let written = ctx.compress(&mut dst, src, level).unwrap();
        dst.truncate(written);
        dst
    }

    fn round_trip(src: &[u8], level: i32) -> Vec<u8> {
        let compressed = compress(src, level);
        let mut out = vec![0u8; src.len()];
        let written = DecompressionContext::new()
            .decompress(&mut out, &compressed)
            .unwrap();
        assert_eq!(written, src.len());
        assert_eq!(out, src, "level {level}");
        compressed
    }

    fn text(len: usize) -> Vec<u8> {
        let words = ["alpha ", "beta ", "gamma ", "delta ", "epsilon ", "zeta\n"];
        let mut rng = StdRng::seed_from_u64(7);
        let mut out = Vec::with_capacity(len + 16);
        while out.len() < len {
            out.extend_from_slice(words[rng.gen_range(0..words.len())].as_bytes());
        }
        out.truncate(len);
        out
    }

    fn noise(len: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(compress(&[], 3), vec![0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_rle_block() {
        assert_eq!(compress(b"aaaaaaaaaa", 3), vec![0x53, 0x00, 0x00, b'a']);
    }

    #[test]
    fn test_single_byte_is_raw() {
        assert_eq!(compress(b"x", 3), vec![0x09, 0x00, 0x00, b'x']);
    }

    #[test]
    fn test_text_round_trip_all_levels() {
        let src = text(20_000);
        for level in [-3, 0, 1, 3, 5, 9, 15, 22, 40] {
            let compressed = round_trip(&src, level);
            assert!(compressed.len() < src.len() / 2, "level {level}");
        }
    }

    #[test]
    fn test_multi_block_stats() {
        let src = text(300_000);
        let mut ctx = CompressionContext::new();
        let mut dst = vec![0u8; compress_bound(src.len())];
        let written = ctx.compress(&mut dst, &src, 3).unwrap();
        let stats = ctx.stats();
        assert_eq!(stats.blocks_processed(), 3);
        assert_eq!(stats.compressed_blocks, 3);
        assert_eq!(stats.original_size, src.len());
        assert_eq!(stats.compressed_size, written);
        assert!(stats.sequences > 0);
        round_trip(&src, 3);
    }

    #[test]
    fn test_incompressible_falls_back_to_raw() {
        let src = noise(200_000, 1);
        let compressed = round_trip(&src, 3);
        assert_eq!(compressed.len(), src.len() + 2 * BLOCK_HEADER_SIZE);
    }

    #[test]
    fn test_state_survives_raw_fallback() {
        let mut src = text(MAX_BLOCK_SIZE);
        src.extend_from_slice(&noise(MAX_BLOCK_SIZE, 2));
        src.extend_from_slice(&text(MAX_BLOCK_SIZE));
        src.extend_from_slice(&[0u8; 5000]);
        src.extend_from_slice(&text(10_000));

        let mut ctx = CompressionContext::new();
        let mut dst = vec![0u8; compress_bound(src.len())];
        let written = ctx.compress(&mut dst, &src, 5).unwrap();
        assert_eq!(ctx.stats().raw_blocks, 1);

        let mut out = vec![0u8; src.len()];
        let produced = DecompressionContext::new()
            .decompress(&mut out, &dst[..written])
            .unwrap();
        assert_eq!(produced, src.len());
        assert_eq!(out, src);
    }

    #[test]
    fn test_destination_too_small() {
        let src = text(1000);
        let mut ctx = CompressionContext::new();
        let mut dst = [0u8; 8];
        let err = ctx.compress(&mut dst, &src, 3).unwrap_err();
        assert!(matches!(err, Error::DestinationTooSmall { .. }));
        assert!(err.is_recoverable());

        let mut empty = [0u8; 2];
        assert!(ctx.compress(&mut empty, &[], 3).is_err());
    }

    #[test]
    fn test_context_reuse_is_deterministic() {
        let a = text(50_000);
        let b = noise(3000, 3);
        let mut ctx = CompressionContext::new();
        let mut first = vec![0u8; compress_bound(a.len())];
        let n1 = ctx.compress(&mut first, &a, 6).unwrap();
        let mut other = vec![0u8; compress_bound(b.len())];
        ctx.compress(&mut other, &b, 1).unwrap();
        let mut second = vec![0u8; compress_bound(a.len())];
        let n2 = ctx.compress(&mut second, &a, 6).unwrap();
        assert_eq!(&first[..n1], &second[..n2]);
    }
}
