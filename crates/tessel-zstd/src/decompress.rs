//! Block stream decompression.
//!
//! A block stream is a sequence of blocks, the final one flagged `last`.
//! Matches may reach back into anything produced earlier in the same call.

use tessel_core::{CompressionStats, Error, Result};
use tracing::{debug, trace};

use crate::block::{BlockDecoder, BlockHeader, BlockType, BLOCK_HEADER_SIZE, MAX_BLOCK_SIZE};
use crate::copy::WILDCOPY_OVERLENGTH;

/// Reusable decompression context.
///
/// Owns the literal and sequence buffers and the entropy tables carried
/// between blocks. A context serves one call at a time.
#[derive(Debug, Default)]
pub struct DecompressionContext {
    blocks: BlockDecoder,
    stats: CompressionStats,
}

impl DecompressionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear entropy state and statistics, keeping buffer capacity.
    pub fn reset(&mut self) {
        trace!("resetting decompression context");
        self.blocks.reset();
        self.stats = CompressionStats::new();
    }

    /// Statistics of the last call.
    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Decompress a block stream into `dst`, returning the bytes written.
    ///
    /// Fails with `CorruptedData` on malformed input and with
    /// `DestinationTooSmall` when the regenerated data does not fit. After a
    /// failure the contents of `dst` are unspecified.
    pub fn decompress(&mut self, dst: &mut [u8], src: &[u8]) -> Result<usize> {
        self.decode_stream(src, Output::Fixed(dst))
    }

    /// Decompress a block stream into a new vector.
    ///
    /// The output grows as blocks are decoded, so memory follows what the
    /// stream regenerates rather than the worst case its headers allow.
    pub fn decompress_to_vec(&mut self, src: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let written = self.decode_stream(src, Output::Growing(&mut out))?;
        out.truncate(written);
        Ok(out)
    }

    fn decode_stream(&mut self, src: &[u8], mut output: Output<'_>) -> Result<usize> {
        self.reset();

        let mut ip = 0usize;
        let mut op = 0usize;
        let mut index = 0usize;
        loop {
            let (header, produced) = self
                .decode_block(src, ip, &mut output, op)
                .map_err(|err| {
                    debug!(block = index, input_offset = ip, error = %err, "block decoding failed");
                    err
                })?;
            ip += BLOCK_HEADER_SIZE + header.content_size();
            op += produced;
            index += 1;
            if header.last {
                break;
            }
        }

        if ip != src.len() {
            return Err(Error::corrupted_at("data after the last block", ip));
        }

        self.stats.original_size = op;
        self.stats.compressed_size = src.len();
        Ok(op)
    }

    fn decode_block(
        &mut self,
        src: &[u8],
        ip: usize,
        output: &mut Output<'_>,
        op: usize,
    ) -> Result<(BlockHeader, usize)> {
        let header = BlockHeader::parse(&src[ip..])?;
        let start = ip + BLOCK_HEADER_SIZE;
        let content = src
            .get(start..start + header.content_size())
            .ok_or_else(|| Error::corrupted_at("truncated block", start))?;
        let dst = output.window(op, regenerated_limit(&header));

        let produced = match header.block_type {
            BlockType::Raw => {
                let end = reserve(dst, op, header.size)?;
                dst[op..end].copy_from_slice(content);
                self.stats.raw_blocks += 1;
                header.size
            }
            BlockType::Rle => {
                let end = reserve(dst, op, header.size)?;
                dst[op..end].fill(content[0]);
                self.stats.rle_blocks += 1;
                header.size
            }
            BlockType::Compressed => {
                let produced = self.blocks.decode_compressed(content, dst, op)?;
                self.stats.compressed_blocks += 1;
                self.stats.sequences += self.blocks.last_sequence_count();
                produced
            }
        };

        trace!(
            block_type = ?header.block_type,
            size = header.size,
            produced,
            last = header.last,
            "decoded block"
        );
        Ok((header, produced))
    }
}

/// Destination of a decoding call.
enum Output<'a> {
    /// Caller-provided buffer; overflow is `DestinationTooSmall`.
    Fixed(&'a mut [u8]),
    /// Vector extended before each block; its length only grows, and bytes
    /// past the written position are scratch.
    Growing(&'a mut Vec<u8>),
}

impl Output<'_> {
    /// Buffer able to hold `limit` more bytes at `op` when growing.
    fn window(&mut self, op: usize, limit: usize) -> &mut [u8] {
        match self {
            Output::Fixed(dst) => &mut dst[..],
            Output::Growing(out) => {
                let wanted = op + limit + WILDCOPY_OVERLENGTH;
                if out.len() < wanted {
                    out.resize(wanted, 0);
                }
                out.as_mut_slice()
            }
        }
    }
}

fn reserve(dst: &[u8], op: usize, size: usize) -> Result<usize> {
    let end = op + size;
    if end > dst.len() {
        return Err(Error::destination_too_small(end, dst.len()));
    }
    Ok(end)
}

/// Most bytes a block can regenerate: raw and RLE blocks exactly their
/// size, compressed blocks up to the block maximum.
fn regenerated_limit(header: &BlockHeader) -> usize {
    match header.block_type {
        BlockType::Raw | BlockType::Rle => header.size,
        BlockType::Compressed => MAX_BLOCK_SIZE,
    }
}

/// Upper bound of the size regenerated by a block stream.
///
/// Raw and RLE blocks count exactly, compressed blocks as the block
/// maximum, so the bound can exceed the real size by far for streams of
/// small compressed blocks; [`DecompressionContext::decompress_to_vec`]
/// does not depend on it. Fails when the block headers themselves are
/// malformed or the bound overflows `usize`.
pub fn decompress_bound(src: &[u8]) -> Result<usize> {
    let mut ip = 0usize;
    let mut bound = 0usize;
    loop {
        let header = BlockHeader::parse(&src[ip.min(src.len())..])?;
        ip += BLOCK_HEADER_SIZE + header.content_size();
        if ip > src.len() {
            return Err(Error::corrupted("truncated block"));
        }
        bound = bound
            .checked_add(regenerated_limit(&header))
            .ok_or_else(|| Error::corrupted("regenerated size overflows"))?;
        if header.last {
            return Ok(bound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(last: bool, block_type: BlockType, size: usize) -> [u8; 3] {
        BlockHeader {
            last,
            block_type,
            size,
        }
        .to_bytes()
    }

    #[test]
    fn test_raw_and_rle_blocks() {
        let mut src = Vec::new();
        src.extend_from_slice(&header(false, BlockType::Raw, 5));
        src.extend_from_slice(b"hello");
        src.extend_from_slice(&header(true, BlockType::Rle, 4));
        src.push(b'!');

        let mut ctx = DecompressionContext::new();
        let mut dst = vec![0u8; 16];
        let written = ctx.decompress(&mut dst, &src).unwrap();
        assert_eq!(&dst[..written], b"hello!!!!");
        assert_eq!(ctx.stats().raw_blocks, 1);
        assert_eq!(ctx.stats().rle_blocks, 1);
        assert_eq!(decompress_bound(&src).unwrap(), 9);
    }

    #[test]
    fn test_empty_compressed_blocks_regenerate_nothing() {
        let mut src = Vec::new();
        for i in 0..10_000 {
            src.extend_from_slice(&header(i == 9_999, BlockType::Compressed, 2));
            src.extend_from_slice(&[0x00, 0x00]);
        }

        let mut ctx = DecompressionContext::new();
        let out = ctx.decompress_to_vec(&src).unwrap();
        assert!(out.is_empty());
        assert_eq!(ctx.stats().compressed_blocks, 10_000);
        assert!(out.capacity() <= 2 * (MAX_BLOCK_SIZE + WILDCOPY_OVERLENGTH));

        let mut dst = [0u8; 0];
        assert_eq!(ctx.decompress(&mut dst, &src).unwrap(), 0);
        assert_eq!(decompress_bound(&src).unwrap(), 10_000 * MAX_BLOCK_SIZE);
    }

    #[test]
    fn test_growing_output_matches_fixed() {
        let mut src = Vec::new();
        src.extend_from_slice(&header(false, BlockType::Rle, 70_000));
        src.push(b'z');
        src.extend_from_slice(&header(false, BlockType::Compressed, 2));
        src.extend_from_slice(&[0x00, 0x00]);
        src.extend_from_slice(&header(true, BlockType::Raw, 3));
        src.extend_from_slice(b"end");

        let grown = DecompressionContext::new().decompress_to_vec(&src).unwrap();
        let mut fixed = vec![0u8; 70_003];
        let written = DecompressionContext::new().decompress(&mut fixed, &src).unwrap();
        assert_eq!(written, 70_003);
        assert_eq!(grown, fixed);
    }

    #[test]
    fn test_destination_too_small() {
        let mut src = header(true, BlockType::Rle, 100).to_vec();
        src.push(0);
        let mut dst = vec![0u8; 10];
        let err = DecompressionContext::new().decompress(&mut dst, &src).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_last_block() {
        let mut src = header(false, BlockType::Raw, 2).to_vec();
        src.extend_from_slice(b"ab");
        let mut dst = vec![0u8; 16];
        let err = DecompressionContext::new().decompress(&mut dst, &src).unwrap_err();
        assert!(matches!(err, Error::CorruptedData { .. }));
        assert!(decompress_bound(&src).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut src = header(true, BlockType::Raw, 1).to_vec();
        src.extend_from_slice(b"ab");
        let mut dst = vec![0u8; 16];
        assert!(DecompressionContext::new().decompress(&mut dst, &src).is_err());
    }

    #[test]
    fn test_truncated_raw_block() {
        let mut src = header(true, BlockType::Raw, 10).to_vec();
        src.extend_from_slice(b"abc");
        let mut dst = vec![0u8; 16];
        assert!(DecompressionContext::new().decompress(&mut dst, &src).is_err());
    }

    #[test]
    fn test_empty_input_rejected() {
        let mut dst = [0u8; 4];
        assert!(DecompressionContext::new().decompress(&mut dst, &[]).is_err());
    }
}
