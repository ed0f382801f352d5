//! Huffman tree descriptions and literal stream decoding.

use super::table::HuffmanTable;
use crate::bitstream::BackwardBitReader;
use crate::fse::{FseDecoder, FseTable};
use tessel_core::{Error, Result};

/// Largest accuracy log of the FSE table that compresses Huffman weights.
pub const HUFFMAN_WEIGHTS_MAX_LOG: u32 = 6;

/// Parse a Huffman tree description, returning the explicit weights and
/// the bytes consumed.
///
/// A header byte below 128 is the size of an FSE-compressed weight stream;
/// otherwise `header - 127` weights follow as packed nibbles.
pub fn parse_huffman_weights(data: &[u8]) -> Result<(Vec<u8>, usize)> {
    let header = *data
        .first()
        .ok_or_else(|| Error::corrupted("empty Huffman tree description"))?;

    if header >= 128 {
        let count = (header - 127) as usize;
        let packed = count.div_ceil(2);
        let bytes = data
            .get(1..1 + packed)
            .ok_or_else(|| Error::corrupted("truncated Huffman weights"))?;
        let weights = (0..count)
            .map(|i| {
                let byte = bytes[i / 2];
                if i % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            })
            .collect();
        return Ok((weights, 1 + packed));
    }

    let size = header as usize;
    let compressed = data
        .get(1..1 + size)
        .ok_or_else(|| Error::corrupted("truncated compressed Huffman weights"))?;
    Ok((decode_fse_weights(compressed)?, 1 + size))
}

/// Decode weights interleaved over two FSE states sharing one table.
fn decode_fse_weights(compressed: &[u8]) -> Result<Vec<u8>> {
    let (table, header_size) = FseTable::parse(compressed, u8::MAX, HUFFMAN_WEIGHTS_MAX_LOG)?;
    let mut reader = BackwardBitReader::new(&compressed[header_size..])?;
    let mut states = [
        FseDecoder::init(&mut reader, &table),
        FseDecoder::init(&mut reader, &table),
    ];

    let mut weights = Vec::with_capacity(255);
    let mut turn = 0;
    loop {
        if weights.len() >= 254 {
            return Err(Error::corrupted("too many Huffman weights"));
        }
        weights.push(states[turn].symbol(&table));
        states[turn].update(&mut reader, &table);
        if reader.is_overflowed() {
            weights.push(states[1 - turn].symbol(&table));
            break;
        }
        turn = 1 - turn;
    }
    Ok(weights)
}

/// Decode one Huffman stream into `out`, which must be filled exactly.
pub fn decode_stream(table: &HuffmanTable, stream: &[u8], out: &mut [u8]) -> Result<()> {
    let mut reader = BackwardBitReader::new(stream)?;
    let table_log = table.table_log();
    for byte in out.iter_mut() {
        let entry = table.decode(reader.peek_bits(table_log) as usize);
        *byte = entry.symbol;
        reader.skip_bits(entry.num_bits as u32);
    }
    if !reader.is_finished() {
        return Err(Error::corrupted("Huffman stream not fully consumed"));
    }
    Ok(())
}

/// Decode four streams preceded by their 6-byte jump table.
pub fn decode_four_streams(table: &HuffmanTable, data: &[u8], out: &mut [u8]) -> Result<()> {
    if data.len() < 6 {
        return Err(Error::corrupted("truncated Huffman jump table"));
    }
    let sizes = [
        u16::from_le_bytes([data[0], data[1]]) as usize,
        u16::from_le_bytes([data[2], data[3]]) as usize,
        u16::from_le_bytes([data[4], data[5]]) as usize,
    ];
    let streams_total = data.len() - 6;
    let first_three: usize = sizes.iter().sum();
    if first_three > streams_total {
        return Err(Error::corrupted("Huffman jump table exceeds literals"));
    }

    let regenerated = out.len();
    let segment = regenerated.div_ceil(4);
    if 3 * segment > regenerated {
        return Err(Error::corrupted("too few literals for four streams"));
    }

    let mut input = 6;
    let mut output = 0;
    for stream in 0..4 {
        let size = if stream < 3 {
            sizes[stream]
        } else {
            streams_total - first_three
        };
        let produce = if stream < 3 {
            segment
        } else {
            regenerated - 3 * segment
        };
        decode_stream(
            table,
            &data[input..input + size],
            &mut out[output..output + produce],
        )?;
        input += size;
        output += produce;
    }
    Ok(())
}
