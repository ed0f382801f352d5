//! Huffman coding for literals.
//!
//! Literals use canonical prefix codes of at most 11 bits. The tree is
//! transmitted as one weight per symbol, the last one implied, either as
//! packed nibbles or FSE-compressed.
//!
//! ## References
//!
//! - [RFC 8878 Section 4.2](https://datatracker.ietf.org/doc/html/rfc8878#section-4.2)

mod decoder;
mod encoder;
mod table;

pub use decoder::{decode_four_streams, decode_stream, parse_huffman_weights, HUFFMAN_WEIGHTS_MAX_LOG};
pub use encoder::{HuffmanCode, HuffmanEncoder};
pub use table::{HuffmanTable, HuffmanTableEntry};

/// Maximum length of a Huffman code.
pub const HUFFMAN_MAX_BITS: u32 = 11;
