//! # Tessel Core
//!
//! Shared error type, level presets, codec traits and statistics for the
//! Tessel block compression engine.
//!
//! ## Core Traits
//!
//! - [`Compressor`] - One-shot compression operations
//! - [`Decompressor`] - One-shot decompression operations
//! - [`Codec`] - Combined compress/decompress capability
//!
//! ## Example
//!
//! ```ignore
//! use tessel_core::{Codec, CompressionLevel};
//! use tessel_zstd::ZstdBlockCodec;
//!
//! let codec = ZstdBlockCodec::with_level(CompressionLevel::Fast);
//! let compressed = codec.compress(data)?;
//! let original = codec.decompress(&compressed)?;
//! ```

pub mod error;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use stats::CompressionStats;
pub use traits::{Codec, Compressor, Decompressor};
pub use types::{CompressionLevel, CompressionRatio};
