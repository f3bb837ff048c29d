//! Compression for segment payloads
//!
//! Provides LZ4 and Zstd compression for stored segment bytes.
//! The engine never decides on its own whether to compress: callers pick
//! per segment, and the method used is recorded next to the stored bytes.
//!
//! **Design**:
//! - Method byte persisted in every record: 0 = none, 1 = lz4, 2 = zstd
//! - LZ4 output carries its decompressed size as a prefix
//! - Decompression is bounded by the payload length recorded in the record,
//!   so a crafted stream cannot expand past what the record claims

use crate::error::{DamdError, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// Zstd level used by default
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Compression method for segment payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum CompressionMethod {
    /// No compression
    None = 0,
    /// LZ4 compression (fast, moderate ratio)
    Lz4 = 1,
    /// Zstd compression (slower, better ratio)
    Zstd = 2,
}

impl CompressionMethod {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CompressionMethod::None),
            1 => Some(CompressionMethod::Lz4),
            2 => Some(CompressionMethod::Zstd),
            _ => None,
        }
    }

    pub fn is_compressed(self) -> bool {
        self != CompressionMethod::None
    }
}

/// Compress data using the specified method
///
/// `level` is only meaningful for Zstd.
pub fn compress(data: &[u8], method: CompressionMethod, level: i32) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionMethod::Zstd => zstd::stream::encode_all(data, level)
            .map_err(|e| DamdError::Compression(format!("Zstd compression failed: {}", e))),
    }
}

/// Decompress data using the specified method
///
/// Output longer than `expected_len` is an error, and decoding stops as soon
/// as the bound is crossed.
pub fn decompress(
    data: &[u8],
    method: CompressionMethod,
    expected_len: u64,
) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Lz4 => {
            let lz4_err = |e: lz4_flex::block::DecompressError| {
                DamdError::Compression(format!("LZ4 decompression failed: {}", e))
            };
            let (prefix, _) = lz4_flex::block::uncompressed_size(data).map_err(lz4_err)?;
            if prefix as u64 != expected_len {
                return Err(DamdError::Compression(format!(
                    "LZ4 stream claims {} bytes, record expects {}",
                    prefix, expected_len
                )));
            }
            lz4_flex::decompress_size_prepended(data).map_err(lz4_err)
        }
        CompressionMethod::Zstd => {
            let zstd_err = |e: std::io::Error| {
                DamdError::Compression(format!("Zstd decompression failed: {}", e))
            };
            let decoder = zstd::stream::read::Decoder::new(data).map_err(zstd_err)?;
            let mut out = Vec::new();
            decoder
                .take(expected_len.saturating_add(1))
                .read_to_end(&mut out)
                .map_err(zstd_err)?;
            if out.len() as u64 > expected_len {
                return Err(DamdError::Compression(format!(
                    "Zstd stream expands past the expected {} bytes",
                    expected_len
                )));
            }
            Ok(out)
        }
    }
}
