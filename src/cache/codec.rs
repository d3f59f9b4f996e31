//! Codec Module
//!
//! JSON serialization with optional zlib compression. Compressed payloads are
//! prefixed with [`COMPRESSION_MARKER`] so decoding never needs a hint.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CacheError, Result};

/// Prefix identifying a compressed payload.
pub const COMPRESSION_MARKER: &[u8] = b"COMPRESSED:";

/// Serialized payloads at or below this size are never compressed.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Serializes a value to plain JSON bytes.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CacheError::Encode(e.to_string()))
}

/// Deserializes plain JSON bytes.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Decode(e.to_string()))
}

/// Serializes a value and, if requested and large enough, compresses it.
pub fn encode<T: Serialize + ?Sized>(value: &T, compress: bool) -> Result<Vec<u8>> {
    encode_bytes(serialize(value)?, compress)
}

/// Applies the compression rule to already-serialized bytes.
pub fn encode_bytes(serialized: Vec<u8>, compress: bool) -> Result<Vec<u8>> {
    if !compress || serialized.len() <= COMPRESSION_THRESHOLD {
        return Ok(serialized);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&serialized)
        .map_err(|e| CacheError::Encode(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CacheError::Encode(e.to_string()))?;

    let mut out = Vec::with_capacity(COMPRESSION_MARKER.len() + compressed.len());
    out.extend_from_slice(COMPRESSION_MARKER);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Strips the marker and decompresses if present; returns serialized bytes.
pub fn decode_bytes(encoded: &[u8]) -> Result<Vec<u8>> {
    match encoded.strip_prefix(COMPRESSION_MARKER) {
        Some(compressed) => {
            let mut decoder = ZlibDecoder::new(compressed);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CacheError::Decode(format!("decompression failed: {}", e)))?;
            Ok(out)
        }
        None => Ok(encoded.to_vec()),
    }
}

/// Reverses [`encode`].
pub fn decode<T: DeserializeOwned>(encoded: &[u8]) -> Result<T> {
    deserialize(&decode_bytes(encoded)?)
}

/// Whether an encoded payload carries the compression marker.
pub fn is_compressed(encoded: &[u8]) -> bool {
    encoded.starts_with(COMPRESSION_MARKER)
}
