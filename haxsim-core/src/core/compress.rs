//! Raw Deflate
//!
//! Headerless deflate streams (zlib `wbits = -15`), used for stadium payloads,
//! snapshots and replay bodies.

use std::io::{Read, Write};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::codec::CodecError;

/// Compress `data` into a raw deflate stream.
pub fn deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data).map_err(|e| CodecError::Deflate(e.to_string()))?;
    encoder.finish().map_err(|e| CodecError::Deflate(e.to_string()))
}

/// Decompress a raw deflate stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 3);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Inflate(e.to_string()))?;
    Ok(out)
}
