//! Block decompression for Unity containers
//!
//! Bundles store their blocks as raw LZMA (5 property bytes followed by the
//! stream), raw LZ4/LZ4HC blocks, or uncompressed. Web data may be wrapped in
//! gzip or brotli as a whole.

use std::io::Read;

use crate::error::{Error, Result};

/// Compression type stored in the low bits of bundle block flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCompression {
    None,
    Lzma,
    Lz4,
    Lz4Hc,
}

impl BlockCompression {
    /// Decode the compression type from a flags word.
    pub fn from_flags(flags: u32) -> Result<Self> {
        match flags & 0x3F {
            0 => Ok(Self::None),
            1 => Ok(Self::Lzma),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::Lz4Hc),
            other => Err(Error::UnsupportedCompression(other)),
        }
    }
}

/// Decompress one block to exactly `uncompressed_size` bytes.
pub fn decompress_block(
    data: &[u8],
    compression: BlockCompression,
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    let out = match compression {
        BlockCompression::None => data.to_vec(),
        BlockCompression::Lzma => decompress_lzma(data, uncompressed_size)?,
        BlockCompression::Lz4 | BlockCompression::Lz4Hc => decompress_lz4(data, uncompressed_size)?,
    };
    if out.len() != uncompressed_size {
        return Err(Error::DecompressedSizeMismatch {
            expected: uncompressed_size,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Decompress a raw LZ4 block.
pub fn decompress_lz4(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    lz4_flex::block::decompress(data, uncompressed_size).map_err(|e| Error::Lz4DecompressionFailed {
        message: e.to_string(),
    })
}

/// Decompress raw LZMA data: 5 property bytes, then the compressed stream.
///
/// xz2 only understands the `.lzma` container, which adds an 8-byte
/// little-endian size after the properties, so the header is rebuilt.
pub fn decompress_lzma(data: &[u8], uncompressed_size: usize) -> Result<Vec<u8>> {
    if data.len() < 5 {
        return Err(Error::LzmaDecompressionFailed {
            message: format!("stream of {} bytes has no property header", data.len()),
        });
    }
    let mut stream = Vec::with_capacity(data.len() + 8);
    stream.extend_from_slice(&data[..5]);
    stream.extend_from_slice(&(uncompressed_size as u64).to_le_bytes());
    stream.extend_from_slice(&data[5..]);

    let decoder = xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(|e| {
        Error::LzmaDecompressionFailed {
            message: e.to_string(),
        }
    })?;
    let mut reader = xz2::read::XzDecoder::new_stream(stream.as_slice(), decoder);
    let mut out = Vec::with_capacity(uncompressed_size);
    reader
        .read_to_end(&mut out)
        .map_err(|e| Error::LzmaDecompressionFailed {
            message: e.to_string(),
        })?;
    Ok(out)
}

/// Decompress a complete `.lzma` stream (properties, 8-byte size, data) as
/// used by legacy `UnityWeb` bundles. Output beyond `limit` bytes is an error.
pub fn decompress_lzma_alone(data: &[u8], limit: u64) -> Result<Vec<u8>> {
    let decoder = xz2::stream::Stream::new_lzma_decoder(u64::MAX).map_err(|e| {
        Error::LzmaDecompressionFailed {
            message: e.to_string(),
        }
    })?;
    let mut out = Vec::new();
    xz2::read::XzDecoder::new_stream(data, decoder)
        .take(limit.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| Error::LzmaDecompressionFailed {
            message: e.to_string(),
        })?;
    if out.len() as u64 > limit {
        return Err(Error::InvalidBundle(format!("decompressed data exceeds limit {limit}")));
    }
    Ok(out)
}

/// Compress with LZMA into the raw layout Unity expects (properties + stream).
#[cfg(test)]
pub(crate) fn compress_lzma(data: &[u8]) -> Vec<u8> {
    let alone = compress_lzma_alone(data);
    // drop the 8-byte size field of the .lzma header
    let mut raw = alone[..5].to_vec();
    raw.extend_from_slice(&alone[13..]);
    raw
}

/// Compress into a complete `.lzma` stream.
#[cfg(test)]
pub(crate) fn compress_lzma_alone(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let options = xz2::stream::LzmaOptions::new_preset(6).unwrap();
    let stream = xz2::stream::Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = xz2::write::XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Transport encoding of a web data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebEncoding {
    Plain,
    Gzip,
    Brotli,
}

pub(crate) const BROTLI_MARKER: &[u8] = b"UnityWeb Compressed Content (brotli)";
pub(crate) const BROTLI_MARKER_OFFSET: usize = 0x20;

/// Detect a gzip or brotli wrapper around a stream.
pub fn sniff_encoding(data: &[u8]) -> WebEncoding {
    if data.starts_with(&[0x1F, 0x8B]) {
        WebEncoding::Gzip
    } else if data
        .get(BROTLI_MARKER_OFFSET..BROTLI_MARKER_OFFSET + BROTLI_MARKER.len())
        .is_some_and(|marker| marker == BROTLI_MARKER)
    {
        WebEncoding::Brotli
    } else {
        WebEncoding::Plain
    }
}

/// Strip the transport encoding of a web data stream. Output beyond `limit`
/// bytes is an error.
pub fn decode_web(data: &[u8], encoding: WebEncoding, limit: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let bounded = limit.saturating_add(1);
    match encoding {
        WebEncoding::Plain => out.extend_from_slice(data),
        WebEncoding::Gzip => {
            flate2::read::GzDecoder::new(data)
                .take(bounded)
                .read_to_end(&mut out)
                .map_err(|e| Error::InvalidWebData(format!("gzip: {e}")))?;
        }
        WebEncoding::Brotli => {
            brotli::Decompressor::new(data, 4096)
                .take(bounded)
                .read_to_end(&mut out)
                .map_err(|e| Error::InvalidWebData(format!("brotli: {e}")))?;
        }
    }
    if out.len() as u64 > limit {
        return Err(Error::InvalidWebData(format!("decoded data exceeds limit {limit}")));
    }
    Ok(out)
}
