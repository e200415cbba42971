//! Texture pixel decoding - Block Compression (BC) decompression using bcdec_rs
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0

#![allow(clippy::cast_possible_truncation)]

use image::RgbaImage;

use crate::error::{Error, Result};
use crate::objects::{TextureFormat, TextureRecord};

/// Turns a texture's first mip into an RGBA image.
pub trait TextureCodec {
    /// Decode `data` (the texture's pixel bytes) for `texture`.
    ///
    /// # Errors
    /// Returns an error if the format is unsupported or the data is short.
    fn decode(&self, texture: &TextureRecord, data: &[u8]) -> Result<RgbaImage>;
}

/// Default codec: common uncompressed layouts plus DXT/BC via `bcdec_rs`.
///
/// Unity stores rows bottom-up, so the result is flipped vertically.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockTextureCodec;

impl TextureCodec for BlockTextureCodec {
    fn decode(&self, texture: &TextureRecord, data: &[u8]) -> Result<RgbaImage> {
        let width = usize::try_from(texture.width).unwrap_or(0);
        let height = usize::try_from(texture.height).unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(decode_failed(texture, format!("invalid size {}x{}", texture.width, texture.height)));
        }

        let needed = required_len(texture.format, width, height)
            .ok_or(Error::UnsupportedTextureFormat(texture.format.raw()))?;
        if data.len() < needed {
            return Err(decode_failed(
                texture,
                format!("{} bytes of pixel data, {needed} needed", data.len()),
            ));
        }

        let rgba = match BcFormat::from_texture_format(texture.format) {
            Some(bc) => decode_bc(data, width, height, bc),
            None => decode_uncompressed(data, width * height, texture.format)?,
        };

        let mut img = RgbaImage::from_raw(width as u32, height as u32, rgba).ok_or(Error::ImageBufferFailed)?;
        image::imageops::flip_vertical_in_place(&mut img);
        Ok(img)
    }
}

fn decode_failed(texture: &TextureRecord, message: String) -> Error {
    Error::DecodeFailed {
        item: texture.name.clone(),
        message,
    }
}

/// Bytes of the first mip, or `None` for formats without a decoder.
fn required_len(format: TextureFormat, width: usize, height: usize) -> Option<usize> {
    if let Some(bc) = BcFormat::from_texture_format(format) {
        return Some(width.div_ceil(4) * height.div_ceil(4) * bc.block_size());
    }
    let bytes_per_pixel = match format {
        TextureFormat::Alpha8 | TextureFormat::R8 => 1,
        TextureFormat::Argb4444
        | TextureFormat::Rgba4444
        | TextureFormat::Rgb565
        | TextureFormat::R16
        | TextureFormat::Rg16 => 2,
        TextureFormat::Rgb24 => 3,
        TextureFormat::Rgba32 | TextureFormat::Argb32 | TextureFormat::Bgra32 => 4,
        _ => return None,
    };
    Some(width * height * bytes_per_pixel)
}

fn expand4(nibble: u16) -> u8 {
    let n = (nibble & 0xF) as u8;
    (n << 4) | n
}

fn decode_uncompressed(data: &[u8], pixels: usize, format: TextureFormat) -> Result<Vec<u8>> {
    let mut rgba = Vec::with_capacity(pixels * 4);
    match format {
        TextureFormat::Alpha8 => {
            for &a in &data[..pixels] {
                rgba.extend_from_slice(&[255, 255, 255, a]);
            }
        }
        TextureFormat::R8 => {
            for &r in &data[..pixels] {
                rgba.extend_from_slice(&[r, 0, 0, 255]);
            }
        }
        TextureFormat::R16 => {
            for px in data[..pixels * 2].chunks_exact(2) {
                rgba.extend_from_slice(&[px[1], 0, 0, 255]);
            }
        }
        TextureFormat::Rg16 => {
            for px in data[..pixels * 2].chunks_exact(2) {
                rgba.extend_from_slice(&[px[0], px[1], 0, 255]);
            }
        }
        TextureFormat::Argb4444 => {
            for px in data[..pixels * 2].chunks_exact(2) {
                let v = u16::from_le_bytes([px[0], px[1]]);
                rgba.extend_from_slice(&[expand4(v >> 8), expand4(v >> 4), expand4(v), expand4(v >> 12)]);
            }
        }
        TextureFormat::Rgba4444 => {
            for px in data[..pixels * 2].chunks_exact(2) {
                let v = u16::from_le_bytes([px[0], px[1]]);
                rgba.extend_from_slice(&[expand4(v >> 12), expand4(v >> 8), expand4(v >> 4), expand4(v)]);
            }
        }
        TextureFormat::Rgb565 => {
            for px in data[..pixels * 2].chunks_exact(2) {
                let v = u16::from_le_bytes([px[0], px[1]]);
                let r = ((v >> 11) & 0x1F) as u8;
                let g = ((v >> 5) & 0x3F) as u8;
                let b = (v & 0x1F) as u8;
                rgba.extend_from_slice(&[(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2), 255]);
            }
        }
        TextureFormat::Rgb24 => {
            for px in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
        }
        TextureFormat::Rgba32 => rgba.extend_from_slice(&data[..pixels * 4]),
        TextureFormat::Argb32 => {
            for px in data[..pixels * 4].chunks_exact(4) {
                rgba.extend_from_slice(&[px[1], px[2], px[3], px[0]]);
            }
        }
        TextureFormat::Bgra32 => {
            for px in data[..pixels * 4].chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }
        other => return Err(Error::UnsupportedTextureFormat(other.raw())),
    }
    Ok(rgba)
}

// ============================================================================
// Block Compression (BC) formats - unified decoder using bcdec_rs
// ============================================================================

/// Supported BC compression formats
#[derive(Clone, Copy)]
enum BcFormat {
    Bc1, // DXT1 - 8 bytes per 4x4 block
    Bc2, // DXT3 - 16 bytes per 4x4 block (explicit alpha)
    Bc3, // DXT5 - 16 bytes per 4x4 block (interpolated alpha)
    Bc4, // Single channel - 8 bytes per 4x4 block
    Bc5, // Two channels - 16 bytes per 4x4 block
    Bc7, // High quality - 16 bytes per 4x4 block
}

impl BcFormat {
    fn from_texture_format(format: TextureFormat) -> Option<Self> {
        match format {
            TextureFormat::Dxt1 => Some(Self::Bc1),
            TextureFormat::Dxt3 => Some(Self::Bc2),
            TextureFormat::Dxt5 => Some(Self::Bc3),
            TextureFormat::Bc4 => Some(Self::Bc4),
            TextureFormat::Bc5 => Some(Self::Bc5),
            TextureFormat::Bc7 => Some(Self::Bc7),
            _ => None,
        }
    }

    /// Block size in bytes for this format
    const fn block_size(self) -> usize {
        match self {
            Self::Bc1 | Self::Bc4 => 8,
            Self::Bc2 | Self::Bc3 | Self::Bc5 | Self::Bc7 => 16,
        }
    }
}

/// Decode BC-compressed texture data to RGBA using bcdec_rs
fn decode_bc(data: &[u8], width: usize, height: usize, format: BcFormat) -> Vec<u8> {
    let mut rgba = vec![0u8; width * height * 4];
    let blocks_x = width.div_ceil(4);
    let blocks_y = height.div_ceil(4);
    let block_size = format.block_size();

    // One decoded 4x4 block; BC4 writes 1 byte per pixel, BC5 2, the rest 4
    let mut block_out = [0u8; 64];

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let block_idx = (by * blocks_x + bx) * block_size;
            let block = &data[block_idx..block_idx + block_size];

            match format {
                BcFormat::Bc1 => bcdec_rs::bc1(block, &mut block_out, 16),
                BcFormat::Bc2 => bcdec_rs::bc2(block, &mut block_out, 16),
                BcFormat::Bc3 => bcdec_rs::bc3(block, &mut block_out, 16),
                BcFormat::Bc4 => bcdec_rs::bc4(block, &mut block_out, 4, false),
                BcFormat::Bc5 => bcdec_rs::bc5(block, &mut block_out, 8, false),
                BcFormat::Bc7 => bcdec_rs::bc7(block, &mut block_out, 16),
            }

            for py in 0..4 {
                for px in 0..4 {
                    let fx = bx * 4 + px;
                    let fy = by * 4 + py;
                    if fx >= width || fy >= height {
                        continue;
                    }
                    let i = py * 4 + px;
                    let pixel = match format {
                        BcFormat::Bc4 => [block_out[i], 0, 0, 255],
                        BcFormat::Bc5 => [block_out[i * 2], block_out[i * 2 + 1], 0, 255],
                        _ => [block_out[i * 4], block_out[i * 4 + 1], block_out[i * 4 + 2], block_out[i * 4 + 3]],
                    };
                    let dst_idx = (fy * width + fx) * 4;
                    rgba[dst_idx..dst_idx + 4].copy_from_slice(&pixel);
                }
            }
        }
    }

    rgba
}

/// Decode a plain image file (PNG, JPEG, BMP).
pub fn decode_image(bytes: &[u8], item: &str) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgba8())
        .map_err(|e| Error::DecodeFailed {
            item: item.to_string(),
            message: e.to_string(),
        })
}

/// Encode an image as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png);
    img.write_with_encoder(encoder).map_err(|e| Error::DecodeFailed {
        item: "png".to_string(),
        message: e.to_string(),
    })?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::PixelPayload;

    fn record(format: TextureFormat, width: i32, height: i32) -> TextureRecord {
        TextureRecord {
            name: "tex".to_string(),
            width,
            height,
            format,
            mip_count: 1,
            payload: PixelPayload::Embedded { offset: 0, size: 0 },
        }
    }

    #[test]
    fn test_rgba32_is_flipped() {
        // bottom row red, top row blue in Unity's order
        let data = [255, 0, 0, 255, 0, 0, 255, 255];
        let img = BlockTextureCodec.decode(&record(TextureFormat::Rgba32, 1, 2), &data).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_channel_orders() {
        let argb = BlockTextureCodec.decode(&record(TextureFormat::Argb32, 1, 1), &[10, 20, 30, 40]).unwrap();
        assert_eq!(argb.get_pixel(0, 0).0, [20, 30, 40, 10]);
        let bgra = BlockTextureCodec.decode(&record(TextureFormat::Bgra32, 1, 1), &[10, 20, 30, 40]).unwrap();
        assert_eq!(bgra.get_pixel(0, 0).0, [30, 20, 10, 40]);
        let rgb565 = BlockTextureCodec
            .decode(&record(TextureFormat::Rgb565, 1, 1), &0xF800u16.to_le_bytes())
            .unwrap();
        assert_eq!(rgb565.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_dxt1_solid_block() {
        // color0 = color1 = pure white (0xFFFF), all indices 0
        let block = [0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0];
        let img = BlockTextureCodec.decode(&record(TextureFormat::Dxt1, 2, 2), &block).unwrap();
        assert_eq!(img.dimensions(), (2, 2));
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_short_data_and_unknown_format() {
        assert!(matches!(
            BlockTextureCodec.decode(&record(TextureFormat::Rgba32, 4, 4), &[0; 8]),
            Err(Error::DecodeFailed { .. })
        ));
        assert!(matches!(
            BlockTextureCodec.decode(&record(TextureFormat::Other(34), 4, 4), &[0; 64]),
            Err(Error::UnsupportedTextureFormat(34))
        ));
    }

    #[test]
    fn test_plain_image_roundtrip_through_png() {
        let img = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255]));
        let decoded = decode_image(&encode_png(&img).unwrap(), "x.png").unwrap();
        assert_eq!(decoded, img);
        assert!(decode_image(b"not an image", "x.png").is_err());
    }
}
