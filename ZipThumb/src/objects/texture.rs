//! `Texture2D` (class 28)

use crate::error::{Error, Result};
use crate::unity::reader::EndianReader;
use crate::unity::{AssetTable, LoadedAssets, ObjectInfo, UnityVersion};

use super::read_object_name;

/// Unity `TextureFormat` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Alpha8,
    Argb4444,
    Rgb24,
    Rgba32,
    Argb32,
    Rgb565,
    R16,
    Dxt1,
    Dxt5,
    Rgba4444,
    Bgra32,
    Dxt3,
    Bc4,
    Bc5,
    Bc7,
    Rg16,
    R8,
    /// Any format without a decoder here (PVRTC, ETC, ASTC, HDR, ...).
    Other(i32),
}

impl TextureFormat {
    pub fn from_raw(value: i32) -> Self {
        match value {
            1 => Self::Alpha8,
            2 => Self::Argb4444,
            3 => Self::Rgb24,
            4 => Self::Rgba32,
            5 => Self::Argb32,
            7 => Self::Rgb565,
            9 => Self::R16,
            10 => Self::Dxt1,
            11 => Self::Dxt3,
            12 => Self::Dxt5,
            13 => Self::Rgba4444,
            14 => Self::Bgra32,
            25 => Self::Bc7,
            26 => Self::Bc4,
            27 => Self::Bc5,
            62 => Self::Rg16,
            63 => Self::R8,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Alpha8 => 1,
            Self::Argb4444 => 2,
            Self::Rgb24 => 3,
            Self::Rgba32 => 4,
            Self::Argb32 => 5,
            Self::Rgb565 => 7,
            Self::R16 => 9,
            Self::Dxt1 => 10,
            Self::Dxt3 => 11,
            Self::Dxt5 => 12,
            Self::Rgba4444 => 13,
            Self::Bgra32 => 14,
            Self::Bc7 => 25,
            Self::Bc4 => 26,
            Self::Bc5 => 27,
            Self::Rg16 => 62,
            Self::R8 => 63,
            Self::Other(value) => value,
        }
    }
}

/// Where a texture's pixel bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelPayload {
    /// Inside the owning assets table, at an absolute file offset.
    Embedded { offset: u64, size: u32 },
    /// In a resource blob (`archive:/CAB-x/CAB-x.resS`) unpacked from the same container.
    Streamed { path: String, offset: u64, size: u32 },
}

impl PixelPayload {
    pub fn size(&self) -> u32 {
        match self {
            Self::Embedded { size, .. } | Self::Streamed { size, .. } => *size,
        }
    }
}

/// Texture fields needed to decode the first mip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureRecord {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub format: TextureFormat,
    pub mip_count: i32,
    pub payload: PixelPayload,
}

impl TextureRecord {
    /// Borrow the pixel bytes from the owning table or a resource blob.
    pub fn pixel_data<'a>(&self, table: &'a AssetTable, loaded: &'a LoadedAssets) -> Result<&'a [u8]> {
        match &self.payload {
            PixelPayload::Embedded { offset, size } => table.data_range(*offset, u64::from(*size)),
            PixelPayload::Streamed { path, offset, size } => {
                let blob = loaded
                    .resource(path)
                    .ok_or_else(|| Error::ResourceNotFound(path.clone()))?;
                let start = usize::try_from(*offset).unwrap_or(usize::MAX);
                start
                    .checked_add(*size as usize)
                    .and_then(|end| blob.get(start..end))
                    .ok_or(Error::UnexpectedEof {
                        offset: start,
                        needed: *size as usize,
                    })
            }
        }
    }
}

fn read_texture_settings(reader: &mut EndianReader<'_>, version: UnityVersion) -> Result<()> {
    reader.read_i32()?; // filter mode
    reader.read_i32()?; // aniso
    reader.read_f32()?; // mip bias
    let wrap_modes = if version.at_least(2017, 1) { 3 } else { 1 };
    reader.skip(wrap_modes * 4)
}

/// Read a `Texture2D` object.
pub fn read_texture(table: &AssetTable, object: &ObjectInfo) -> Result<TextureRecord> {
    let version = table.unity_version;
    let mut reader = table.object_reader(object)?;
    let name = read_object_name(&mut reader, table)?;

    if version.at_least(2017, 3) {
        reader.read_i32()?; // forced fallback format
        reader.read_bool()?; // downscale fallback
        if version.at_least(2020, 2) {
            reader.read_bool()?; // is alpha channel optional
        }
        reader.align(4)?;
    }

    let width = reader.read_i32()?;
    let height = reader.read_i32()?;
    reader.read_i32()?; // complete image size
    if version.at_least(2020, 1) {
        reader.read_i32()?; // mips stripped
    }
    let format = TextureFormat::from_raw(reader.read_i32()?);
    let mip_count = if version.at_least(5, 2) {
        reader.read_i32()?
    } else {
        i32::from(reader.read_bool()?) + 1
    };

    if version.at_least(2, 6) {
        reader.read_bool()?; // is readable
    }
    if version.at_least(2020, 1) {
        reader.read_bool()?; // is preprocessed
    }
    if version.at_least(2019, 3) {
        reader.read_bool()?; // ignore master texture limit
    }
    if version.at_least(3, 0) && !version.at_least(5, 5) {
        reader.read_bool()?; // read allowed
    }
    if version.at_least(2018, 2) {
        reader.read_bool()?; // streaming mipmaps
    }
    reader.align(4)?;
    if version.at_least(2018, 2) {
        reader.read_i32()?; // streaming mipmaps priority
    }

    reader.read_i32()?; // image count
    reader.read_i32()?; // texture dimension
    read_texture_settings(&mut reader, version)?;
    if version.at_least(3, 0) {
        reader.read_i32()?; // lightmap format
    }
    if version.at_least(3, 5) {
        reader.read_i32()?; // color space
    }
    if version.at_least(2020, 2) {
        let blob = reader.read_count(1)?;
        reader.skip(blob)?; // platform blob
        reader.align(4)?;
    }

    let image_size = reader.read_i32()?;
    let image_size = u32::try_from(image_size)
        .map_err(|_| Error::InvalidSerializedFile(format!("negative image size {image_size}")))?;

    let payload = if image_size == 0 && version.at_least(5, 3) {
        let offset = if version.at_least(2020, 1) {
            reader.read_u64()?
        } else {
            u64::from(reader.read_u32()?)
        };
        let size = reader.read_u32()?;
        let path = reader.read_aligned_string()?;
        if path.is_empty() {
            PixelPayload::Embedded { offset: 0, size: 0 }
        } else {
            PixelPayload::Streamed { path, offset, size }
        }
    } else {
        let offset = object.byte_start + reader.position() as u64;
        reader.skip(image_size as usize)?;
        PixelPayload::Embedded {
            offset,
            size: image_size,
        }
    };

    Ok(TextureRecord {
        name,
        width,
        height,
        format,
        mip_count,
        payload,
    })
}
