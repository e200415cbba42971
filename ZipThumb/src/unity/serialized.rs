//! Serialized asset files (the `CAB-*` entries inside bundles)
//!
//! # Header (always big-endian)
//!
//! ```text
//! metadata_size:u32 file_size:u32 version:u32 data_offset:u32
//! endianness:u8 reserved[3]                     (version >= 9)
//! metadata_size:u32 file_size:i64 data_offset:i64 unknown:i64  (version >= 22)
//! ```
//!
//! Before version 9 the endianness byte and metadata sit at the end of the
//! file. Only the object directory is decoded here; type trees are skipped.

use crate::error::{Error, Result};

use super::SharedBytes;
use super::reader::{Endian, EndianReader};
use super::version::UnityVersion;

const HEADER_LEN: usize = 20;
const HEADER_LEN_V22: usize = 48;
const MAX_FORMAT_VERSION: u32 = 40;
const MAX_STRING_LEN: usize = 256;
const MAX_LEGACY_TYPE_NODES: usize = 1 << 16;

/// `BuildTarget::NoTarget`, used by editor-only files.
pub const PLATFORM_NO_TARGET: i32 = -2;

/// MonoBehaviour, which carries a script id in the type list.
const CLASS_MONO_BEHAVIOUR: i32 = 114;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializedHeader {
    pub metadata_size: u32,
    pub file_size: u64,
    pub version: u32,
    pub data_offset: u64,
}

fn read_header(reader: &mut EndianReader<'_>) -> Result<SerializedHeader> {
    let mut header = SerializedHeader {
        metadata_size: reader.read_u32()?,
        file_size: u64::from(reader.read_u32()?),
        version: reader.read_u32()?,
        data_offset: u64::from(reader.read_u32()?),
    };
    if header.version >= 22 {
        reader.set_position(HEADER_LEN)?;
        header.metadata_size = reader.read_u32()?;
        header.file_size = read_u64_offset(reader)?;
        header.data_offset = read_u64_offset(reader)?;
    }
    Ok(header)
}

fn read_u64_offset(reader: &mut EndianReader<'_>) -> Result<u64> {
    let value = reader.read_i64()?;
    u64::try_from(value).map_err(|_| Error::InvalidSerializedFile(format!("negative offset {value}")))
}

/// Whether `data` carries a serialized file header consistent with its length.
pub fn is_serialized_file(data: &[u8]) -> bool {
    if data.len() < HEADER_LEN {
        return false;
    }
    let mut reader = EndianReader::new(data, Endian::Big);
    let Ok(header) = read_header(&mut reader) else {
        return false;
    };
    if header.version >= 22 && data.len() < HEADER_LEN_V22 {
        return false;
    }
    (1..=MAX_FORMAT_VERSION).contains(&header.version)
        && header.file_size == data.len() as u64
        && header.data_offset <= data.len() as u64
}

/// Object directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Identifier unique within the file.
    pub path_id: i64,
    /// Absolute offset of the object data in the file.
    pub byte_start: u64,
    pub byte_size: u32,
    /// Index into the type list (or the class id before version 16).
    pub type_id: i32,
    /// Resolved Unity class id.
    pub class_id: i32,
}

/// One parsed serialized file: header fields, object directory and raw bytes.
#[derive(Debug, Clone)]
pub struct AssetTable {
    /// Name of the stream inside its container, e.g. `CAB-0a1b2c`.
    pub name: String,
    pub header: SerializedHeader,
    pub endian: Endian,
    /// Unity version string as stored (or the fallback when stripped).
    pub unity_revision: String,
    pub unity_version: UnityVersion,
    pub platform: i32,
    pub objects: Vec<ObjectInfo>,
    data: SharedBytes,
}

impl AssetTable {
    /// Parse the header and object directory of a serialized file.
    ///
    /// `fallback_version` replaces a stripped Unity version.
    pub fn parse(
        name: impl Into<String>,
        data: impl Into<SharedBytes>,
        fallback_version: Option<&str>,
    ) -> Result<Self> {
        let name = name.into();
        let data = data.into();
        let mut reader = EndianReader::new(&data, Endian::Big);
        let header = read_header(&mut reader)?;
        let format = header.version;

        let endian_flag = if format >= 9 {
            reader.set_position(HEADER_LEN - 4)?;
            let flag = reader.read_u8()?;
            reader.set_position(if format >= 22 { HEADER_LEN_V22 } else { HEADER_LEN })?;
            flag
        } else {
            let metadata_start = header
                .file_size
                .checked_sub(u64::from(header.metadata_size))
                .ok_or_else(|| Error::InvalidSerializedFile("metadata larger than file".to_string()))?;
            reader.set_position(usize::try_from(metadata_start).unwrap_or(usize::MAX))?;
            reader.read_u8()?
        };
        reader.set_endian(if endian_flag == 0 { Endian::Little } else { Endian::Big });

        let stored_version = if format >= 7 {
            reader.read_cstring(MAX_STRING_LEN)?
        } else {
            String::new()
        };
        let unity_revision = if UnityVersion::is_stripped(&stored_version) {
            fallback_version
                .map(str::to_string)
                .ok_or_else(|| Error::UnityVersionStripped(name.clone()))?
        } else {
            stored_version
        };
        let unity_version: UnityVersion = unity_revision.parse()?;

        let platform = if format >= 8 { reader.read_i32()? } else { 0 };
        let type_tree_enabled = if format >= 13 { reader.read_bool()? } else { true };

        let type_count = reader.read_count(4)?;
        let mut type_class_ids = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            type_class_ids.push(read_serialized_type(&mut reader, format, type_tree_enabled)?);
        }

        let big_id_enabled = if (7..14).contains(&format) {
            reader.read_i32()? != 0
        } else {
            false
        };

        let object_count = reader.read_count(12)?;
        let mut objects = Vec::with_capacity(object_count);
        for _ in 0..object_count {
            let path_id = if big_id_enabled {
                reader.read_i64()?
            } else if format < 14 {
                i64::from(reader.read_i32()?)
            } else {
                reader.align(4)?;
                reader.read_i64()?
            };
            let byte_start = if format >= 22 {
                read_u64_offset(&mut reader)?
            } else {
                u64::from(reader.read_u32()?)
            } + header.data_offset;
            let byte_size = reader.read_u32()?;
            let type_id = reader.read_i32()?;
            let class_id = if format < 16 {
                i32::from(reader.read_u16()?)
            } else {
                usize::try_from(type_id)
                    .ok()
                    .and_then(|index| type_class_ids.get(index).copied())
                    .ok_or_else(|| {
                        Error::InvalidSerializedFile(format!("object {path_id} has unknown type index {type_id}"))
                    })?
            };
            if format < 11 {
                reader.skip(2)?; // is destroyed
            }
            if (11..17).contains(&format) {
                reader.skip(2)?; // script type index
            }
            if format == 15 || format == 16 {
                reader.skip(1)?; // stripped
            }
            objects.push(ObjectInfo {
                path_id,
                byte_start,
                byte_size,
                type_id,
                class_id,
            });
        }

        let endian = reader.endian();
        tracing::debug!(
            "Assets {name}: format {format}, Unity {unity_revision}, platform {platform}, {} objects",
            objects.len()
        );
        Ok(Self {
            name,
            header,
            endian,
            unity_revision,
            unity_version,
            platform,
            objects,
            data,
        })
    }

    /// `size` bytes at absolute file offset `offset`.
    pub fn data_range(&self, offset: u64, size: u64) -> Result<&[u8]> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let len = usize::try_from(size).unwrap_or(usize::MAX);
        start
            .checked_add(len)
            .and_then(|end| self.data.get(start..end))
            .ok_or(Error::UnexpectedEof {
                offset: start,
                needed: len,
            })
    }

    /// Raw bytes of one object.
    pub fn object_data(&self, object: &ObjectInfo) -> Result<&[u8]> {
        self.data_range(object.byte_start, u64::from(object.byte_size))
    }

    /// Reader positioned at the start of one object, in the file's byte order.
    pub fn object_reader(&self, object: &ObjectInfo) -> Result<EndianReader<'_>> {
        Ok(EndianReader::new(self.object_data(object)?, self.endian))
    }

    /// Serialized format version.
    pub fn format_version(&self) -> u32 {
        self.header.version
    }
}

/// Read one type list entry and return its class id.
fn read_serialized_type(reader: &mut EndianReader<'_>, format: u32, type_tree_enabled: bool) -> Result<i32> {
    let class_id = reader.read_i32()?;
    if format >= 16 {
        reader.skip(1)?; // is stripped type
    }
    if format >= 17 {
        reader.skip(2)?; // script type index
    }
    if format >= 13 {
        let has_script_id = (format < 16 && class_id < 0) || (format >= 16 && class_id == CLASS_MONO_BEHAVIOUR);
        if has_script_id {
            reader.skip(16)?;
        }
        reader.skip(16)?; // old type hash
    }
    if type_tree_enabled {
        if format >= 12 || format == 10 {
            skip_type_tree_blob(reader, format)?;
        } else {
            skip_legacy_type_tree(reader, format)?;
        }
        if format >= 21 {
            let dependencies = reader.read_count(4)?;
            reader.skip(dependencies * 4)?;
        }
    }
    Ok(class_id)
}

fn skip_type_tree_blob(reader: &mut EndianReader<'_>, format: u32) -> Result<()> {
    let node_count = reader.read_count(1)?;
    let string_buffer_size = reader.read_count(1)?;
    let node_size = if format >= 19 { 32 } else { 24 };
    reader.skip(node_count.saturating_mul(node_size))?;
    reader.skip(string_buffer_size)
}

/// Pre-blob type trees nest their children; walk them with a pending-node counter.
fn skip_legacy_type_tree(reader: &mut EndianReader<'_>, format: u32) -> Result<()> {
    let mut pending = 1usize;
    let mut visited = 0usize;
    while pending > 0 {
        pending -= 1;
        visited += 1;
        if visited > MAX_LEGACY_TYPE_NODES {
            return Err(Error::InvalidSerializedFile("legacy type tree too large".to_string()));
        }
        reader.read_cstring(MAX_STRING_LEN)?; // type
        reader.read_cstring(MAX_STRING_LEN)?; // name
        reader.skip(4)?; // byte size
        if format == 2 {
            reader.skip(4)?; // variable count
        }
        if format != 3 {
            reader.skip(4)?; // index
        }
        reader.skip(8)?; // type flags, version
        if format != 3 {
            reader.skip(4)?; // meta flag
        }
        pending += reader.read_count(1)?;
    }
    Ok(())
}
