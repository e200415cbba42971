//! Asset bundles (`UnityFS` and the legacy `UnityWeb`/`UnityRaw` layout)
//!
//! # UnityFS layout (big-endian)
//!
//! ```text
//! signature\0 version:u32 unity_version\0 unity_revision\0
//! size:i64 compressed_info_size:u32 uncompressed_info_size:u32 flags:u32
//! [align 16 for version >= 7]
//! blocks info (here, or at the end of the file when flags & 0x80)
//! [align 16 when flags & 0x200]
//! storage blocks...
//! ```
//!
//! The blocks info holds a 16-byte hash, the storage block table and the
//! directory of child nodes, addressed in the concatenated decompressed blocks.

use crate::error::{Error, Result};

use super::compression::{self, BlockCompression};
use super::reader::{Endian, EndianReader};
use super::{Directory, DirectoryEntry};

const FLAG_BLOCKS_INFO_AT_END: u32 = 0x80;
const FLAG_PADDING_AT_START: u32 = 0x200;

const MAX_SIGNATURE_LEN: usize = 20;
const MAX_STRING_LEN: usize = 256;
const MAX_PATH_LEN: usize = 1024;

/// Fixed bundle header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHeader {
    pub signature: String,
    pub version: u32,
    pub unity_version: String,
    pub unity_revision: String,
}

/// One storage block of a UnityFS bundle.
#[derive(Debug, Clone, Copy)]
struct StorageBlock {
    compressed_size: u32,
    uncompressed_size: u32,
    flags: u16,
}

/// A parsed bundle with its decompressed directory.
#[derive(Debug)]
pub struct BundleFile {
    pub header: BundleHeader,
    pub directory: Directory,
}

impl BundleFile {
    /// Parse a bundle, decompressing every storage block.
    ///
    /// `limit` caps the total decompressed size.
    pub fn parse(data: &[u8], limit: u64) -> Result<Self> {
        let mut reader = EndianReader::new(data, Endian::Big);
        let header = BundleHeader {
            signature: reader.read_cstring(MAX_SIGNATURE_LEN)?,
            version: reader.read_u32()?,
            unity_version: reader.read_cstring(MAX_STRING_LEN)?,
            unity_revision: reader.read_cstring(MAX_STRING_LEN)?,
        };

        let directory = match header.signature.as_str() {
            "UnityFS" => read_unity_fs(&mut reader, &header, limit)?,
            "UnityWeb" | "UnityRaw" if header.version == 6 => read_unity_fs(&mut reader, &header, limit)?,
            "UnityWeb" | "UnityRaw" => read_legacy(&mut reader, &header, limit)?,
            other => {
                return Err(Error::InvalidBundle(format!(
                    "unsupported signature '{other}' (version {})",
                    header.version
                )));
            }
        };

        tracing::debug!(
            "Bundle {} v{} ({}): {} nodes",
            header.signature,
            header.version,
            header.unity_revision,
            directory.len()
        );
        Ok(Self { header, directory })
    }
}

fn check_limit(total: u64, limit: u64) -> Result<()> {
    if total > limit {
        return Err(Error::InvalidBundle(format!(
            "decompressed size {total} exceeds limit {limit}"
        )));
    }
    Ok(())
}

fn read_unity_fs(reader: &mut EndianReader<'_>, header: &BundleHeader, limit: u64) -> Result<Directory> {
    let _bundle_size = reader.read_i64()?;
    let compressed_info_size = reader.read_u32()? as usize;
    let uncompressed_info_size = reader.read_u32()? as usize;
    let flags = reader.read_u32()?;
    if header.signature != "UnityFS" {
        reader.skip(1)?;
    }

    if header.version >= 7 {
        reader.align(16)?;
    }

    let info_bytes = if flags & FLAG_BLOCKS_INFO_AT_END != 0 {
        let start = reader.len().checked_sub(compressed_info_size).ok_or(Error::UnexpectedEof {
            offset: 0,
            needed: compressed_info_size,
        })?;
        let mut tail = reader.clone();
        tail.set_position(start)?;
        tail.read_bytes(compressed_info_size)?
    } else {
        reader.read_bytes(compressed_info_size)?
    };

    check_limit(uncompressed_info_size as u64, limit)?;
    let info = compression::decompress_block(
        info_bytes,
        BlockCompression::from_flags(flags)?,
        uncompressed_info_size,
    )?;

    let mut info_reader = EndianReader::new(&info, Endian::Big);
    info_reader.skip(16)?; // uncompressed data hash

    let block_count = info_reader.read_count(10)?;
    let mut blocks = Vec::with_capacity(block_count);
    for _ in 0..block_count {
        blocks.push(StorageBlock {
            uncompressed_size: info_reader.read_u32()?,
            compressed_size: info_reader.read_u32()?,
            flags: info_reader.read_u16()?,
        });
    }

    let node_count = info_reader.read_count(21)?;
    let mut entries = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let offset = info_reader.read_i64()?;
        let size = info_reader.read_i64()?;
        let _flags = info_reader.read_u32()?;
        let name = info_reader.read_cstring(MAX_PATH_LEN)?;
        entries.push(DirectoryEntry {
            name,
            offset: u64::try_from(offset)
                .map_err(|_| Error::InvalidBundle(format!("negative node offset {offset}")))?,
            size: u64::try_from(size).map_err(|_| Error::InvalidBundle(format!("negative node size {size}")))?,
        });
    }

    if flags & FLAG_PADDING_AT_START != 0 {
        reader.align(16)?;
    }

    let total: u64 = blocks.iter().map(|b| u64::from(b.uncompressed_size)).sum();
    check_limit(total, limit)?;

    let mut data = Vec::with_capacity(total as usize);
    for block in &blocks {
        let compressed = reader.read_bytes(block.compressed_size as usize)?;
        let compression = BlockCompression::from_flags(u32::from(block.flags))?;
        data.extend(compression::decompress_block(
            compressed,
            compression,
            block.uncompressed_size as usize,
        )?);
    }

    Ok(Directory::new(entries, data))
}

fn read_legacy(reader: &mut EndianReader<'_>, header: &BundleHeader, limit: u64) -> Result<Directory> {
    if header.version >= 4 {
        reader.skip(16)?; // hash
        reader.skip(4)?; // crc
    }
    let _minimum_streamed_bytes = reader.read_u32()?;
    let header_size = reader.read_u32()? as usize;
    let _levels_before_streaming = reader.read_u32()?;
    let level_count = reader.read_count(8)?;
    if level_count == 0 {
        return Err(Error::InvalidBundle("legacy bundle without levels".to_string()));
    }
    // only the last level describes the complete data
    reader.skip(8 * (level_count - 1))?;
    let compressed_size = reader.read_u32()? as usize;
    let uncompressed_size = reader.read_u32()?;
    check_limit(u64::from(uncompressed_size), limit)?;

    reader.set_position(header_size)?;
    let available = compressed_size.min(reader.remaining());
    let block = reader.read_bytes(available)?;

    let data = if header.signature == "UnityWeb" {
        compression::decompress_lzma_alone(block, limit)?
    } else {
        block.to_vec()
    };

    let mut dir_reader = EndianReader::new(&data, Endian::Big);
    let node_count = dir_reader.read_count(9)?;
    let mut entries = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        entries.push(DirectoryEntry {
            name: dir_reader.read_cstring(MAX_PATH_LEN)?,
            offset: u64::from(dir_reader.read_u32()?),
            size: u64::from(dir_reader.read_u32()?),
        });
    }

    Ok(Directory::new(entries, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unity::fixtures;

    #[test]
    fn test_unity_fs_uncompressed() {
        let bytes = fixtures::unity_fs(&[("CAB-a", b"first"), ("CAB-a.resS", b"second!")], 0);
        let bundle = BundleFile::parse(&bytes, u64::MAX).unwrap();
        assert_eq!(bundle.header.signature, "UnityFS");
        assert_eq!(bundle.header.unity_revision, "5.6.2f1");
        let names: Vec<_> = bundle.directory.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["CAB-a", "CAB-a.resS"]);
        assert_eq!(&*bundle.directory.share(&bundle.directory.entries[1]).unwrap(), b"second!");
    }

    #[test]
    fn test_unity_fs_lz4_blocks_info_at_end() {
        let bytes = fixtures::unity_fs(&[("CAB-b", b"payload payload payload")], 2 | FLAG_BLOCKS_INFO_AT_END);
        let bundle = BundleFile::parse(&bytes, u64::MAX).unwrap();
        assert_eq!(bundle.directory.len(), 1);
        assert_eq!(
            &*bundle.directory.share(&bundle.directory.entries[0]).unwrap(),
            b"payload payload payload"
        );
    }

    #[test]
    fn test_unity_fs_lzma_blocks_info() {
        let bytes = fixtures::unity_fs(&[("CAB-c", b"lzma")], 1);
        let bundle = BundleFile::parse(&bytes, u64::MAX).unwrap();
        assert_eq!(bundle.directory.entries[0].name, "CAB-c");
    }

    #[test]
    fn test_legacy_raw() {
        let bytes = fixtures::unity_raw(&[("CAB-old", b"old data")]);
        let bundle = BundleFile::parse(&bytes, u64::MAX).unwrap();
        assert_eq!(bundle.header.signature, "UnityRaw");
        assert_eq!(&*bundle.directory.share(&bundle.directory.entries[0]).unwrap(), b"old data");
    }

    #[test]
    fn test_legacy_web_lzma() {
        let payload = b"legacy lzma payload ".repeat(8);
        let bytes = fixtures::unity_web(&[("CAB-web", &payload), ("CAB-web.resS", b"pixels")]);
        let bundle = BundleFile::parse(&bytes, u64::MAX).unwrap();
        assert_eq!(bundle.header.signature, "UnityWeb");
        assert_eq!(bundle.header.version, 3);
        assert_eq!(&*bundle.directory.share(&bundle.directory.entries[0]).unwrap(), &payload[..]);
        assert_eq!(&*bundle.directory.share(&bundle.directory.entries[1]).unwrap(), b"pixels");
    }

    #[test]
    fn test_legacy_web_understated_size() {
        let mut bytes = fixtures::unity_web(&[("CAB-web", &[3u8; 200])]);
        // signature, version, two version strings, then five u32 fields before the level's uncompressed size
        let field = "UnityWeb\0".len() + 4 + "3.x.x\0".len() + "3.5.7f6\0".len() + 5 * 4;
        bytes[field..field + 4].copy_from_slice(&1u32.to_be_bytes());
        assert!(matches!(BundleFile::parse(&bytes, 64), Err(Error::InvalidBundle(_))));
    }

    #[test]
    fn test_limit_and_truncation() {
        let bytes = fixtures::unity_fs(&[("CAB-d", b"0123456789")], 0);
        assert!(BundleFile::parse(&bytes, 4).is_err());
        assert!(BundleFile::parse(&bytes[..bytes.len() - 3], u64::MAX).is_err());
        assert!(matches!(
            BundleFile::parse(b"UnityArchive\0\0\0\0\x01", u64::MAX),
            Err(Error::InvalidBundle(_))
        ));
    }
}
