//! WebGL data files (`UnityWebData1.0`)
//!
//! Little-endian: signature, header length, then `(offset, length, path)`
//! entries until the header length is reached. Offsets are absolute.

use crate::error::{Error, Result};

use super::compression::{self, WebEncoding};
use super::reader::{Endian, EndianReader};
use super::{Directory, DirectoryEntry, SharedBytes, WEB_SIGNATURE};

/// Parse web data, stripping its transport encoding first.
///
/// Plain web data shares `data`; decoded data gets a buffer of its own.
pub fn parse(data: &SharedBytes, encoding: WebEncoding, limit: u64) -> Result<Directory> {
    let data = match encoding {
        WebEncoding::Plain => data.clone(),
        encoding => SharedBytes::from(compression::decode_web(data, encoding, limit)?),
    };

    let mut reader = EndianReader::new(&data, Endian::Little);
    let signature = reader.read_cstring(32)?;
    if signature != WEB_SIGNATURE {
        return Err(Error::InvalidWebData(format!("unexpected signature '{signature}'")));
    }

    let head_length = reader.read_i32()?;
    let head_length = usize::try_from(head_length)
        .ok()
        .filter(|len| *len <= data.len())
        .ok_or_else(|| Error::InvalidWebData(format!("header length {head_length} out of range")))?;

    let mut entries = Vec::new();
    while reader.position() < head_length {
        let offset = reader.read_i32()?;
        let length = reader.read_i32()?;
        let path_length = reader.read_i32()?;
        let (Ok(offset), Ok(length), Ok(path_length)) = (
            u64::try_from(offset),
            u64::try_from(length),
            usize::try_from(path_length),
        ) else {
            return Err(Error::InvalidWebData(format!(
                "negative field in entry {} ({offset}, {length}, {path_length})",
                entries.len()
            )));
        };
        let name = String::from_utf8_lossy(reader.read_bytes(path_length)?).into_owned();
        entries.push(DirectoryEntry {
            name,
            offset,
            size: length,
        });
    }

    Ok(Directory::new(entries, data))
}
