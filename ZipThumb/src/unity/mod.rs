//! Unity container formats
//!
//! Streams pulled out of a zipmod are classified by signature, never by
//! extension:
//!
//! - **Bundle** - `UnityFS`, `UnityWeb`, `UnityRaw`, `UnityArchive`
//! - **Web** - `UnityWebData1.0`, optionally gzip or brotli encoded
//! - **Assets** - a serialized file whose header agrees with the stream length
//! - **Resource** - anything else (`.resS` blobs, audio, ...)
//!
//! Bundles and web data are directories of named child byte ranges that
//! [`dispatch`] keeps unpacking until only assets and resources remain.
//! Children are [`SharedBytes`] views into their container's data.

pub mod bundle;
pub mod compression;
pub mod dispatch;
pub mod reader;
pub mod serialized;
pub mod version;
pub mod web;

pub use compression::WebEncoding;
pub use dispatch::{ContainerDispatcher, LoadedAssets};
pub use reader::{Endian, EndianReader};
pub use serialized::{AssetTable, ObjectInfo};
pub use version::UnityVersion;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Bundle signatures, all followed by a null terminator.
pub const BUNDLE_SIGNATURES: [&str; 4] = ["UnityFS", "UnityWeb", "UnityRaw", "UnityArchive"];

/// Web data signature.
pub const WEB_SIGNATURE: &str = "UnityWebData1.0";

/// What a stream turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Bundle,
    Web { encoding: WebEncoding },
    Assets,
    Resource,
    Unknown,
}

impl ContainerKind {
    /// Web data recognised only by a gzip or brotli wrapper.
    pub fn is_encoded(self) -> bool {
        matches!(self, Self::Web { encoding } if encoding != WebEncoding::Plain)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Web { .. } => "web data",
            Self::Assets => "assets",
            Self::Resource => "resource",
            Self::Unknown => "unknown",
        }
    }
}

/// Classify a top-level stream by its leading bytes.
///
/// Unlike [`classify_child`], this also recognises gzip and brotli encoded
/// web data.
pub fn classify(data: &[u8]) -> ContainerKind {
    match classify_child(data) {
        ContainerKind::Resource => match compression::sniff_encoding(data) {
            WebEncoding::Plain => ContainerKind::Resource,
            encoding => ContainerKind::Web { encoding },
        },
        kind => kind,
    }
}

/// Classify a bundle or web data child by its signature.
///
/// Transport encodings are not sniffed: a child such as a `.resS` blob can
/// start with any bytes.
pub fn classify_child(data: &[u8]) -> ContainerKind {
    if data.is_empty() {
        return ContainerKind::Unknown;
    }

    let mut reader = EndianReader::new(data, Endian::Big);
    let signature = reader.read_cstring(20).unwrap_or_default();
    if BUNDLE_SIGNATURES.contains(&signature.as_str()) {
        return ContainerKind::Bundle;
    }
    if signature == WEB_SIGNATURE {
        return ContainerKind::Web {
            encoding: WebEncoding::Plain,
        };
    }

    if serialized::is_serialized_file(data) {
        ContainerKind::Assets
    } else {
        ContainerKind::Resource
    }
}

/// A cheaply cloned view into a reference-counted byte buffer.
#[derive(Clone)]
pub struct SharedBytes {
    buf: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl SharedBytes {
    /// View of `size` bytes at `offset` within this view.
    pub fn slice(&self, offset: u64, size: u64) -> Result<Self> {
        let eof = || Error::UnexpectedEof {
            offset: usize::try_from(offset).unwrap_or(usize::MAX),
            needed: usize::try_from(size).unwrap_or(usize::MAX),
        };
        let start = usize::try_from(offset)
            .ok()
            .and_then(|offset| self.start.checked_add(offset))
            .ok_or_else(eof)?;
        let end = usize::try_from(size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .filter(|end| *end <= self.end)
            .ok_or_else(eof)?;
        Ok(Self {
            buf: Arc::clone(&self.buf),
            start,
            end,
        })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Whether both views point into the same allocation.
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buf, &other.buf)
    }
}

impl From<Vec<u8>> for SharedBytes {
    fn from(data: Vec<u8>) -> Self {
        let end = data.len();
        Self {
            buf: data.into(),
            start: 0,
            end,
        }
    }
}

impl Deref for SharedBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for SharedBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBytes")
            .field("start", &self.start)
            .field("len", &self.len())
            .finish()
    }
}

/// One named child byte range of a bundle or web data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Path of the child inside its container, e.g. `CAB-0a1b2c.resS`.
    pub name: String,
    /// Offset into the container's decompressed data.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
}

/// Decompressed container data plus its directory.
#[derive(Debug, Clone)]
pub struct Directory {
    pub entries: Vec<DirectoryEntry>,
    data: SharedBytes,
}

impl Directory {
    pub fn new(entries: Vec<DirectoryEntry>, data: impl Into<SharedBytes>) -> Self {
        Self {
            entries,
            data: data.into(),
        }
    }

    /// The data every child points into.
    pub fn data(&self) -> &SharedBytes {
        &self.data
    }

    /// A child as a view sharing this directory's buffer.
    pub fn share(&self, entry: &DirectoryEntry) -> Result<SharedBytes> {
        self.data.slice(entry.offset, entry.size)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Final `/`-delimited segment of a container path (`archive:/CAB-x/CAB-x.resS` -> `CAB-x.resS`).
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
pub(crate) mod fixtures;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_signatures() {
        assert_eq!(classify(b""), ContainerKind::Unknown);
        assert_eq!(classify(b"UnityFS\0\0\0\0\x07"), ContainerKind::Bundle);
        assert_eq!(classify(b"UnityRaw\0rest"), ContainerKind::Bundle);
        assert_eq!(
            classify(b"UnityWebData1.0\0\x14\0\0\0"),
            ContainerKind::Web {
                encoding: WebEncoding::Plain
            }
        );
        assert_eq!(classify(b"\x89PNG\r\n\x1a\n"), ContainerKind::Resource);
    }

    #[test]
    fn test_children_are_never_sniffed_for_encoding() {
        let gzip_like = [0x1F, 0x8B, 0x08, 0xFF, 0x1F, 0x8B, 0x08, 0xFF];
        assert!(classify(&gzip_like).is_encoded());
        assert_eq!(classify_child(&gzip_like), ContainerKind::Resource);

        let mut brotli_like = vec![0u8; compression::BROTLI_MARKER_OFFSET];
        brotli_like.extend_from_slice(compression::BROTLI_MARKER);
        assert_eq!(
            classify(&brotli_like),
            ContainerKind::Web {
                encoding: WebEncoding::Brotli
            }
        );
        assert_eq!(classify_child(&brotli_like), ContainerKind::Resource);
        assert_eq!(classify_child(b"UnityFS\0\0\0\0\x07"), ContainerKind::Bundle);
    }

    #[test]
    fn test_classify_ignores_extension_like_content() {
        // a resource whose bytes happen to start with a file name
        assert_eq!(classify(b"texture.unity3d"), ContainerKind::Resource);
    }

    #[test]
    fn test_directory_child_bounds() {
        let directory = Directory::new(
            vec![
                DirectoryEntry {
                    name: "a".into(),
                    offset: 0,
                    size: 2,
                },
                DirectoryEntry {
                    name: "b".into(),
                    offset: 2,
                    size: 10,
                },
            ],
            b"abcd".to_vec(),
        );
        assert_eq!(&*directory.share(&directory.entries[0]).unwrap(), b"ab");
        assert!(directory.share(&directory.entries[1]).is_err());

        let shared = directory.share(&directory.entries[0]).unwrap();
        assert_eq!(&*shared, b"ab");
        assert!(shared.shares_buffer(directory.data()));
    }

    #[test]
    fn test_shared_bytes_nested_slices() {
        let outer = SharedBytes::from(b"0123456789".to_vec());
        let middle = outer.slice(2, 6).unwrap();
        assert_eq!(&*middle, b"234567");
        let inner = middle.slice(1, 3).unwrap();
        assert_eq!(&*inner, b"345");
        assert!(inner.shares_buffer(&outer));
        assert!(middle.slice(4, 3).is_err());
        assert!(middle.slice(u64::MAX, 1).is_err());
        assert!(middle.slice(6, 0).unwrap().is_empty());
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("archive:/CAB-1234/CAB-1234.resS"), "CAB-1234.resS");
        assert_eq!(base_name("CAB-1234"), "CAB-1234");
    }
}
