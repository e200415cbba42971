//! Zipmod archive scanning
//!
//! Thin layer over [`zip::ZipArchive`] that enumerates entries, buckets them by
//! path pattern and hands out entry streams through scoped closures, so every
//! stream is dropped before the call that opened it returns.

use std::io::{Read, Seek};

use regex::Regex;
use zip::{CompressionMethod, ZipArchive};

use crate::error::{Error, Result};

/// Root folder for game data inside a zipmod.
pub const ABDATA_ROOT: &str = "abdata/";

/// Prefix of character item list catalogs.
pub const CATALOG_PREFIX: &str = "abdata/list/characustom";

lazy_static::lazy_static! {
    /// Final path segment of a ready-made studio thumbnail, e.g. `00000001-00000002.png`.
    static ref STUDIO_THUMB_NAME: Regex = Regex::new(r"(?i)^\d{8}-\d{8}\.png$")
        .expect("studio thumbnail pattern is valid");
}

/// Metadata for one entry of the outer archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Position in the central directory.
    pub index: usize,
    /// `/`-delimited path inside the archive.
    pub path: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
    /// Compression method.
    pub compression: CompressionMethod,
}

impl ArchiveEntry {
    /// Final path segment.
    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    /// Human-readable compression method name.
    pub fn method_name(&self) -> String {
        method_name(self.compression)
    }
}

/// Bucket an entry falls into, decided by name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `abdata/list/characustom*.csv`
    CatalogCsv,
    /// `abdata/**/NNNNNNNN-NNNNNNNN.png`
    StudioThumbnail,
    /// Anything else.
    Other,
}

/// Classify an entry path. No content is read.
pub fn classify(path: &str) -> EntryKind {
    if starts_with_ignore_case(path, CATALOG_PREFIX) && ends_with_ignore_case(path, ".csv") {
        EntryKind::CatalogCsv
    } else if starts_with_ignore_case(path, ABDATA_ROOT)
        && ends_with_ignore_case(path, ".png")
        && STUDIO_THUMB_NAME.is_match(file_name(path))
    {
        EntryKind::StudioThumbnail
    } else {
        EntryKind::Other
    }
}

/// Final `/`-delimited segment of a path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Name used for cache keys: `Stored`, `Deflated`, ...
pub fn method_name(method: CompressionMethod) -> String {
    match method {
        CompressionMethod::Stored => "Stored".to_string(),
        CompressionMethod::Deflated => "Deflated".to_string(),
        other => format!("{other:?}"),
    }
}

pub(crate) fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

pub(crate) fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    s.len() >= suffix.len()
        && s.is_char_boundary(s.len() - suffix.len())
        && s[s.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// An opened zipmod archive.
pub struct ModArchive<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> ModArchive<R> {
    /// Open an archive from a stream positioned at offset 0.
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            zip: ZipArchive::new(reader)?,
        })
    }

    /// Number of entries in the central directory.
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    /// Whether the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Enumerate file entries lazily, skipping directories and unreadable records.
    pub fn entries(&mut self) -> impl Iterator<Item = ArchiveEntry> + '_ {
        let count = self.zip.len();
        (0..count).filter_map(move |index| self.entry_at(index))
    }

    /// Look up an entry by path: exact match first, then case-insensitive.
    pub fn find(&mut self, path: &str) -> Option<ArchiveEntry> {
        if let Some(index) = self.zip.index_for_name(path) {
            return self.entry_at(index);
        }
        self.entries().find(|entry| entry.path.eq_ignore_ascii_case(path))
    }

    fn entry_at(&mut self, index: usize) -> Option<ArchiveEntry> {
        let file = match self.zip.by_index_raw(index) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("Skipping unreadable entry #{index}: {e}");
                return None;
            }
        };
        if file.is_dir() {
            return None;
        }
        Some(ArchiveEntry {
            index,
            path: file.name().replace('\\', "/"),
            size: file.size(),
            compressed_size: file.compressed_size(),
            compression: file.compression(),
        })
    }

    /// Open the entry's decompressed stream for the duration of `f`.
    pub fn with_entry<T>(
        &mut self,
        entry: &ArchiveEntry,
        f: impl FnOnce(&mut dyn Read) -> Result<T>,
    ) -> Result<T> {
        let mut file = self.zip.by_index(entry.index)?;
        f(&mut file)
    }

    /// Read an entry fully, refusing entries above `limit` bytes.
    pub fn read_entry(&mut self, entry: &ArchiveEntry, limit: u64) -> Result<Vec<u8>> {
        if entry.size > limit {
            return Err(Error::EntryTooLarge {
                name: entry.path.clone(),
                size: entry.size,
                limit,
            });
        }
        self.with_entry(entry, |reader| {
            let mut buffer = Vec::with_capacity(entry.size as usize);
            reader.take(entry.size).read_to_end(&mut buffer)?;
            if buffer.len() as u64 != entry.size {
                return Err(Error::TruncatedEntry {
                    name: entry.path.clone(),
                    expected: entry.size,
                    actual: buffer.len() as u64,
                });
            }
            Ok(buffer)
        })
    }
}

/// Result of one pass over the archive's entry list.
#[derive(Debug, Default, Clone)]
pub struct ScanResult {
    /// Catalog CSV entries in archive order.
    pub catalogs: Vec<ArchiveEntry>,
    /// Studio thumbnail candidates (at most `studio_cap`).
    pub studio_thumbnails: Vec<ArchiveEntry>,
    /// Whether any entry path mentions `studio`.
    pub has_studio_folder: bool,
}

/// Single pass over `entries`, bucketing catalogs and studio thumbnail candidates.
///
/// Studio candidates only count when some entry path mentions `studio`.
pub fn scan(entries: impl IntoIterator<Item = ArchiveEntry>, studio_cap: usize) -> ScanResult {
    let mut result = ScanResult::default();
    let mut candidates = Vec::new();

    for entry in entries {
        if !result.has_studio_folder && entry.path.to_lowercase().contains("studio") {
            result.has_studio_folder = true;
        }
        match classify(&entry.path) {
            EntryKind::CatalogCsv => result.catalogs.push(entry),
            EntryKind::StudioThumbnail => {
                if candidates.len() < studio_cap {
                    candidates.push(entry);
                }
            }
            EntryKind::Other => {}
        }
    }

    if result.has_studio_folder {
        result.studio_thumbnails = candidates;
    }
    result
}
