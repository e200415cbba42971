//! Write-once thumbnail cache
//!
//! Files are named `<archive stem> [<item>] <method>[ <size>].png` and are
//! created with `create_new`, so concurrent writers race harmlessly and an
//! existing file is never rewritten.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Human-readable size: `512.00 B`, `1.50 MB`.
pub fn format_file_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", SIZE_UNITS[unit])
}

/// Components of a cache file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Archive file name without its extension.
    pub archive_stem: String,
    /// Texture or image name.
    pub item: String,
    /// Compression method of the source entry.
    pub method: String,
    /// Formatted size of the source bundle, for bundle-sourced images.
    pub size_label: Option<String>,
}

impl CacheKey {
    pub fn new(archive_name: &str, item: impl Into<String>, method: impl Into<String>) -> Self {
        let archive_stem = Path::new(archive_name)
            .file_stem()
            .map_or_else(|| archive_name.to_string(), |stem| stem.to_string_lossy().into_owned());
        Self {
            archive_stem,
            item: item.into(),
            method: method.into(),
            size_label: None,
        }
    }

    #[must_use]
    pub fn with_size(mut self, bytes: u64) -> Self {
        self.size_label = Some(format_file_size(bytes));
        self
    }

    pub fn file_name(&self) -> String {
        match &self.size_label {
            Some(size) => format!("{} [{}] {} {size}.png", self.archive_stem, self.item, self.method),
            None => format!("{} [{}] {}.png", self.archive_stem, self.item, self.method),
        }
    }
}

/// Thumbnail cache rooted at an existing directory.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    dir: PathBuf,
}

impl ThumbnailCache {
    /// Open the cache if `dir` exists; a missing directory disables caching.
    pub fn open(dir: impl Into<PathBuf>) -> Option<Self> {
        let dir = dir.into();
        if dir.is_dir() {
            Some(Self { dir })
        } else {
            tracing::debug!("Thumbnail cache directory {} is missing, caching disabled", dir.display());
            None
        }
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Write `bytes` unless the file exists. Returns whether a file was created.
    pub fn try_store(&self, key: &CacheKey, bytes: &[u8]) -> Result<bool> {
        let path = self.path_for(key);
        let write_failed = |e: std::io::Error| Error::CacheWriteFailed {
            path: path.clone(),
            message: e.to_string(),
        };
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(write_failed(e)),
        };
        file.write_all(bytes).map_err(write_failed)?;
        Ok(true)
    }

    /// Best-effort store: failures are logged and swallowed.
    pub fn store(&self, key: &CacheKey, bytes: &[u8]) -> bool {
        match self.try_store(key, bytes) {
            Ok(created) => {
                if created {
                    tracing::debug!("Cached thumbnail {}", key.file_name());
                }
                created
            }
            Err(e) => {
                tracing::warn!("{e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.00 B");
        assert_eq!(format_file_size(512), "512.00 B");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_file_names() {
        let key = CacheKey::new("[Author] Hair Pack.zipmod", "tex_00", "Deflated");
        assert_eq!(key.file_name(), "[Author] Hair Pack [tex_00] Deflated.png");
        let key = key.with_size(2048);
        assert_eq!(key.file_name(), "[Author] Hair Pack [tex_00] Deflated 2.00 KB.png");
    }

    #[test]
    fn test_store_is_write_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ThumbnailCache::open(dir.path()).unwrap();
        let key = CacheKey::new("mod.zipmod", "00000001-00000002", "Stored");

        assert!(cache.store(&key, b"first"));
        let path = cache.path_for(&key);
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert!(!cache.store(&key, b"second"));
        assert_eq!(std::fs::read(&path).unwrap(), b"first");
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[test]
    fn test_missing_directory_disables_cache() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ThumbnailCache::open(dir.path().join("Thumbs")).is_none());
    }
}
