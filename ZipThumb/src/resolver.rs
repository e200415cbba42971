//! Thumbnail resolution for one zipmod archive
//!
//! The lookup order is fixed:
//!
//! 1. Excluded archive names get no thumbnail and are never opened.
//! 2. With no character item catalog, a ready-made studio thumbnail is used
//!    as a plain image, if one exists.
//! 3. Otherwise the first catalog item is resolved, first as a texture in
//!    `abdata/<bundle>`, then as `abdata/<bundle stem>/<texture>.png`.
//!
//! Every failure collapses to "no thumbnail" at [`ThumbnailResolver::thumbnail`];
//! [`ThumbnailResolver::try_thumbnail`] keeps the error for tooling.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use image::RgbaImage;

use crate::archive::{self, ABDATA_ROOT, ArchiveEntry, ModArchive};
use crate::catalog::{CatalogItem, CategoryCatalog};
use crate::config::ThumbnailConfig;
use crate::error::Result;
use crate::locator;
use crate::objects;
use crate::render::{BlockTextureCodec, CacheKey, TextureCodec, ThumbnailCache, decode_image, encode_png, fit_to_edge};
use crate::unity::ContainerDispatcher;

/// Studio thumbnails considered per archive.
const STUDIO_CANDIDATE_CAP: usize = 1;

/// Load every catalog entry into one capped catalog. Broken entries are logged and skipped.
pub fn load_catalogs<R: Read + Seek>(
    archive: &mut ModArchive<R>,
    entries: &[ArchiveEntry],
    config: &ThumbnailConfig,
) -> CategoryCatalog {
    let mut catalog = CategoryCatalog::new(config.catalog_cap);
    for entry in entries {
        if entry.size > config.max_entry_bytes {
            tracing::debug!("Skipping oversized catalog {} ({} bytes)", entry.path, entry.size);
            continue;
        }
        match archive.with_entry(entry, |reader| catalog.load(&entry.path, reader)) {
            Ok(added) => tracing::debug!("Catalog {}: {added} items", entry.path),
            Err(e) => tracing::debug!("Skipping catalog {}: {e}", entry.path),
        }
    }
    catalog
}

/// Folder-style image path for a catalog item: `abdata/<bundle minus extension>/<texture>.png`.
pub fn folder_image_path(item: &CatalogItem) -> String {
    let stem = match item.bundle.rfind('.') {
        Some(index) if index > 0 => &item.bundle[..index],
        _ => item.bundle.as_str(),
    };
    format!("{ABDATA_ROOT}{stem}/{}.png", item.texture)
}

/// Resolves zipmod thumbnails. Holds no per-archive state.
#[derive(Debug, Clone)]
pub struct ThumbnailResolver<C: TextureCodec = BlockTextureCodec> {
    config: ThumbnailConfig,
    codec: C,
}

impl ThumbnailResolver<BlockTextureCodec> {
    pub fn new(config: ThumbnailConfig) -> Self {
        Self::with_codec(config, BlockTextureCodec)
    }
}

impl Default for ThumbnailResolver<BlockTextureCodec> {
    fn default() -> Self {
        Self::new(ThumbnailConfig::default())
    }
}

impl<C: TextureCodec> ThumbnailResolver<C> {
    /// Use a custom texture codec.
    pub fn with_codec(config: ThumbnailConfig, codec: C) -> Self {
        Self { config, codec }
    }

    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Thumbnail for the archive in `reader`, scaled to fit `edge`, or `None`.
    ///
    /// `display_name` is the archive's file name; it drives exclusion and cache naming.
    pub fn thumbnail<R: Read + Seek>(&self, reader: R, display_name: &str, edge: u32) -> Option<RgbaImage> {
        match self.try_thumbnail(reader, display_name, edge) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!("No thumbnail for {display_name}: {e}");
                None
            }
        }
    }

    /// Thumbnail for an archive on disk.
    pub fn thumbnail_for_path<P: AsRef<Path>>(&self, path: P, edge: u32) -> Option<RgbaImage> {
        let path = path.as_ref();
        let display_name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy());
        if self.config.is_excluded(&display_name) {
            tracing::debug!("{display_name} is excluded");
            return None;
        }
        match File::open(path) {
            Ok(file) => self.thumbnail(BufReader::new(file), &display_name, edge),
            Err(e) => {
                tracing::warn!("Cannot open {}: {e}", path.display());
                None
            }
        }
    }

    /// Like [`thumbnail`](Self::thumbnail) but reports why resolution failed.
    ///
    /// `Ok(None)` means the archive simply has nothing to show.
    pub fn try_thumbnail<R: Read + Seek>(
        &self,
        reader: R,
        display_name: &str,
        edge: u32,
    ) -> Result<Option<RgbaImage>> {
        if self.config.is_excluded(display_name) {
            tracing::debug!("{display_name} is excluded");
            return Ok(None);
        }

        let mut resolution = Resolution {
            archive: ModArchive::new(reader)?,
            display_name,
            edge,
            cache: self.config.resolved_cache_dir().and_then(ThumbnailCache::open),
            config: &self.config,
            codec: &self.codec,
        };
        resolution.run()
    }
}

/// State owned by one resolution call; dropped (with the archive) when the call returns.
struct Resolution<'a, R: Read + Seek, C: TextureCodec> {
    archive: ModArchive<R>,
    display_name: &'a str,
    edge: u32,
    cache: Option<ThumbnailCache>,
    config: &'a ThumbnailConfig,
    codec: &'a C,
}

impl<R: Read + Seek, C: TextureCodec> Resolution<'_, R, C> {
    fn run(&mut self) -> Result<Option<RgbaImage>> {
        let scan = archive::scan(self.archive.entries(), STUDIO_CANDIDATE_CAP);
        let catalog = load_catalogs(&mut self.archive, &scan.catalogs, self.config);

        let Some((category, item)) = catalog.first_item() else {
            return match scan.studio_thumbnails.first() {
                Some(entry) => {
                    tracing::debug!("{}: using studio thumbnail {}", self.display_name, entry.path);
                    let item_name = Path::new(entry.file_name())
                        .file_stem()
                        .map_or_else(|| entry.file_name().to_string(), |s| s.to_string_lossy().into_owned());
                    self.plain_image(entry, &item_name)
                }
                None => {
                    tracing::debug!("{}: no catalog and no studio thumbnail", self.display_name);
                    Ok(None)
                }
            };
        };

        tracing::debug!(
            "{}: category {category} item {} / {}",
            self.display_name,
            item.bundle,
            item.texture
        );
        self.catalog_item(item)
    }

    fn catalog_item(&mut self, item: &CatalogItem) -> Result<Option<RgbaImage>> {
        let bundle_path = format!("{ABDATA_ROOT}{}", item.bundle);
        if let Some(entry) = self.archive.find(&bundle_path) {
            return self.bundle_image(&entry, &item.texture);
        }

        let folder_path = folder_image_path(item);
        if let Some(entry) = self.archive.find(&folder_path) {
            return self.plain_image(&entry, &item.texture);
        }

        tracing::debug!("{}: neither {bundle_path} nor {folder_path} exists", self.display_name);
        Ok(None)
    }

    fn bundle_image(&mut self, entry: &ArchiveEntry, texture_name: &str) -> Result<Option<RgbaImage>> {
        let data = self.archive.read_entry(entry, self.config.max_entry_bytes)?;
        let loaded = ContainerDispatcher::new(self.config).load(self.display_name, &entry.path, data)?;
        let tables = objects::materialize_all(&loaded, self.config.materialize_policy)?;

        let Some(found) = locator::find_texture(&tables, texture_name) else {
            tracing::debug!("{}: no texture named {texture_name} in {}", self.display_name, entry.path);
            return Ok(None);
        };
        let table = &loaded.tables[found.table_index];
        let pixels = found.texture.pixel_data(table, &loaded)?;
        let decoded = self.codec.decode(found.texture, pixels)?;

        if let Some(cache) = &self.cache {
            let key = CacheKey::new(self.display_name, texture_name, entry.method_name()).with_size(entry.size);
            match encode_png(&decoded) {
                Ok(png) => {
                    cache.store(&key, &png);
                }
                Err(e) => tracing::warn!("Not caching {}: {e}", key.file_name()),
            }
        }

        Ok(fit_to_edge(&decoded, self.edge))
    }

    fn plain_image(&mut self, entry: &ArchiveEntry, item_name: &str) -> Result<Option<RgbaImage>> {
        let bytes = self.archive.read_entry(entry, self.config.max_entry_bytes)?;
        let decoded = decode_image(&bytes, &entry.path)?;
        if let Some(cache) = &self.cache {
            cache.store(&CacheKey::new(self.display_name, item_name, entry.method_name()), &bytes);
        }
        Ok(fit_to_edge(&decoded, self.edge))
    }
}
