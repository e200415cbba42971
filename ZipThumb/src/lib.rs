//! # ZipThumb
//!
//! A pure-Rust library that finds a representative thumbnail inside a zipmod
//! archive: a ZIP file carrying character item catalogs, loose images, and
//! Unity asset bundles.
//!
//! ## Supported Formats
//!
//! - **Zipmod archives** - Catalog CSVs, studio thumbnails and folder images
//! - **UnityFS / UnityWeb / UnityRaw** - Asset bundles, stored or LZMA/LZ4 compressed
//! - **UnityWebData1.0** - Web data packs, plain, gzip or brotli encoded
//! - **Serialized files** - Object directories with `Texture2D` and `AssetBundle` decoding
//! - **Textures** - Uncompressed RGB/RGBA formats and BC1-BC7, plus PNG/JPEG entries
//!
//! ## Quick Start
//!
//! ### Resolving a Thumbnail
//!
//! ```no_run
//! use zipthumb::prelude::*;
//!
//! let resolver = ThumbnailResolver::new(ThumbnailConfig::default());
//! if let Some(thumb) = resolver.thumbnail_for_path("[Author] Hair Pack.zipmod", 256) {
//!     thumb.save("thumb.png").ok();
//! }
//! ```
//!
//! ### Reporting Failures
//!
//! [`ThumbnailResolver::thumbnail`] collapses every failure to `None`. Tools
//! that want the reason use `try_thumbnail`:
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use zipthumb::prelude::*;
//!
//! let resolver = ThumbnailResolver::default();
//! let file = BufReader::new(File::open("hair.zipmod")?);
//! match resolver.try_thumbnail(file, "hair.zipmod", 128)? {
//!     Some(thumb) => println!("{}x{}", thumb.width(), thumb.height()),
//!     None => println!("nothing to show"),
//! }
//! # Ok::<(), zipthumb::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `zipthumb` command-line binary

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod locator;
pub mod objects;
pub mod render;
pub mod resolver;
pub mod unity;

// Re-exports for convenience
pub use error::{Error, Result};
pub use resolver::ThumbnailResolver;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::config::{MaterializePolicy, ThumbnailConfig};
    pub use crate::resolver::ThumbnailResolver;

    // Archive and catalog
    pub use crate::archive::{ArchiveEntry, ModArchive, ScanResult};
    pub use crate::catalog::{CatalogItem, CategoryCatalog};

    // Unity containers and objects
    pub use crate::unity::{AssetTable, ContainerDispatcher, LoadedAssets, UnityVersion};
    pub use crate::objects::{MaterializedTable, ObjectKind, TextureFormat, TextureRecord};
    pub use crate::locator::{LocatedTexture, find_texture};

    // Rendering
    pub use crate::render::{BlockTextureCodec, TextureCodec, ThumbnailCache};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
