use clap::Subcommand;
use std::path::{Path, PathBuf};

use crate::config::ThumbnailConfig;

pub mod scan;
pub mod textures;
pub mod thumbnail;

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the thumbnail of a zipmod archive and save it as PNG
    Thumbnail {
        /// Source zipmod archive
        #[arg(short, long)]
        source: PathBuf,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Longest edge of the thumbnail in pixels
        #[arg(long, default_value_t = 256)]
        size: u32,

        /// Resolver settings (zipthumb.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Cache directory, overriding the config
        #[arg(long, conflicts_with = "no_cache")]
        cache_dir: Option<PathBuf>,

        /// Do not write decoded images to the cache
        #[arg(long)]
        no_cache: bool,
    },

    /// List the catalogs, studio thumbnails and catalog items of an archive
    Scan {
        /// Source zipmod archive
        #[arg(short, long)]
        source: PathBuf,

        /// Resolver settings (zipthumb.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the textures inside a Unity bundle entry of an archive
    Textures {
        /// Source zipmod archive
        #[arg(short, long)]
        source: PathBuf,

        /// Bundle entry path; defaults to the first catalog item's bundle
        #[arg(short, long)]
        entry: Option<String>,

        /// Resolver settings (zipthumb.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Thumbnail {
                source,
                output,
                size,
                config,
                cache_dir,
                no_cache,
            } => thumbnail::execute(
                source,
                output,
                *size,
                thumbnail::CacheOptions {
                    config: config.clone(),
                    cache_dir: cache_dir.clone(),
                    no_cache: *no_cache,
                },
            ),
            Commands::Scan { source, config } => scan::execute(source, config.as_deref()),
            Commands::Textures { source, entry, config } => {
                textures::execute(source, entry.as_deref(), config.as_deref())
            }
        }
    }
}

/// Load the config file if one was given, otherwise the defaults.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<ThumbnailConfig> {
    match path {
        Some(path) => Ok(ThumbnailConfig::load(path)?),
        None => Ok(ThumbnailConfig::default()),
    }
}
