//! CLI command for resolving an archive's thumbnail

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::resolver::ThumbnailResolver;

/// Config and cache overrides for a thumbnail run.
pub struct CacheOptions {
    pub config: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
}

pub fn execute(source: &Path, output: &Path, size: u32, options: CacheOptions) -> anyhow::Result<()> {
    let mut config = super::load_config(options.config.as_deref())?;
    if options.no_cache {
        config.cache_enabled = false;
    }
    if let Some(dir) = options.cache_dir {
        config.cache_dir = Some(dir);
        config.cache_enabled = true;
    }

    let display_name = source
        .file_name()
        .map_or_else(|| source.to_string_lossy(), |name| name.to_string_lossy());
    let resolver = ThumbnailResolver::new(config);
    let reader = BufReader::new(File::open(source)?);

    match resolver.try_thumbnail(reader, &display_name, size)? {
        Some(thumb) => {
            thumb.save(output)?;
            println!("{} -> {} ({}x{})", source.display(), output.display(), thumb.width(), thumb.height());
        }
        None => println!("No thumbnail for {}", source.display()),
    }

    Ok(())
}
