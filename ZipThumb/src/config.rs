//! Resolver configuration (`zipthumb.toml`)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

lazy_static::lazy_static! {
    /// Directory holding the running executable, looked up once per process.
    static ref INSTALL_DIR: Option<PathBuf> = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
}

/// The directory this component is installed in, if it can be determined.
pub fn install_dir() -> Option<&'static Path> {
    INSTALL_DIR.as_deref()
}

fn default_catalog_cap() -> usize {
    1
}

fn default_exclusions() -> Vec<String> {
    vec!["QuickAccessBox".to_string()]
}

fn default_max_depth() -> usize {
    8
}

fn default_max_nodes() -> usize {
    4096
}

fn default_max_entry_bytes() -> u64 {
    128 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

/// What to do when a single object in an assets table fails to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterializePolicy {
    /// Log the failure and keep materializing the remaining objects.
    #[default]
    Skip,
    /// Stop at the first failure and propagate it.
    Abort,
}

/// Settings for one [`ThumbnailResolver`](crate::resolver::ThumbnailResolver).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Maximum catalog rows kept per category.
    #[serde(default = "default_catalog_cap")]
    pub catalog_cap: usize,
    /// Case-insensitive substrings of archive names that never get a thumbnail.
    #[serde(default = "default_exclusions")]
    pub exclusion_patterns: Vec<String>,
    /// Deepest container nesting that will be unpacked.
    #[serde(default = "default_max_depth")]
    pub max_container_depth: usize,
    /// Total container nodes that may be visited in one call.
    #[serde(default = "default_max_nodes")]
    pub max_container_nodes: usize,
    /// Archive entries larger than this are never read.
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
    /// Failure handling while materializing objects.
    pub materialize_policy: MaterializePolicy,
    /// Unity version assumed for serialized files whose version was stripped.
    pub fallback_unity_version: Option<String>,
    /// Thumbnail cache directory; defaults to `<install dir>/../../Thumbs`.
    pub cache_dir: Option<PathBuf>,
    /// Whether decoded images are written to the cache at all.
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            catalog_cap: default_catalog_cap(),
            exclusion_patterns: default_exclusions(),
            max_container_depth: default_max_depth(),
            max_container_nodes: default_max_nodes(),
            max_entry_bytes: default_max_entry_bytes(),
            materialize_policy: MaterializePolicy::default(),
            fallback_unity_version: None,
            cache_dir: None,
            cache_enabled: true,
        }
    }
}

impl ThumbnailConfig {
    /// Parse a config from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The cache directory to use, if caching is enabled and one can be determined.
    ///
    /// The directory is not created; a missing directory disables caching.
    pub fn resolved_cache_dir(&self) -> Option<PathBuf> {
        if !self.cache_enabled {
            return None;
        }
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        install_dir().map(|dir| dir.join("..").join("..").join("Thumbs"))
    }

    /// Whether `display_name` matches one of the exclusion patterns.
    pub fn is_excluded(&self, display_name: &str) -> bool {
        let lower = display_name.to_lowercase();
        self.exclusion_patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && lower.contains(&pattern.to_lowercase()))
    }
}
