//! Character item catalogs (`abdata/list/characustom/*.csv`)
//!
//! A catalog CSV starts with a fixed four-row preamble:
//!
//! ```text
//! 1                      <- category id
//! 0                      <- distribution number (ignored)
//! chara/00.unity3d       <- list path (ignored)
//! ID,Kind,Name,...,ThumbAB,ThumbTex,...
//! 100,0,Hair,...,chara/thumb_00.unity3d,thumb_hair_100
//! ```
//!
//! Only the `ThumbAB` (bundle reference) and `ThumbTex` (texture reference)
//! columns are used.

use std::io::Read;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// Header of the bundle reference column.
pub const BUNDLE_COLUMN: &str = "ThumbAB";

/// Header of the texture reference column.
pub const TEXTURE_COLUMN: &str = "ThumbTex";

const MIN_HEADER_COLUMNS: usize = 4;

/// One `(bundle reference, texture reference)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    /// Bundle path relative to `abdata/`.
    pub bundle: String,
    /// Texture object name inside the bundle.
    pub texture: String,
}

/// Category id → items, in the order categories were first seen.
#[derive(Debug, Clone, Default)]
pub struct CategoryCatalog {
    items: IndexMap<i32, Vec<CatalogItem>>,
    cap: usize,
}

impl CategoryCatalog {
    /// Create an empty catalog holding at most `cap` items per category.
    pub fn new(cap: usize) -> Self {
        Self {
            items: IndexMap::new(),
            cap,
        }
    }

    /// Whether no items were collected.
    pub fn is_empty(&self) -> bool {
        self.items.values().all(Vec::is_empty)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Items collected for `category`.
    pub fn get(&self, category: i32) -> Option<&[CatalogItem]> {
        self.items.get(&category).map(Vec::as_slice)
    }

    /// First item of the first category, by accumulation order.
    pub fn first_item(&self) -> Option<(i32, &CatalogItem)> {
        self.items
            .iter()
            .find_map(|(category, items)| items.first().map(|item| (*category, item)))
    }

    /// Iterate categories in accumulation order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[CatalogItem])> {
        self.items.iter().map(|(category, items)| (*category, items.as_slice()))
    }

    fn is_full(&self, category: i32) -> bool {
        self.items.get(&category).map_or(0, Vec::len) >= self.cap
    }

    /// Append an item unless the category already holds `cap` items.
    pub fn push(&mut self, category: i32, item: CatalogItem) -> bool {
        if self.is_full(category) {
            return false;
        }
        self.items.entry(category).or_default().push(item);
        true
    }

    /// Load one catalog CSV stream into this catalog.
    ///
    /// A malformed preamble or header rejects the whole entry; a malformed data
    /// row only stops reading further rows. Returns the number of items added.
    pub fn load<R: Read>(&mut self, entry_name: &str, reader: R) -> Result<usize> {
        let malformed = |reason: &str| Error::MalformedCatalog {
            entry: entry_name.to_string(),
            reason: reason.to_string(),
        };

        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = csv.records();

        let first = records.next().ok_or_else(|| malformed("empty file"))??;
        let raw_category = first.get(0).unwrap_or_default().trim_start_matches('\u{feff}');
        let category: i32 = raw_category
            .parse()
            .map_err(|_| malformed(&format!("category id '{raw_category}' is not numeric")))?;

        // distribution number and list path
        for _ in 0..2 {
            records.next().ok_or_else(|| malformed("truncated preamble"))??;
        }

        let header = records.next().ok_or_else(|| malformed("missing header row"))??;
        if header.len() < MIN_HEADER_COLUMNS {
            return Err(malformed(&format!("header has only {} columns", header.len())));
        }
        let bundle_col = header
            .iter()
            .position(|h| h == BUNDLE_COLUMN)
            .ok_or_else(|| malformed("missing ThumbAB column"))?;
        let texture_col = header
            .iter()
            .position(|h| h == TEXTURE_COLUMN)
            .ok_or_else(|| malformed("missing ThumbTex column"))?;
        let required = bundle_col.max(texture_col) + 1;

        let mut added = 0;
        while !self.is_full(category) {
            let row = match records.next() {
                Some(Ok(row)) => row,
                Some(Err(e)) => {
                    tracing::debug!("Stopping catalog {entry_name} at bad row: {e}");
                    break;
                }
                None => break,
            };
            if row.len() < 2 || row.len() < required {
                tracing::debug!(
                    "Stopping catalog {entry_name}: row has {} of {required} columns",
                    row.len()
                );
                break;
            }
            let item = CatalogItem {
                bundle: row[bundle_col].to_string(),
                texture: row[texture_col].to_string(),
            };
            if self.push(category, item) {
                added += 1;
            }
        }

        Ok(added)
    }
}
