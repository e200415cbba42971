//! Texture lookup by name across materialized tables

use crate::objects::{MaterializedTable, TextureRecord};

/// A texture together with the index of the table it came from.
#[derive(Debug, Clone, Copy)]
pub struct LocatedTexture<'a> {
    pub table_index: usize,
    pub path_id: i64,
    pub texture: &'a TextureRecord,
}

/// First texture named exactly `name` (case-sensitive), in accumulation order.
pub fn find_texture<'a>(tables: &'a [MaterializedTable], name: &str) -> Option<LocatedTexture<'a>> {
    tables.iter().find_map(|table| {
        table.records.iter().find_map(|record| {
            record
                .as_texture()
                .filter(|texture| texture.name == name)
                .map(|texture| LocatedTexture {
                    table_index: table.table_index,
                    path_id: record.path_id,
                    texture,
                })
        })
    })
}
