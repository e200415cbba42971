//! CLI command for listing the textures of a bundle entry

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::Context;

use crate::archive::{self, ABDATA_ROOT, ModArchive};
use crate::objects::{self, PixelPayload};
use crate::resolver::load_catalogs;
use crate::unity::ContainerDispatcher;

pub fn execute(source: &Path, entry: Option<&str>, config: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let mut zipmod = ModArchive::new(BufReader::new(File::open(source)?))?;

    let entry_path = match entry {
        Some(path) => path.to_string(),
        None => {
            let scan = archive::scan(zipmod.entries(), 1);
            let catalog = load_catalogs(&mut zipmod, &scan.catalogs, &config);
            let (_, item) = catalog
                .first_item()
                .context("no catalog item names a bundle; pass --entry")?;
            format!("{ABDATA_ROOT}{}", item.bundle)
        }
    };
    let bundle = zipmod
        .find(&entry_path)
        .with_context(|| format!("{entry_path} not found in {}", source.display()))?;

    let data = zipmod.read_entry(&bundle, config.max_entry_bytes)?;
    let parent = source.to_string_lossy();
    let loaded = ContainerDispatcher::new(&config).load(&parent, &bundle.path, data)?;
    let tables = objects::materialize_all(&loaded, config.materialize_policy)?;

    println!("{} ({} assets tables)", bundle.path, tables.len());
    for table in &tables {
        let source_table = &loaded.tables[table.table_index];
        println!();
        println!("{} (Unity {}, {} objects)", table.name, source_table.unity_version, table.records.len());
        for record in &table.records {
            let Some(texture) = record.as_texture() else {
                continue;
            };
            let location = match &texture.payload {
                PixelPayload::Embedded { size, .. } => format!("embedded, {size} bytes"),
                PixelPayload::Streamed { path, size, .. } => format!("{path}, {size} bytes"),
            };
            println!(
                "  {:>20}  {}  {}x{}  {:?}  mips {}  ({location})",
                record.path_id, texture.name, texture.width, texture.height, texture.format, texture.mip_count
            );
        }
    }

    let resources: Vec<&str> = loaded.resource_names().collect();
    if !resources.is_empty() {
        println!();
        println!("Resources:");
        for name in resources {
            println!("  {name}");
        }
    }

    Ok(())
}
