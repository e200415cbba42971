//! CLI command for listing what an archive offers as thumbnail sources

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::archive::{self, ModArchive};
use crate::render::format_file_size;
use crate::resolver::{folder_image_path, load_catalogs};

pub fn execute(source: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config)?;
    let mut zipmod = ModArchive::new(BufReader::new(File::open(source)?))?;

    let scan = archive::scan(zipmod.entries(), 1);
    println!("Archive: {} ({} entries)", source.display(), zipmod.len());
    println!();

    println!("Catalogs ({}):", scan.catalogs.len());
    for entry in &scan.catalogs {
        println!("  {} [{}, {}]", entry.path, entry.method_name(), format_file_size(entry.size));
    }

    print!("Studio thumbnail: ");
    match scan.studio_thumbnails.first() {
        Some(entry) => println!("{}", entry.path),
        None if scan.has_studio_folder => println!("none"),
        None => println!("none (no studio folder)"),
    }

    let catalog = load_catalogs(&mut zipmod, &scan.catalogs, &config);
    println!();
    println!("Catalog items ({} categories):", catalog.len());
    for (category, items) in catalog.iter() {
        for item in items {
            println!("  {category:>8}  {} / {}", item.bundle, item.texture);
        }
    }

    if let Some((_, item)) = catalog.first_item() {
        let bundle_path = format!("{}{}", archive::ABDATA_ROOT, item.bundle);
        let folder_path = folder_image_path(item);
        println!();
        println!("Candidates:");
        for path in [bundle_path, folder_path] {
            let found = zipmod.find(&path).is_some();
            println!("  {} {path}", if found { "+" } else { "-" });
        }
    }

    Ok(())
}
