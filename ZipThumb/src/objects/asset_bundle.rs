//! `AssetBundle` (class 142): the bundle's own manifest object

use crate::error::Result;
use crate::unity::{AssetTable, ObjectInfo};

use super::{PPtr, read_object_name};

/// One `m_Container` entry: an asset path and the object it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerAsset {
    pub path: String,
    pub preload_index: i32,
    pub preload_size: i32,
    pub asset: PPtr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBundleRecord {
    pub name: String,
    pub preload_table: Vec<PPtr>,
    pub container: Vec<ContainerAsset>,
}

/// Read an `AssetBundle` object.
pub fn read_asset_bundle(table: &AssetTable, object: &ObjectInfo) -> Result<AssetBundleRecord> {
    let mut reader = table.object_reader(object)?;
    let name = read_object_name(&mut reader, table)?;

    let preload_count = reader.read_count(PPtr::min_size(table))?;
    let mut preload_table = Vec::with_capacity(preload_count);
    for _ in 0..preload_count {
        preload_table.push(PPtr::read(&mut reader, table)?);
    }

    let container_count = reader.read_count(4 + 8 + PPtr::min_size(table))?;
    let mut container = Vec::with_capacity(container_count);
    for _ in 0..container_count {
        container.push(ContainerAsset {
            path: reader.read_aligned_string()?,
            preload_index: reader.read_i32()?,
            preload_size: reader.read_i32()?,
            asset: PPtr::read(&mut reader, table)?,
        });
    }

    Ok(AssetBundleRecord {
        name,
        preload_table,
        container,
    })
}
