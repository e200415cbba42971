//! Object materialization
//!
//! Turns each assets table's object directory into records. Only a small
//! allowlist of classes is decoded; everything else stays opaque and keeps
//! just its class id, offset and size.

pub mod asset_bundle;
pub mod texture;

pub use asset_bundle::{AssetBundleRecord, ContainerAsset};
pub use texture::{PixelPayload, TextureFormat, TextureRecord};

use crate::config::MaterializePolicy;
use crate::error::{Error, Result};
use crate::unity::reader::EndianReader;
use crate::unity::serialized::PLATFORM_NO_TARGET;
use crate::unity::{AssetTable, LoadedAssets, ObjectInfo};

/// Unity class ids this crate decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassId {
    Texture2D,
    AssetBundle,
    Other(i32),
}

impl ClassId {
    pub fn from_raw(value: i32) -> Self {
        match value {
            28 => Self::Texture2D,
            142 => Self::AssetBundle,
            other => Self::Other(other),
        }
    }

    pub fn raw(self) -> i32 {
        match self {
            Self::Texture2D => 28,
            Self::AssetBundle => 142,
            Self::Other(value) => value,
        }
    }
}

/// Reference to an object in this or an external file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PPtr {
    pub file_id: i32,
    pub path_id: i64,
}

impl PPtr {
    pub fn read(reader: &mut EndianReader<'_>, table: &AssetTable) -> Result<Self> {
        let file_id = reader.read_i32()?;
        let path_id = if table.format_version() < 14 {
            i64::from(reader.read_i32()?)
        } else {
            reader.read_i64()?
        };
        Ok(Self { file_id, path_id })
    }

    /// Encoded size in bytes.
    pub fn min_size(table: &AssetTable) -> usize {
        if table.format_version() < 14 { 8 } else { 12 }
    }
}

/// Read the `Object`/`EditorExtension`/`NamedObject` prefix and return `m_Name`.
///
/// Editor builds (`NoTarget`) carry hide flags and two prefab references first.
pub(crate) fn read_object_name(reader: &mut EndianReader<'_>, table: &AssetTable) -> Result<String> {
    if table.platform == PLATFORM_NO_TARGET {
        reader.read_u32()?; // hide flags
        PPtr::read(reader, table)?; // prefab parent
        PPtr::read(reader, table)?; // prefab internal
    }
    reader.read_aligned_string()
}

/// Decoded payload of one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    AssetBundle(AssetBundleRecord),
    Texture2D(TextureRecord),
    /// Not on the allowlist; never decoded.
    Opaque,
}

/// One materialized object directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub path_id: i64,
    pub class_id: ClassId,
    pub byte_start: u64,
    pub byte_size: u32,
    pub kind: ObjectKind,
}

impl ObjectRecord {
    pub fn as_texture(&self) -> Option<&TextureRecord> {
        match &self.kind {
            ObjectKind::Texture2D(texture) => Some(texture),
            _ => None,
        }
    }
}

/// Records of one assets table, in directory order.
#[derive(Debug, Clone)]
pub struct MaterializedTable {
    /// Index of the source table in [`LoadedAssets::tables`].
    pub table_index: usize,
    pub name: String,
    pub records: Vec<ObjectRecord>,
}

fn materialize_object(table: &AssetTable, object: &ObjectInfo) -> Result<ObjectRecord> {
    let class_id = ClassId::from_raw(object.class_id);
    let kind = match class_id {
        ClassId::Texture2D => ObjectKind::Texture2D(texture::read_texture(table, object)?),
        ClassId::AssetBundle => ObjectKind::AssetBundle(asset_bundle::read_asset_bundle(table, object)?),
        ClassId::Other(_) => ObjectKind::Opaque,
    };
    Ok(ObjectRecord {
        path_id: object.path_id,
        class_id,
        byte_start: object.byte_start,
        byte_size: object.byte_size,
        kind,
    })
}

/// Materialize every object of one table.
///
/// With [`MaterializePolicy::Abort`] the first failure is returned; with
/// [`MaterializePolicy::Skip`] the failing object is logged and left out.
pub fn materialize_table(
    table: &AssetTable,
    table_index: usize,
    policy: MaterializePolicy,
) -> Result<MaterializedTable> {
    let mut records = Vec::with_capacity(table.objects.len());
    for object in &table.objects {
        match materialize_object(table, object) {
            Ok(record) => records.push(record),
            Err(source) => {
                let error = Error::ObjectMaterialization {
                    table: table.name.clone(),
                    class_id: object.class_id,
                    path_id: object.path_id,
                    source: Box::new(source),
                };
                match policy {
                    MaterializePolicy::Abort => return Err(error),
                    MaterializePolicy::Skip => tracing::warn!("Skipping object: {error}"),
                }
            }
        }
    }
    Ok(MaterializedTable {
        table_index,
        name: table.name.clone(),
        records,
    })
}

/// Materialize all tables in accumulation order.
pub fn materialize_all(loaded: &LoadedAssets, policy: MaterializePolicy) -> Result<Vec<MaterializedTable>> {
    loaded
        .tables
        .iter()
        .enumerate()
        .map(|(index, table)| materialize_table(table, index, policy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unity::fixtures::{self, FixtureObject, SerializedLayout, TextureFixture};
    use crate::unity::UnityVersion;

    fn mixed_table() -> AssetTable {
        let version = UnityVersion::new(5, 6, 2);
        let good = TextureFixture {
            name: "tex_ok",
            width: 1,
            height: 1,
            format: 4,
            image: &[9, 9, 9, 9],
            stream: None,
        }
        .encode(version);
        let objects = [
            FixtureObject::opaque(1, 1, b"gameobject".to_vec()),
            FixtureObject::opaque(2, 28, vec![0xFF; 3]),
            FixtureObject::opaque(3, 28, good),
        ];
        AssetTable::parse("CAB-mixed", fixtures::serialized_file("5.6.2f1", &objects), None).unwrap()
    }

    #[test]
    fn test_skip_policy_keeps_siblings() {
        let table = mixed_table();
        let materialized = materialize_table(&table, 0, MaterializePolicy::Skip).unwrap();
        let ids: Vec<_> = materialized.records.iter().map(|r| r.path_id).collect();
        assert_eq!(ids, [1, 3]);
        assert_eq!(materialized.records[0].kind, ObjectKind::Opaque);
        assert_eq!(materialized.records[1].as_texture().unwrap().name, "tex_ok");
    }

    #[test]
    fn test_abort_policy_reports_context() {
        let table = mixed_table();
        let err = materialize_table(&table, 0, MaterializePolicy::Abort).unwrap_err();
        match err {
            Error::ObjectMaterialization {
                table,
                class_id,
                path_id,
                ..
            } => {
                assert_eq!(table, "CAB-mixed");
                assert_eq!(class_id, 28);
                assert_eq!(path_id, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_editor_objects_skip_prefab_references() {
        let version = UnityVersion::new(5, 6, 2);
        let pixels = fixtures::solid_rgba(2, 1, [4, 5, 6, 255]);
        let texture = TextureFixture {
            name: "tex_editor",
            width: 2,
            height: 1,
            format: 4,
            image: &pixels,
            stream: None,
        }
        .encode(version);

        for format in [13, 17] {
            let mut body = fixtures::editor_prefix(format);
            body.extend_from_slice(&texture);
            let layout = SerializedLayout {
                format,
                platform: PLATFORM_NO_TARGET,
                ..SerializedLayout::default()
            };
            let bytes = fixtures::serialized_file_with(layout, "5.6.2f1", &[FixtureObject::opaque(4, 28, body)]);
            let table = AssetTable::parse("CAB-editor", bytes, None).unwrap();
            let materialized = materialize_table(&table, 0, MaterializePolicy::Abort).unwrap();
            let record = materialized.records[0].as_texture().unwrap();
            assert_eq!(record.name, "tex_editor", "format {format}");
            assert_eq!((record.width, record.height), (2, 1));
        }

        // the same bytes read as a player build misparse the name
        let mut body = fixtures::editor_prefix(17);
        body.extend_from_slice(&texture);
        let bytes = fixtures::serialized_file("5.6.2f1", &[FixtureObject::opaque(4, 28, body)]);
        let table = AssetTable::parse("CAB-player", bytes, None).unwrap();
        let mut reader = table.object_reader(&table.objects[0]).unwrap();
        assert_ne!(read_object_name(&mut reader, &table).unwrap(), "tex_editor");
    }

    #[test]
    fn test_class_ids() {
        assert_eq!(ClassId::from_raw(28), ClassId::Texture2D);
        assert_eq!(ClassId::from_raw(142), ClassId::AssetBundle);
        assert_eq!(ClassId::from_raw(43).raw(), 43);
    }
}
