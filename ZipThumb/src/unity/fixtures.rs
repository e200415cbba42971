//! Synthetic Unity containers for tests

use super::compression;
use super::version::UnityVersion;

/// Growable byte buffer with Unity's primitive writers.
pub(crate) struct Writer {
    pub buf: Vec<u8>,
    big: bool,
}

macro_rules! write_num {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) -> &mut Self {
            if self.big {
                self.buf.extend_from_slice(&value.to_be_bytes());
            } else {
                self.buf.extend_from_slice(&value.to_le_bytes());
            }
            self
        }
    };
}

impl Writer {
    pub fn big() -> Self {
        Self { buf: Vec::new(), big: true }
    }

    pub fn little() -> Self {
        Self { buf: Vec::new(), big: false }
    }

    write_num!(u16, u16);
    write_num!(i16, i16);
    write_num!(u32, u32);
    write_num!(i32, i32);
    write_num!(u64, u64);
    write_num!(i64, i64);
    write_num!(f32, f32);

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn cstr(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    pub fn align(&mut self, alignment: usize) -> &mut Self {
        while self.buf.len() % alignment != 0 {
            self.buf.push(0);
        }
        self
    }

    pub fn aligned_string(&mut self, value: &str) -> &mut Self {
        self.i32(value.len() as i32).bytes(value.as_bytes()).align(4)
    }
}

fn compress(kind: u32, data: &[u8]) -> Vec<u8> {
    match kind & 0x3F {
        0 => data.to_vec(),
        1 => compression::compress_lzma(data),
        _ => lz4_flex::block::compress(data),
    }
}

/// A version 7 `UnityFS` bundle with one storage block.
///
/// The low bits of `flags` pick the compression of both the blocks info and
/// the data block; `0x80` moves the blocks info to the end of the file.
pub(crate) fn unity_fs(nodes: &[(&str, &[u8])], flags: u32) -> Vec<u8> {
    let mut data = Vec::new();
    let mut table = Vec::with_capacity(nodes.len());
    for (name, bytes) in nodes {
        table.push((*name, data.len() as u64, bytes.len() as u64));
        data.extend_from_slice(bytes);
    }
    unity_fs_nodes(&table, &data, flags)
}

/// Like [`unity_fs`], with nodes given as `(name, offset, size)` into `data`
/// so that they may overlap.
pub(crate) fn unity_fs_nodes(nodes: &[(&str, u64, u64)], data: &[u8], flags: u32) -> Vec<u8> {
    let mut info = Writer::big();
    info.bytes(&[0u8; 16]);

    let mut node_table = Writer::big();
    node_table.i32(nodes.len() as i32);
    for (name, offset, size) in nodes {
        node_table.i64(*offset as i64).i64(*size as i64).u32(4).cstr(name);
    }

    let block = compress(flags, data);
    info.i32(1)
        .u32(data.len() as u32)
        .u32(block.len() as u32)
        .u16((flags & 0x3F) as u16)
        .bytes(&node_table.buf);
    let packed_info = compress(flags, &info.buf);

    let mut out = Writer::big();
    out.cstr("UnityFS")
        .u32(7)
        .cstr("5.x.x")
        .cstr("5.6.2f1")
        .i64(0)
        .u32(packed_info.len() as u32)
        .u32(info.buf.len() as u32)
        .u32(flags)
        .align(16);
    if flags & 0x80 != 0 {
        out.bytes(&block).bytes(&packed_info);
    } else {
        out.bytes(&packed_info).bytes(&block);
    }
    out.buf
}

/// A version 3 `UnityRaw` bundle (stored, single level).
pub(crate) fn unity_raw(nodes: &[(&str, &[u8])]) -> Vec<u8> {
    legacy_bundle("UnityRaw", nodes)
}

/// A version 3 `UnityWeb` bundle: one level packed as a complete `.lzma` stream.
pub(crate) fn unity_web(nodes: &[(&str, &[u8])]) -> Vec<u8> {
    legacy_bundle("UnityWeb", nodes)
}

fn legacy_bundle(signature: &str, nodes: &[(&str, &[u8])]) -> Vec<u8> {
    let directory_len: usize = 4 + nodes.iter().map(|(name, _)| name.len() + 1 + 8).sum::<usize>();
    let mut block = Writer::big();
    block.i32(nodes.len() as i32);
    let mut offset = directory_len;
    for (name, bytes) in nodes {
        block.cstr(name).u32(offset as u32).u32(bytes.len() as u32);
        offset += bytes.len();
    }
    for (_, bytes) in nodes {
        block.bytes(bytes);
    }
    let packed = if signature == "UnityWeb" {
        compression::compress_lzma_alone(&block.buf)
    } else {
        block.buf.clone()
    };

    let mut header = Writer::big();
    header.cstr(signature).u32(3).cstr("3.x.x").cstr("3.5.7f6");
    let header_size = header.buf.len() + 7 * 4;
    header
        .u32(0)
        .u32(header_size as u32)
        .u32(1)
        .i32(1)
        .u32(packed.len() as u32)
        .u32(block.buf.len() as u32)
        .u32((header_size + packed.len()) as u32)
        .u32(directory_len as u32);
    assert_eq!(header.buf.len(), header_size);
    header.bytes(&packed);
    header.buf
}

/// A plain `UnityWebData1.0` file.
pub(crate) fn web_data(nodes: &[(&str, &[u8])]) -> Vec<u8> {
    let head_length = 16 + 4 + nodes.iter().map(|(name, _)| 12 + name.len()).sum::<usize>();
    let mut out = Writer::little();
    out.cstr("UnityWebData1.0").i32(head_length as i32);
    let mut offset = head_length;
    for (name, bytes) in nodes {
        out.i32(offset as i32)
            .i32(bytes.len() as i32)
            .i32(name.len() as i32)
            .bytes(name.as_bytes());
        offset += bytes.len();
    }
    for (_, bytes) in nodes {
        out.bytes(bytes);
    }
    out.buf
}

/// One object to place in a fixture serialized file.
pub(crate) struct FixtureObject {
    pub path_id: i64,
    pub class_id: i32,
    pub data: Vec<u8>,
}

impl FixtureObject {
    pub fn opaque(path_id: i64, class_id: i32, data: Vec<u8>) -> Self {
        Self { path_id, class_id, data }
    }
}

/// Shape of a fixture serialized file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SerializedLayout {
    pub format: u32,
    pub big_endian: bool,
    pub platform: i32,
    /// Type trees in the type list (always present before format 13).
    pub type_tree: bool,
    /// Eight-byte path ids for formats 7 to 13.
    pub big_id: bool,
}

impl Default for SerializedLayout {
    /// Little-endian format 17 without type trees, as Unity 5.5 - 2018 builds write.
    fn default() -> Self {
        Self {
            format: 17,
            big_endian: false,
            platform: 5,
            type_tree: false,
            big_id: false,
        }
    }
}

impl SerializedLayout {
    pub fn format(format: u32) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }
}

/// A serialized file in the default layout.
pub(crate) fn serialized_file(unity_version: &str, objects: &[FixtureObject]) -> Vec<u8> {
    serialized_file_with(SerializedLayout::default(), unity_version, objects)
}

/// A serialized file in `layout`. Object bytes are written as given.
pub(crate) fn serialized_file_with(layout: SerializedLayout, unity_version: &str, objects: &[FixtureObject]) -> Vec<u8> {
    let format = layout.format;
    let mut class_ids: Vec<i32> = Vec::new();
    for object in objects {
        if !class_ids.contains(&object.class_id) {
            class_ids.push(object.class_id);
        }
    }

    let mut relative = Vec::with_capacity(objects.len());
    let mut cursor = 0usize;
    for object in objects {
        relative.push(cursor);
        cursor += object.data.len();
        cursor = cursor.next_multiple_of(8);
    }

    let header_len = if format >= 22 {
        48
    } else if format >= 9 {
        20
    } else {
        16
    };
    // header placeholder, patched below
    let mut out = Writer {
        buf: vec![0u8; header_len],
        big: layout.big_endian,
    };
    let (metadata_size, data_offset) = if format >= 9 {
        write_metadata(&mut out, layout, unity_version, &class_ids, objects, &relative);
        let metadata_size = out.buf.len() - header_len;
        out.align(16);
        let data_offset = out.buf.len();
        write_object_data(&mut out, objects, &relative);
        (metadata_size, data_offset)
    } else {
        // old files keep the endianness byte and metadata after the data
        write_object_data(&mut out, objects, &relative);
        let metadata_start = out.buf.len();
        out.u8(u8::from(layout.big_endian));
        write_metadata(&mut out, layout, unity_version, &class_ids, objects, &relative);
        (out.buf.len() - metadata_start, header_len)
    };
    let file_size = out.buf.len();

    let mut header = Writer::big();
    if format >= 22 {
        header
            .u32(0)
            .u32(0)
            .u32(format)
            .u32(0)
            .u8(u8::from(layout.big_endian))
            .bytes(&[0, 0, 0])
            .u32(metadata_size as u32)
            .i64(file_size as i64)
            .i64(data_offset as i64)
            .i64(0);
    } else {
        header
            .u32(metadata_size as u32)
            .u32(file_size as u32)
            .u32(format)
            .u32(data_offset as u32);
        if format >= 9 {
            header.u8(u8::from(layout.big_endian)).bytes(&[0, 0, 0]);
        }
    }
    out.buf[..header_len].copy_from_slice(&header.buf);
    out.buf
}

fn write_object_data(out: &mut Writer, objects: &[FixtureObject], relative: &[usize]) {
    let data_offset = out.buf.len();
    for (object, start) in objects.iter().zip(relative) {
        out.buf.resize(data_offset + start, 0);
        out.bytes(&object.data);
    }
}

fn write_metadata(
    out: &mut Writer,
    layout: SerializedLayout,
    unity_version: &str,
    class_ids: &[i32],
    objects: &[FixtureObject],
    relative: &[usize],
) {
    let format = layout.format;
    if format >= 7 {
        out.cstr(unity_version);
    }
    if format >= 8 {
        out.i32(layout.platform);
    }
    if format >= 13 {
        out.u8(u8::from(layout.type_tree));
    }
    let type_tree = layout.type_tree || format < 13;

    out.i32(class_ids.len() as i32);
    for class_id in class_ids {
        out.i32(*class_id);
        if format >= 16 {
            out.u8(0);
        }
        if format >= 17 {
            out.i16(-1);
        }
        if format >= 13 {
            if (format < 16 && *class_id < 0) || (format >= 16 && *class_id == 114) {
                out.bytes(&[0u8; 16]);
            }
            out.bytes(&[0u8; 16]);
        }
        if type_tree {
            if format >= 12 || format == 10 {
                type_tree_blob(out, format);
            } else {
                legacy_type_node(out, format, 0);
            }
            if format >= 21 {
                out.i32(0);
            }
        }
    }

    let big_id = layout.big_id && (7..14).contains(&format);
    if (7..14).contains(&format) {
        out.i32(i32::from(big_id));
    }

    out.i32(objects.len() as i32);
    for (object, start) in objects.iter().zip(relative) {
        if big_id {
            out.i64(object.path_id);
        } else if format < 14 {
            out.i32(object.path_id as i32);
        } else {
            out.align(4).i64(object.path_id);
        }
        if format >= 22 {
            out.i64(*start as i64);
        } else {
            out.u32(*start as u32);
        }
        out.u32(object.data.len() as u32);
        if format < 16 {
            out.i32(object.class_id).u16(object.class_id as u16);
        } else {
            let type_index = class_ids.iter().position(|c| *c == object.class_id).unwrap_or(0);
            out.i32(type_index as i32);
        }
        if format < 11 {
            out.u16(0);
        }
        if (11..17).contains(&format) {
            out.i16(-1);
        }
        if format == 15 || format == 16 {
            out.u8(0);
        }
    }

    if format >= 11 {
        out.i32(0); // script types
    }
    out.i32(0); // externals
    if format >= 20 {
        out.i32(0); // ref types
    }
    if format >= 5 {
        out.cstr("");
    }
}

/// Two nodes and their string buffer; node contents are never read.
fn type_tree_blob(out: &mut Writer, format: u32) {
    let strings = b"Texture2D\0Base\0m_Name\0";
    let node_size = if format >= 19 { 32 } else { 24 };
    out.i32(2)
        .i32(strings.len() as i32)
        .bytes(&vec![0xAB; 2 * node_size])
        .bytes(strings);
}

/// A root with two children, each with two children of their own.
fn legacy_type_node(out: &mut Writer, format: u32, depth: i32) {
    let (type_name, name) = if depth == 0 { ("Texture2D", "Base") } else { ("int", "m_Field") };
    out.cstr(type_name).cstr(name).i32(4);
    if format == 2 {
        out.i32(1);
    }
    if format != 3 {
        out.i32(depth);
    }
    out.i32(0).i32(1);
    if format != 3 {
        out.i32(0);
    }
    let children = if depth < 2 { 2 } else { 0 };
    out.i32(children);
    for _ in 0..children {
        legacy_type_node(out, format, depth + 1);
    }
}

/// `Object` prefix of editor (`NoTarget`) builds: hide flags and two null prefab references.
pub(crate) fn editor_prefix(format: u32) -> Vec<u8> {
    let mut out = Writer::little();
    out.u32(0);
    for _ in 0..2 {
        out.i32(0);
        if format < 14 {
            out.i32(0);
        } else {
            out.i64(0);
        }
    }
    out.buf
}

/// Texture2D object bytes as written by `version`.
pub(crate) struct TextureFixture<'a> {
    pub name: &'a str,
    pub width: i32,
    pub height: i32,
    pub format: i32,
    pub image: &'a [u8],
    /// `(offset, size, path)` of streamed pixel data; `image` must be empty.
    pub stream: Option<(u64, u32, &'a str)>,
}

impl TextureFixture<'_> {
    pub fn encode(&self, version: UnityVersion) -> Vec<u8> {
        let mut out = Writer::little();
        out.aligned_string(self.name);
        if version.at_least(2017, 3) {
            out.i32(0).u8(1);
            if version.at_least(2020, 2) {
                out.u8(0);
            }
            out.align(4);
        }
        out.i32(self.width).i32(self.height).i32(self.image.len() as i32);
        if version.at_least(2020, 1) {
            out.i32(0);
        }
        out.i32(self.format).i32(1).u8(0);
        if version.at_least(2020, 1) {
            out.u8(0);
        }
        if version.at_least(2019, 3) {
            out.u8(0);
        }
        if !version.at_least(5, 5) {
            out.u8(0);
        }
        if version.at_least(2018, 2) {
            out.u8(0);
        }
        out.align(4);
        if version.at_least(2018, 2) {
            out.i32(0);
        }
        out.i32(1).i32(2);
        out.i32(1).i32(1).f32(0.0).i32(0);
        if version.at_least(2017, 1) {
            out.i32(0).i32(0);
        }
        out.i32(0).i32(1);
        if version.at_least(2020, 2) {
            out.i32(0).align(4);
        }
        out.i32(self.image.len() as i32).bytes(self.image).align(4);
        if let Some((offset, size, path)) = self.stream {
            if version.at_least(2020, 1) {
                out.u64(offset);
            } else {
                out.u32(offset as u32);
            }
            out.u32(size).aligned_string(path);
        }
        out.buf
    }
}

/// AssetBundle object bytes for format 17: name, empty preload table, container keys.
pub(crate) fn asset_bundle(name: &str, container: &[&str]) -> Vec<u8> {
    let mut out = Writer::little();
    out.aligned_string(name).i32(0).i32(container.len() as i32);
    for (index, key) in container.iter().enumerate() {
        out.aligned_string(key).i32(0).i32(0).i32(0).i64(index as i64 + 2);
    }
    out.buf
}

/// RGBA32 pixel bytes for a solid color.
pub(crate) fn solid_rgba(width: usize, height: usize, rgba: [u8; 4]) -> Vec<u8> {
    rgba.repeat(width * height)
}
