//! Container traversal
//!
//! Unpacks a stream and every bundle or web data file nested in it using an
//! explicit stack, so nesting depth and total node count are both bounded.
//! Children are visited depth-first in directory order.
//!
//! Child frames are views into their container's buffer. Bytes produced by
//! decompression or decoding draw on one budget per top-level stream.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::config::ThumbnailConfig;
use crate::error::{Error, Result};

use super::bundle::BundleFile;
use super::serialized::AssetTable;
use super::{ContainerKind, Directory, SharedBytes, base_name, classify, classify_child, web};

/// Everything unpacked from one top-level stream.
#[derive(Debug, Default)]
pub struct LoadedAssets {
    /// Assets tables in the order they were first seen.
    pub tables: Vec<AssetTable>,
    /// Opaque blobs by file name; the first blob with a name wins.
    resources: IndexMap<String, SharedBytes>,
    /// Lowercased names of tables already accepted.
    seen_tables: HashSet<String>,
}

impl LoadedAssets {
    /// Look up a resource blob by path or file name (`archive:/CAB-x/CAB-x.resS`).
    pub fn resource(&self, path: &str) -> Option<&[u8]> {
        self.resources.get(base_name(path)).map(SharedBytes::as_slice)
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.resources.is_empty()
    }

    fn accept_table(&mut self, name: &str) -> bool {
        self.seen_tables.insert(name.to_lowercase())
    }

    fn add_resource(&mut self, name: &str, data: SharedBytes) {
        let key = base_name(name);
        if self.resources.contains_key(key) {
            tracing::debug!("Keeping first resource named {key}");
            return;
        }
        self.resources.insert(key.to_string(), data);
    }
}

/// A stream waiting to be classified.
struct Frame {
    name: String,
    parent: String,
    /// `parent/child/...` chain for diagnostics.
    trail: String,
    depth: usize,
    data: SharedBytes,
}

/// Bounded container unpacker.
#[derive(Debug, Clone)]
pub struct ContainerDispatcher {
    max_depth: usize,
    max_nodes: usize,
    max_bytes: u64,
    fallback_version: Option<String>,
}

impl ContainerDispatcher {
    pub fn new(config: &ThumbnailConfig) -> Self {
        Self {
            max_depth: config.max_container_depth,
            max_nodes: config.max_container_nodes,
            max_bytes: config.max_entry_bytes,
            fallback_version: config.fallback_unity_version.clone(),
        }
    }

    /// Unpack `data` (named `name`, found in `parent`) and everything nested in it.
    ///
    /// Failures inside a node are wrapped with the node's parent and name;
    /// exceeding the depth or node budget fails with [`Error::ContainerTooDeep`].
    /// A top-level stream that only looks gzip or brotli encoded is kept as a
    /// resource when it does not decode to web data.
    pub fn load(&self, parent: &str, name: &str, data: impl Into<SharedBytes>) -> Result<LoadedAssets> {
        let mut loaded = LoadedAssets::default();
        let mut stack = vec![Frame {
            name: name.to_string(),
            parent: parent.to_string(),
            trail: name.to_string(),
            depth: 0,
            data: data.into(),
        }];
        let mut visited = 0usize;
        let mut budget = self.max_bytes;

        while let Some(frame) = stack.pop() {
            visited += 1;
            if frame.depth > self.max_depth || visited > self.max_nodes {
                return Err(Error::ContainerTooDeep {
                    path: frame.trail,
                    depth: frame.depth,
                    visited,
                });
            }

            let kind = if frame.depth == 0 {
                classify(&frame.data)
            } else {
                classify_child(&frame.data)
            };
            match kind {
                ContainerKind::Bundle | ContainerKind::Web { .. } => {
                    let directory = match self.unpack(kind, &frame.data, budget) {
                        Ok(directory) => directory,
                        Err(e) if kind.is_encoded() => {
                            tracing::info!("{} does not decode as web data ({e}), keeping it as a resource", frame.trail);
                            loaded.add_resource(&frame.name, frame.data);
                            continue;
                        }
                        Err(e) => return Err(e.in_container(&frame.parent, &frame.name)),
                    };
                    if !directory.data().shares_buffer(&frame.data) {
                        budget = budget.saturating_sub(directory.data().len() as u64);
                    }

                    let pending = visited + stack.len() + directory.len();
                    if pending > self.max_nodes {
                        return Err(Error::ContainerTooDeep {
                            path: frame.trail,
                            depth: frame.depth + 1,
                            visited: pending,
                        });
                    }

                    let children = self
                        .child_frames(&directory, &frame)
                        .map_err(|e| e.in_container(&frame.parent, &frame.name))?;
                    tracing::debug!("Unpacked {} {}: {} children", kind.label(), frame.trail, children.len());
                    stack.extend(children.into_iter().rev());
                }
                ContainerKind::Assets => {
                    if !loaded.accept_table(&frame.name) {
                        tracing::debug!("Dropping duplicate assets file {}", frame.trail);
                        continue;
                    }
                    let table = AssetTable::parse(frame.name.clone(), frame.data, self.fallback_version.as_deref())
                        .map_err(|e| e.in_container(&frame.parent, &frame.name))?;
                    loaded.tables.push(table);
                }
                ContainerKind::Resource | ContainerKind::Unknown => {
                    if frame.depth == 0 {
                        let unrecognized = Error::UnrecognizedContainer {
                            name: frame.name.clone(),
                        };
                        tracing::info!("{unrecognized}, keeping it as a resource");
                    }
                    loaded.add_resource(&frame.name, frame.data);
                }
            }
        }

        Ok(loaded)
    }

    fn child_frames(&self, directory: &Directory, frame: &Frame) -> Result<Vec<Frame>> {
        directory
            .entries
            .iter()
            .map(|entry| {
                let data = directory
                    .share(entry)
                    .map_err(|e| e.in_container(&frame.name, &entry.name))?;
                Ok(Frame {
                    name: entry.name.clone(),
                    parent: frame.name.clone(),
                    trail: format!("{}/{}", frame.trail, entry.name),
                    depth: frame.depth + 1,
                    data,
                })
            })
            .collect()
    }

    fn unpack(&self, kind: ContainerKind, data: &SharedBytes, limit: u64) -> Result<Directory> {
        match kind {
            ContainerKind::Bundle => Ok(BundleFile::parse(data, limit)?.directory),
            ContainerKind::Web { encoding } => web::parse(data, encoding, limit),
            other => Err(Error::UnrecognizedContainer {
                name: other.label().to_string(),
            }),
        }
    }
}
