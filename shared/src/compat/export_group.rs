use std::collections::{BTreeMap, BTreeSet};

use log::{trace, warn};

use replica_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::layout::{read_varint, write_varint, CmdType, Layout};

/// A property as announced to a backward-compatible peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetFieldExport {
    pub handle: u32,
    pub compatible_checksum: u32,
    pub name: String,
    /// The receiver found no local property with this checksum
    pub incompatible: bool,
}

/// Exports of one layout, keyed by handle. The sending side tracks which
/// exports the peer has already seen so each is announced once.
#[derive(Clone, Debug, Default)]
pub struct NetFieldExportGroup {
    path_name: String,
    exports: BTreeMap<u32, NetFieldExport>,
    exported: BTreeSet<u32>,
}

impl NetFieldExportGroup {
    pub fn new(path_name: &str) -> Self {
        Self {
            path_name: path_name.to_string(),
            ..Self::default()
        }
    }

    /// One export per command of `layout`, the handle being the command
    /// index.
    pub fn for_layout(layout: &Layout) -> Self {
        let mut group = Self::new(layout.name());
        for (cmd_index, cmd) in layout.cmds().iter().enumerate() {
            if cmd.cmd_type == CmdType::Return {
                continue;
            }
            let handle = cmd_index as u32;
            group.exports.insert(
                handle,
                NetFieldExport {
                    handle,
                    compatible_checksum: cmd.compatible_checksum,
                    name: cmd.name.clone(),
                    incompatible: false,
                },
            );
        }
        group
    }

    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    pub fn get(&self, handle: u32) -> Option<&NetFieldExport> {
        self.exports.get(&handle)
    }

    pub fn is_exported(&self, handle: u32) -> bool {
        self.exported.contains(&handle)
    }

    pub fn mark_incompatible(&mut self, handle: u32) {
        if let Some(export) = self.exports.get_mut(&handle) {
            if !export.incompatible {
                warn!(
                    "`{}`: property `{}` ({:#010x}) is incompatible, its records will be skipped",
                    self.path_name, export.name, export.compatible_checksum
                );
            }
            export.incompatible = true;
        }
    }

    /// Forgets which exports the peer has seen, so the next write announces
    /// them again.
    pub fn reset_exported(&mut self) {
        self.exported.clear();
    }

    /// Writes `count` followed by every export in `handles` the peer has not
    /// seen yet.
    pub fn write_exports(&mut self, writer: &mut dyn BitWrite, handles: &BTreeSet<u32>) {
        let pending: Vec<&NetFieldExport> = handles
            .iter()
            .filter(|handle| !self.exported.contains(handle))
            .filter_map(|handle| self.exports.get(handle))
            .collect();

        write_varint(writer, pending.len() as u32);
        for export in &pending {
            write_varint(writer, export.handle);
            export.compatible_checksum.ser(writer);
            export.name.ser(writer);
        }

        if !writer.is_counter() {
            for handle in handles {
                if self.exports.contains_key(handle) {
                    self.exported.insert(*handle);
                }
            }
        }
    }

    /// Reads an export announcement. Returns how many exports it carried.
    pub fn read_exports(&mut self, reader: &mut BitReader) -> Result<u32, SerdeErr> {
        let count = read_varint(reader)?;
        for _ in 0..count {
            let handle = read_varint(reader)?;
            let compatible_checksum = u32::de(reader)?;
            let name = String::de(reader)?;
            trace!(
                "`{}`: export {} is `{}` ({:#010x})",
                self.path_name,
                handle,
                name,
                compatible_checksum
            );
            self.exports.insert(
                handle,
                NetFieldExport {
                    handle,
                    compatible_checksum,
                    name,
                    incompatible: false,
                },
            );
        }
        Ok(count)
    }
}
