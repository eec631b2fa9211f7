use std::collections::HashMap;

use log::{trace, warn};

use replica_serde::BitWriter;

use crate::{
    changelist::{ChangelistCursor, HandleIterator},
    layout::{write_handle, Layout, Value},
    types::IdentityResolver,
};

/// Locates one property value inside an object's data: the command, the
/// element index within the innermost array, the array depth and the
/// element indices of every enclosing array.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SharedPropertyKey {
    pub cmd_index: usize,
    pub array_index: usize,
    pub array_depth: usize,
    pub element_path: Vec<usize>,
}

/// A bit range, handle included, inside the shared buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SharedPropertyInfo {
    pub bit_offset: u32,
    pub bit_length: u32,
}

/// Encodings of connection-independent properties, written once per change
/// and copied into every connection's packet.
#[derive(Debug, Default)]
pub struct SharedSerialization {
    writer: BitWriter,
    properties: HashMap<SharedPropertyKey, SharedPropertyInfo>,
    valid: bool,
}

impl SharedSerialization {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn reset(&mut self) {
        self.writer.reset();
        self.properties.clear();
        self.valid = false;
    }

    pub fn get(&self, key: &SharedPropertyKey) -> Option<SharedPropertyInfo> {
        self.properties.get(key).copied()
    }

    /// Appends a cached encoding to `writer`.
    pub fn write_cached(&self, info: SharedPropertyInfo, writer: &mut BitWriter) {
        writer.write_bits_from(self.writer.bytes(), info.bit_offset, info.bit_length);
    }

    /// Encodes every shareable property named by `changed`.
    pub fn build(&mut self, layout: &Layout, data: &[Value], changed: &[u16]) {
        self.reset();
        let mut cursor = ChangelistCursor::new(changed);
        let mut iterator = HandleIterator::top_level(layout);
        let mut element_path = Vec::new();
        self.build_r(&mut iterator, &mut cursor, &[data], 0, &mut element_path);
        self.valid = true;
        trace!(
            "Shared serialization for `{}`: {} properties in {} bits",
            layout.name(),
            self.properties.len(),
            self.writer.bits_written()
        );
    }

    fn build_r<E: AsRef<[Value]>>(
        &mut self,
        iterator: &mut HandleIterator,
        cursor: &mut ChangelistCursor,
        elements: &[E],
        array_depth: usize,
        element_path: &mut Vec<usize>,
    ) {
        let cmds = iterator.cmds;
        while iterator.next_handle(cursor) {
            let cmd_index = iterator.cmd_index;
            let cmd = &cmds[cmd_index];
            let slots = elements
                .get(iterator.array_index)
                .map_or(&[][..], |element| element.as_ref());

            if cmd.is_array() {
                let array = slots.get(cmd.slot).map_or(&[][..], Value::array_elements);
                let mark = cursor.enter_array();
                let mut array_iterator = iterator.for_array(cmd_index, array.len());
                element_path.push(iterator.array_index);
                self.build_r(&mut array_iterator, cursor, array, array_depth + 1, element_path);
                element_path.pop();
                cursor.leave_array(mark);
                continue;
            }

            if !cmd.shared_serialization {
                continue;
            }
            let (Some(kind), Some(value)) = (&cmd.kind, slots.get(cmd.slot)) else {
                continue;
            };

            let mark = self.writer.mark();
            write_handle(&mut self.writer, iterator.handle);
            if let Err(err) = kind.write(value, &mut self.writer, &IdentityResolver) {
                warn!("Not sharing `{}`: {}", cmd.name, err);
                self.writer.rollback(mark);
                continue;
            }

            self.properties.insert(
                SharedPropertyKey {
                    cmd_index,
                    array_index: iterator.array_index,
                    array_depth,
                    element_path: element_path.clone(),
                },
                SharedPropertyInfo {
                    bit_offset: mark.bits(),
                    bit_length: self.writer.bits_written() - mark.bits(),
                },
            );
        }
    }
}
