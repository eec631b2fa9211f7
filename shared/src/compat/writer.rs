use std::collections::BTreeSet;

use log::trace;

use replica_serde::BitWriter;

use crate::{
    changelist::{ChangelistCursor, HandleIterator},
    compat::export_group::NetFieldExportGroup,
    host::SendError,
    layout::{write_varint, Layout, Value},
    types::ReferenceResolver,
};

struct CompatContext<'a> {
    overrides: &'a [(usize, Value)],
    resolver: &'a dyn ReferenceResolver,
}

/// Writes the properties named by `changed` in the self-describing format:
/// an export announcement, then `export + 1, bit count, payload` records
/// closed by `0`.
///
/// Array payloads hold the element count followed by `index + 1` and that
/// element's records for each changed element, and a closing `0`. Returns
/// whether anything was written.
pub fn send_properties_compat(
    layout: &Layout,
    data: &[Value],
    changed: &[u16],
    writer: &mut BitWriter,
    exports: &mut NetFieldExportGroup,
    overrides: &[(usize, Value)],
    resolver: &dyn ReferenceResolver,
) -> Result<bool, SendError> {
    let context = CompatContext { overrides, resolver };
    let mut body = BitWriter::new();
    let mut used = BTreeSet::new();

    let mut cursor = ChangelistCursor::new(changed);
    let mut iterator = HandleIterator::top_level(layout);
    let wrote = send_compat_r(
        &context,
        &mut iterator,
        &mut cursor,
        &[data],
        false,
        &mut body,
        &mut used,
    )?;
    if !wrote {
        return Ok(false);
    }

    exports.write_exports(writer, &used);
    writer.append(&body);
    trace!(
        "Sent `{}` compatible properties: {} export(s) used, {} bits",
        layout.name(),
        used.len(),
        body.bits_written()
    );
    Ok(true)
}

// Writes one level's records and its closing `0`. Returns whether any
// record was written.
fn send_compat_r<E: AsRef<[Value]>>(
    context: &CompatContext,
    iterator: &mut HandleIterator,
    cursor: &mut ChangelistCursor,
    elements: &[E],
    in_array: bool,
    writer: &mut BitWriter,
    used: &mut BTreeSet<u32>,
) -> Result<bool, SendError> {
    let cmds = iterator.cmds;
    let mut open_element: Option<usize> = None;
    let mut wrote = false;

    while iterator.next_handle(cursor) {
        let cmd_index = iterator.cmd_index;
        let cmd = &cmds[cmd_index];
        let slots = elements
            .get(iterator.array_index)
            .map_or(&[][..], |element| element.as_ref());

        if in_array && open_element != Some(iterator.array_index) {
            if open_element.is_some() {
                write_varint(writer, 0);
            }
            write_varint(writer, iterator.array_index as u32 + 1);
            open_element = Some(iterator.array_index);
        }

        let mut payload = BitWriter::new();
        if cmd.is_array() {
            let array = slots.get(cmd.slot).map_or(&[][..], Value::array_elements);
            write_varint(&mut payload, array.len() as u32);

            let mark = cursor.enter_array();
            if !array.is_empty() {
                let mut array_iterator = iterator.for_array(cmd_index, array.len());
                send_compat_r(
                    context,
                    &mut array_iterator,
                    cursor,
                    array,
                    true,
                    &mut payload,
                    used,
                )?;
            }
            cursor.leave_array(mark);
            write_varint(&mut payload, 0);
        } else {
            let Some(kind) = &cmd.kind else {
                continue;
            };
            let value = context
                .overrides
                .iter()
                .find(|(index, _)| *index == cmd_index)
                .map(|(_, value)| value)
                .or_else(|| slots.get(cmd.slot))
                .ok_or_else(|| SendError::ValueMismatch {
                    expected: kind.type_name().to_string(),
                    found: "nothing",
                })?;
            kind.write(value, &mut payload, context.resolver)?;
        }

        let handle = cmd_index as u32;
        used.insert(handle);
        write_varint(writer, handle + 1);
        write_varint(writer, payload.bits_written());
        writer.append(&payload);
        wrote = true;
    }

    write_varint(writer, 0);
    Ok(wrote || in_array)
}
