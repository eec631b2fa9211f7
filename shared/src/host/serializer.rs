use log::trace;

use replica_serde::{BitWriter, Serde};

use crate::{
    changelist::{ChangelistCursor, HandleIterator},
    host::{
        error::SendError,
        shared_serialization::{SharedPropertyKey, SharedSerialization},
    },
    layout::{write_handle, Layout, Value},
    types::ReferenceResolver,
};

struct SendContext<'a> {
    shared: Option<&'a SharedSerialization>,
    overrides: &'a [(usize, Value)],
    resolver: &'a dyn ReferenceResolver,
}

/// Writes the properties named by `changed` as `handle, value` records with
/// a closing `0` handle. Arrays write their handle, a 16-bit count, their
/// element records and a `0`.
///
/// `overrides` replaces the live value of the given command indices. Returns
/// whether anything was written; on error nothing is left in `writer`.
pub fn send_properties(
    layout: &Layout,
    data: &[Value],
    changed: &[u16],
    writer: &mut BitWriter,
    shared: Option<&SharedSerialization>,
    overrides: &[(usize, Value)],
    resolver: &dyn ReferenceResolver,
) -> Result<bool, SendError> {
    let mark = writer.mark();
    let context = SendContext {
        shared: shared.filter(|shared| shared.is_valid()),
        overrides,
        resolver,
    };

    let mut cursor = ChangelistCursor::new(changed);
    let mut iterator = HandleIterator::top_level(layout);
    let mut element_path = Vec::new();
    if let Err(err) = send_r(
        &context,
        &mut iterator,
        &mut cursor,
        &[data],
        0,
        &mut element_path,
        writer,
    ) {
        writer.rollback(mark);
        return Err(err);
    }

    if writer.bits_written() == mark.bits() {
        return Ok(false);
    }
    write_handle(writer, 0);
    trace!(
        "Sent `{}` properties in {} bits",
        layout.name(),
        writer.bits_written() - mark.bits()
    );
    Ok(true)
}

fn send_r<E: AsRef<[Value]>>(
    context: &SendContext,
    iterator: &mut HandleIterator,
    cursor: &mut ChangelistCursor,
    elements: &[E],
    array_depth: usize,
    element_path: &mut Vec<usize>,
    writer: &mut BitWriter,
) -> Result<(), SendError> {
    let cmds = iterator.cmds;
    while iterator.next_handle(cursor) {
        let cmd_index = iterator.cmd_index;
        let cmd = &cmds[cmd_index];
        let slots = elements
            .get(iterator.array_index)
            .map_or(&[][..], |element| element.as_ref());

        if cmd.is_array() {
            let array = slots.get(cmd.slot).map_or(&[][..], Value::array_elements);
            let count = u16::try_from(array.len()).map_err(|_| SendError::ArrayTooLong {
                name: cmd.name.clone(),
                len: array.len(),
            })?;

            write_handle(writer, iterator.handle);
            count.ser(writer);

            let mark = cursor.enter_array();
            let mut array_iterator = iterator.for_array(cmd_index, array.len());
            element_path.push(iterator.array_index);
            let result = send_r(
                context,
                &mut array_iterator,
                cursor,
                array,
                array_depth + 1,
                element_path,
                writer,
            );
            element_path.pop();
            result?;
            cursor.leave_array(mark);

            write_handle(writer, 0);
            continue;
        }

        let Some(kind) = &cmd.kind else {
            continue;
        };

        let overridden = context
            .overrides
            .iter()
            .find(|(index, _)| *index == cmd_index)
            .map(|(_, value)| value);

        if overridden.is_none() && cmd.shared_serialization {
            if let Some(shared) = context.shared {
                let key = SharedPropertyKey {
                    cmd_index,
                    array_index: iterator.array_index,
                    array_depth,
                    element_path: element_path.clone(),
                };
                if let Some(info) = shared.get(&key) {
                    shared.write_cached(info, writer);
                    continue;
                }
            }
        }

        let value = match overridden.or_else(|| slots.get(cmd.slot)) {
            Some(value) => value,
            None => {
                return Err(SendError::ValueMismatch {
                    expected: kind.type_name().to_string(),
                    found: "nothing",
                })
            }
        };

        write_handle(writer, iterator.handle);
        kind.write(value, writer, context.resolver)?;
    }
    Ok(())
}
