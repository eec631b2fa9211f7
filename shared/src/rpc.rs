//! Function parameter blocks. Every parameter is a parent of the layout;
//! each is prefixed by a bit saying whether it differs from its default,
//! except bools, which are sent as that bit.

use log::debug;

use replica_serde::{BitReader, BitWrite, Serde};

use crate::{
    config::ReplicationConfig,
    host::SendError,
    layout::{Layout, ObjectData, PropertyKind, ReadContext, Value},
    remote::{missing_slot, ReceiveError},
    types::ReferenceResolver,
};

pub fn send_properties_for_rpc(
    layout: &Layout,
    data: &[Value],
    writer: &mut dyn BitWrite,
    resolver: &dyn ReferenceResolver,
) -> Result<(), SendError> {
    let defaults = layout.default_data();
    for (parent_index, parent) in layout.parents().iter().enumerate() {
        if parent.flags.custom_delta {
            continue;
        }
        let slots = parent_slots(layout, parent_index);

        if let Some(value) = single_bool(layout, parent_index, data) {
            writer.write_bit(value);
            continue;
        }

        let differs = data.get(slots.clone()) != defaults.get(slots);
        writer.write_bit(differs);
        if differs {
            write_level(layout, parent.cmd_start, parent.cmd_end, data, writer, resolver)?;
        }
    }
    Ok(())
}

/// Reads a block written by [`send_properties_for_rpc`]. Parameters that
/// were not sent are reset to their defaults.
pub fn receive_properties_for_rpc(
    layout: &Layout,
    data: &mut ObjectData,
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
) -> Result<(), ReceiveError> {
    let defaults = layout.default_data();
    if data.len() < defaults.len() {
        data.resize_with(defaults.len(), || Value::Bool(false));
    }

    for (parent_index, parent) in layout.parents().iter().enumerate() {
        if parent.flags.custom_delta {
            continue;
        }
        let slots = parent_slots(layout, parent_index);

        if single_bool(layout, parent_index, data).is_some() {
            data[parent.slot] = Value::Bool(reader.read_bit()?);
            continue;
        }

        if reader.read_bit()? {
            read_level(layout, parent.cmd_start, parent.cmd_end, data, reader, resolver, config)?;
        } else {
            data[slots.clone()].clone_from_slice(&defaults[slots]);
        }
    }
    Ok(())
}

fn parent_slots(layout: &Layout, parent_index: usize) -> std::ops::Range<usize> {
    let parents = layout.parents();
    let start = parents[parent_index].slot;
    let end = parents
        .get(parent_index + 1)
        .map_or(layout.num_slots(), |next| next.slot);
    start..end
}

fn single_bool(layout: &Layout, parent_index: usize, data: &[Value]) -> Option<bool> {
    let parent = &layout.parents()[parent_index];
    if parent.cmd_end != parent.cmd_start + 1 {
        return None;
    }
    let cmd = &layout.cmds()[parent.cmd_start];
    if !matches!(cmd.kind, Some(PropertyKind::Bool)) {
        return None;
    }
    match data.get(cmd.slot) {
        Some(Value::Bool(value)) => Some(*value),
        _ => Some(false),
    }
}

fn write_level(
    layout: &Layout,
    cmd_start: usize,
    cmd_end: usize,
    slots: &[Value],
    writer: &mut dyn BitWrite,
    resolver: &dyn ReferenceResolver,
) -> Result<(), SendError> {
    let cmds = layout.cmds();
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if cmd.is_array() {
            let elements = slots.get(cmd.slot).map_or(&[][..], Value::array_elements);
            let count = u16::try_from(elements.len()).map_err(|_| SendError::ArrayTooLong {
                name: cmd.name.clone(),
                len: elements.len(),
            })?;
            count.ser(writer);
            for element in elements {
                write_level(layout, cmd_index + 1, cmd.end_cmd - 1, element, writer, resolver)?;
            }
            cmd_index = cmd.end_cmd;
            continue;
        }
        if let Some(kind) = &cmd.kind {
            let value = slots.get(cmd.slot).ok_or_else(|| SendError::ValueMismatch {
                expected: kind.type_name().to_string(),
                found: "nothing",
            })?;
            kind.write(value, writer, resolver)?;
        }
        cmd_index += 1;
    }
    Ok(())
}

fn read_level(
    layout: &Layout,
    cmd_start: usize,
    cmd_end: usize,
    slots: &mut [Value],
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
) -> Result<(), ReceiveError> {
    let cmds = layout.cmds();
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if cmd.is_array() {
            let count = u32::from(u16::de(reader)?);
            if count > config.max_rep_array_size {
                return Err(ReceiveError::ArrayTooLarge {
                    name: cmd.name.clone(),
                    count,
                    max: config.max_rep_array_size,
                });
            }
            let bytes = u64::from(count) * u64::from(cmd.element_size);
            if bytes > u64::from(config.max_rep_array_memory) {
                return Err(ReceiveError::ArrayMemoryExceeded {
                    name: cmd.name.clone(),
                    bytes,
                    max: config.max_rep_array_memory,
                });
            }

            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut element = layout.default_element(cmd_index);
                read_level(
                    layout,
                    cmd_index + 1,
                    cmd.end_cmd - 1,
                    &mut element,
                    reader,
                    resolver,
                    config,
                )?;
                elements.push(element);
            }
            *slots
                .get_mut(cmd.slot)
                .ok_or_else(|| missing_slot(&cmd.name))? = Value::Array(elements);
            cmd_index = cmd.end_cmd;
            continue;
        }

        if let Some(kind) = &cmd.kind {
            let mut context = ReadContext::new(resolver);
            let value = kind.read(reader, &mut context)?;
            if !context.unmapped.is_empty() {
                debug!("Parameter `{}` references an object that has not arrived", cmd.name);
            }
            *slots.get_mut(cmd.slot).ok_or_else(|| missing_slot(&cmd.name))? = value;
        }
        cmd_index += 1;
    }
    Ok(())
}
