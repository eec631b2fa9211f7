use log::debug;

use replica_serde::BitReader;

use crate::{
    compat::export_group::NetFieldExportGroup,
    config::ReplicationConfig,
    layout::{find_compatible_property, read_varint, Layout, ObjectData, Value},
    remote::{
        missing_slot, prepare_array, receive_property, ReceiveError, ReceiveOutcome,
        ReceiveParams, ReceivingRepState,
    },
    types::{HostType, ReferenceResolver},
};

/// Applies a stream written by
/// [`send_properties_compat`](crate::compat::send_properties_compat).
///
/// Records are matched to local properties by checksum, so the sender's
/// layout may differ from `layout`. Records with no local match are skipped
/// by an observer; the authority refuses them.
pub fn receive_properties_compat(
    layout: &Layout,
    state: &mut ReceivingRepState,
    data: &mut ObjectData,
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
    host_type: HostType,
) -> Result<ReceiveOutcome, ReceiveError> {
    let swap_roles = !state.skip_role_swap();
    let (shadow, notifies, unmapped, exports) = state.split_mut();
    exports.read_exports(reader)?;

    let mut params = ReceiveParams::new(layout, config, resolver, Some(notifies), Some(unmapped));
    params.swap_roles = swap_roles;
    let mut path = Vec::new();
    receive_compat_r(
        &mut params,
        exports,
        host_type,
        reader,
        0,
        layout.top_level_end(),
        data,
        Some(shadow),
        &mut path,
    )?;

    let mut outcome = params.outcome;
    outcome.has_unmapped = !state.unmapped().is_empty();
    Ok(outcome)
}

#[allow(clippy::too_many_arguments)]
fn receive_compat_r(
    params: &mut ReceiveParams,
    exports: &mut NetFieldExportGroup,
    host_type: HostType,
    reader: &mut BitReader,
    cmd_start: usize,
    cmd_end: usize,
    data: &mut [Value],
    mut shadow: Option<&mut [Value]>,
    path: &mut Vec<usize>,
) -> Result<(), ReceiveError> {
    let layout = params.layout;
    let cmds = layout.cmds();

    loop {
        let handle = read_varint(reader)?;
        if handle == 0 {
            return Ok(());
        }
        let export_handle = handle - 1;
        let num_bits = read_varint(reader)?;

        let export = exports
            .get(export_handle)
            .ok_or(ReceiveError::UnknownExport {
                handle: export_handle,
            })?;
        if export.incompatible {
            reader.skip_bits(num_bits)?;
            continue;
        }

        let mut payload = reader.sub_reader(num_bits)?;
        let Some(cmd_index) =
            find_compatible_property(cmds, cmd_start, cmd_end, export.compatible_checksum)
        else {
            if host_type == HostType::Authority {
                return Err(ReceiveError::IncompatibleProperty {
                    name: export.name.clone(),
                    checksum: export.compatible_checksum,
                });
            }
            exports.mark_incompatible(export_handle);
            continue;
        };
        let cmd = &cmds[cmd_index];

        if cmd.is_array() {
            let count = read_varint(&mut payload)?;
            let old_len = prepare_array(
                params,
                cmd_index,
                count,
                data,
                shadow.as_deref_mut(),
                path,
            )?;

            let array = data
                .get_mut(cmd.slot)
                .ok_or_else(|| missing_slot(&cmd.name))?
                .ensure_array();
            let mut shadow_array = shadow
                .as_deref_mut()
                .and_then(|shadow| shadow.get_mut(cmd.slot))
                .map(Value::ensure_array);

            loop {
                let index = read_varint(&mut payload)?;
                if index == 0 {
                    // a lone trailing terminator marks a shrink with no
                    // element changes
                    if payload.bits_left() == 8 {
                        let terminator = read_varint(&mut payload)?;
                        if terminator != 0 || count as usize >= old_len {
                            return Err(ReceiveError::InvalidShrinkTerminator {
                                name: cmd.name.clone(),
                            });
                        }
                    }
                    break;
                }

                let index = index - 1;
                let Some(element) = array.get_mut(index as usize) else {
                    return Err(ReceiveError::ArrayIndexOutOfBounds {
                        name: cmd.name.clone(),
                        index,
                        count,
                    });
                };
                let element_shadow = shadow_array
                    .as_mut()
                    .and_then(|elements| elements.get_mut(index as usize))
                    .map(|element| element.as_mut_slice());

                path.push(cmd.slot);
                path.push(index as usize);
                let result = receive_compat_r(
                    params,
                    exports,
                    host_type,
                    &mut payload,
                    cmd_index + 1,
                    cmd.end_cmd - 1,
                    element,
                    element_shadow,
                    path,
                );
                path.pop();
                path.pop();
                result?;
            }
        } else {
            receive_property(
                params,
                &mut payload,
                cmd_index,
                data,
                shadow.as_deref_mut(),
                path,
            )?;
        }

        if payload.bits_left() != 0 {
            return Err(ReceiveError::PayloadSizeMismatch {
                name: cmd.name.clone(),
                bits_left: payload.bits_left(),
            });
        }
        debug!("Received compatible record for `{}` ({} bits)", cmd.name, num_bits);
    }
}
