use log::{debug, trace};

use replica_serde::{BitReader, Serde};

use crate::{
    config::ReplicationConfig,
    layout::{read_handle, Layout, ObjectData, ReadContext, RepNotifyCondition, Value},
    remote::{
        error::ReceiveError,
        receiving_rep_state::ReceivingRepState,
        unmapped::{UnmappedRef, UnmappedReferences},
    },
    types::ReferenceResolver,
};

/// What a receive left behind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    /// Object references are waiting on objects that have not arrived
    pub has_unmapped: bool,
    /// The set of tracked references changed
    pub guids_changed: bool,
}

pub(crate) struct ReceiveParams<'p> {
    pub layout: &'p Layout,
    pub config: &'p ReplicationConfig,
    pub resolver: &'p dyn ReferenceResolver,
    pub notifies: Option<&'p mut Vec<usize>>,
    pub unmapped: Option<&'p mut UnmappedReferences>,
    pub outcome: ReceiveOutcome,
    pub swap_roles: bool,
    /// Parent that tracked references are filed under instead of the
    /// layout's own, for record streams embedded in another object
    pub owner_parent: Option<usize>,
    read_handle: u16,
}

impl<'p> ReceiveParams<'p> {
    pub fn new(
        layout: &'p Layout,
        config: &'p ReplicationConfig,
        resolver: &'p dyn ReferenceResolver,
        notifies: Option<&'p mut Vec<usize>>,
        unmapped: Option<&'p mut UnmappedReferences>,
    ) -> Self {
        Self {
            layout,
            config,
            resolver,
            notifies,
            unmapped,
            outcome: ReceiveOutcome::default(),
            swap_roles: true,
            owner_parent: None,
            read_handle: 0,
        }
    }
}

/// Applies a record stream written by
/// [`send_properties`](crate::host::send_properties) to `data`.
///
/// Previous values of notifying properties are kept in the state's shadow
/// and their parents queued for [`ReceivingRepState::take_rep_notifies`].
pub fn receive_properties(
    layout: &Layout,
    state: &mut ReceivingRepState,
    data: &mut ObjectData,
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
) -> Result<ReceiveOutcome, ReceiveError> {
    let swap_roles = !state.skip_role_swap();
    let (shadow, notifies, unmapped, _) = state.split_mut();
    let mut params = ReceiveParams::new(layout, config, resolver, Some(notifies), Some(unmapped));
    params.swap_roles = swap_roles;
    receive_top_level(&mut params, reader, data, Some(shadow), Vec::new())?;

    let mut outcome = params.outcome;
    outcome.has_unmapped = !state.unmapped().is_empty();
    Ok(outcome)
}

/// Where an embedded record stream lives inside its owning object.
/// References read from the stream are tracked under `path`, filed under
/// the owner's `parent_index`.
pub(crate) struct EmbeddedOwner<'a> {
    pub unmapped: &'a mut UnmappedReferences,
    pub parent_index: usize,
    pub path: Vec<usize>,
}

/// Applies a record stream to data that lives outside a receiving state,
/// such as a fast array item. Without an `owner` unresolved references are
/// dropped.
pub(crate) fn receive_embedded(
    layout: &Layout,
    data: &mut ObjectData,
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
    owner: Option<EmbeddedOwner<'_>>,
) -> Result<ReceiveOutcome, ReceiveError> {
    let mut params = ReceiveParams::new(layout, config, resolver, None, None);
    let mut path = Vec::new();
    if let Some(owner) = owner {
        params.unmapped = Some(owner.unmapped);
        params.owner_parent = Some(owner.parent_index);
        path = owner.path;
    }
    receive_top_level(&mut params, reader, data, None, path)?;
    Ok(params.outcome)
}

fn receive_top_level(
    params: &mut ReceiveParams,
    reader: &mut BitReader,
    data: &mut [Value],
    shadow: Option<&mut [Value]>,
    mut path: Vec<usize>,
) -> Result<(), ReceiveError> {
    params.read_handle = read_handle(reader)?;
    let mut current_handle = 0;
    let end = params.layout.top_level_end();
    receive_r(params, reader, 0, end, data, shadow, &mut current_handle, &mut path)?;

    if params.read_handle != 0 {
        return Err(ReceiveError::UnknownHandle {
            handle: params.read_handle,
        });
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn receive_r(
    params: &mut ReceiveParams,
    reader: &mut BitReader,
    cmd_start: usize,
    cmd_end: usize,
    data: &mut [Value],
    mut shadow: Option<&mut [Value]>,
    current_handle: &mut u16,
    path: &mut Vec<usize>,
) -> Result<(), ReceiveError> {
    let layout = params.layout;
    let cmds = layout.cmds();
    let mut cmd_index = cmd_start;

    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        *current_handle += 1;

        if *current_handle != params.read_handle {
            cmd_index = if cmd.is_array() { cmd.end_cmd } else { cmd_index + 1 };
            continue;
        }

        if cmd.is_array() {
            let count = u16::de(reader)?;
            prepare_array(
                params,
                cmd_index,
                u32::from(count),
                data,
                shadow.as_deref_mut(),
                path,
            )?;

            params.read_handle = read_handle(reader)?;
            if params.read_handle != 0 {
                let array = data
                    .get_mut(cmd.slot)
                    .ok_or_else(|| missing_slot(&cmd.name))?
                    .ensure_array();
                let mut shadow_array = shadow
                    .as_deref_mut()
                    .and_then(|shadow| shadow.get_mut(cmd.slot))
                    .map(Value::ensure_array);

                let mut element_handle = 0;
                for (index, element) in array.iter_mut().enumerate() {
                    let element_shadow = shadow_array
                        .as_mut()
                        .and_then(|elements| elements.get_mut(index))
                        .map(|element| element.as_mut_slice());
                    path.push(cmd.slot);
                    path.push(index);
                    let result = receive_r(
                        params,
                        reader,
                        cmd_index + 1,
                        cmd.end_cmd - 1,
                        element,
                        element_shadow,
                        &mut element_handle,
                        path,
                    );
                    path.pop();
                    path.pop();
                    result?;
                    if params.read_handle == 0 {
                        break;
                    }
                }

                if params.read_handle != 0 {
                    return Err(ReceiveError::InvalidArrayTerminator {
                        name: cmd.name.clone(),
                        handle: params.read_handle,
                    });
                }
            }

            params.read_handle = read_handle(reader)?;
            cmd_index = cmd.end_cmd;
            continue;
        }

        receive_property(params, reader, cmd_index, data, shadow.as_deref_mut(), path)?;
        params.read_handle = read_handle(reader)?;
        cmd_index += 1;
    }
    Ok(())
}

/// Validates a received element count and resizes the array (and its
/// shadow) to it. Returns the previous length.
pub(crate) fn prepare_array(
    params: &mut ReceiveParams,
    cmd_index: usize,
    count: u32,
    data: &mut [Value],
    shadow: Option<&mut [Value]>,
    path: &[usize],
) -> Result<usize, ReceiveError> {
    let layout = params.layout;
    let cmd = &layout.cmds()[cmd_index];

    if count > params.config.max_rep_array_size {
        return Err(ReceiveError::ArrayTooLarge {
            name: cmd.name.clone(),
            count,
            max: params.config.max_rep_array_size,
        });
    }
    let bytes = u64::from(count) * u64::from(cmd.element_size);
    if bytes > u64::from(params.config.max_rep_array_memory) {
        return Err(ReceiveError::ArrayMemoryExceeded {
            name: cmd.name.clone(),
            bytes,
            max: params.config.max_rep_array_memory,
        });
    }

    let count = count as usize;
    let array = data
        .get_mut(cmd.slot)
        .ok_or_else(|| missing_slot(&cmd.name))?
        .ensure_array();
    let old_len = array.len();
    resize_elements(layout, cmd_index, array, count);

    if let Some(shadow_array) = shadow.and_then(|shadow| shadow.get_mut(cmd.slot)) {
        resize_elements(layout, cmd_index, shadow_array.ensure_array(), count);
    }

    if count < old_len {
        if let Some(unmapped) = params.unmapped.as_deref_mut() {
            let mut prefix = path.to_vec();
            prefix.push(cmd.slot);
            unmapped.remove_elements_from(&prefix, count);
        }
    }

    let parent = &layout.parents()[cmd.parent_index];
    if let (Some(notifies), Some(rep_notify)) =
        (params.notifies.as_deref_mut(), parent.rep_notify)
    {
        if old_len != count || rep_notify == RepNotifyCondition::Always {
            queue_notify(notifies, cmd.parent_index);
        }
    }

    trace!("Array `{}` resized {} -> {}", cmd.name, old_len, count);
    Ok(old_len)
}

/// Reads one property value into its slot, honoring role swaps, and does
/// the notification and reference bookkeeping.
pub(crate) fn receive_property(
    params: &mut ReceiveParams,
    reader: &mut BitReader,
    cmd_index: usize,
    data: &mut [Value],
    shadow: Option<&mut [Value]>,
    path: &[usize],
) -> Result<(), ReceiveError> {
    let layout = params.layout;
    let cmd = &layout.cmds()[cmd_index];
    let parent = &layout.parents()[cmd.parent_index];
    let Some(kind) = &cmd.kind else {
        return Ok(());
    };

    // the peer's view of each role is the opposite of ours
    let slot = match parent.role_swap_index {
        Some(swap) if params.swap_roles => layout.cmds()[layout.parents()[swap].cmd_start].slot,
        _ => cmd.slot,
    };
    if slot >= data.len() {
        return Err(missing_slot(&cmd.name));
    }

    let mut context = ReadContext::new(params.resolver);
    let value = kind.read(reader, &mut context)?;
    let old = std::mem::replace(&mut data[slot], value);

    if let Some(unmapped) = params.unmapped.as_deref_mut() {
        let mut prefix = path.to_vec();
        prefix.push(slot);
        if unmapped.remove_prefix(&prefix) {
            params.outcome.guids_changed = true;
        }
        for (sub_path, token) in context.unmapped {
            let mut full_path = prefix.clone();
            full_path.extend(sub_path);
            unmapped.add(UnmappedRef {
                parent_index: params.owner_parent.unwrap_or(cmd.parent_index),
                path: full_path,
                token,
            });
            params.outcome.has_unmapped = true;
            params.outcome.guids_changed = true;
        }
    } else if !context.unmapped.is_empty() {
        debug!(
            "`{}` holds {} unresolved reference(s) that will not be retried",
            cmd.name,
            context.unmapped.len()
        );
    }

    let (Some(notifies), Some(rep_notify)) =
        (params.notifies.as_deref_mut(), parent.rep_notify)
    else {
        return Ok(());
    };
    let changed = rep_notify == RepNotifyCondition::Always || !kind.identical(&old, &data[slot]);
    if let Some(shadow_slot) = shadow.and_then(|shadow| shadow.get_mut(slot)) {
        *shadow_slot = old;
    }
    if changed {
        queue_notify(notifies, cmd.parent_index);
    } else if params.config.log_skipped_rep_notifies {
        debug!("Skipping notify for `{}`, the value did not change", parent.name);
    }
    Ok(())
}

pub(crate) fn missing_slot(name: &str) -> ReceiveError {
    ReceiveError::MissingSlot {
        name: name.to_string(),
    }
}

fn resize_elements(layout: &Layout, cmd_index: usize, array: &mut Vec<ObjectData>, count: usize) {
    if count <= array.len() {
        array.truncate(count);
    } else {
        array.resize_with(count, || layout.default_element(cmd_index));
    }
}

fn queue_notify(notifies: &mut Vec<usize>, parent_index: usize) {
    if !notifies.contains(&parent_index) {
        notifies.push(parent_index);
    }
}
