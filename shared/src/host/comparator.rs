use crate::{
    changelist::check_array_bounds,
    host::{conditions::ChangedPropertyTracker, error::SendError},
    layout::{FieldRole, Layout, RepCondition, Value},
};

struct CompareParams<'a> {
    layout: &'a Layout,
    is_initial: bool,
    tracker: Option<&'a ChangedPropertyTracker>,
}

/// Diffs `data` against `shadow`, copying every changed value into the
/// shadow. Returns a terminated changelist, `[0]` when nothing changed, or
/// an error when an array has more elements than its handles can address.
///
/// Role fields are left to each connection and never compared here.
pub fn compare_properties(
    layout: &Layout,
    shadow: &mut [Value],
    data: &[Value],
    is_initial: bool,
    tracker: Option<&ChangedPropertyTracker>,
) -> Result<Vec<u16>, SendError> {
    // checked up front so a failed compare leaves the shadow untouched
    check_array_bounds(layout, data)?;
    let params = CompareParams {
        layout,
        is_initial,
        tracker,
    };
    let mut changed = Vec::new();
    compare_r(
        &params,
        0,
        layout.top_level_end(),
        shadow,
        data,
        &mut changed,
        0,
        false,
    )?;
    changed.push(0);
    Ok(changed)
}

/// Compares a connection's last sent role values against the live ones,
/// updating the saved copies. Returns the terminated list of role handles
/// that changed.
pub fn compare_role_properties(
    layout: &Layout,
    data: &[Value],
    saved_role: &mut Option<Value>,
    saved_remote_role: &mut Option<Value>,
) -> Vec<u16> {
    let mut changed = Vec::new();
    if let Some((role, remote_role)) = layout.role_parents() {
        let mut pairs = [(role, saved_role), (remote_role, saved_remote_role)];
        pairs.sort_by_key(|(parent_index, _)| layout.parents()[*parent_index].cmd_start);

        for (parent_index, saved) in pairs {
            let cmd = &layout.cmds()[layout.parents()[parent_index].cmd_start];
            let Some(live) = data.get(cmd.slot) else {
                continue;
            };
            if saved.as_ref() != Some(live) {
                *saved = Some(live.clone());
                changed.push(cmd.relative_handle);
            }
        }
    }
    changed.push(0);
    changed
}

#[allow(clippy::too_many_arguments)]
fn compare_r(
    params: &CompareParams,
    cmd_start: usize,
    cmd_end: usize,
    shadow: &mut [Value],
    data: &[Value],
    changed: &mut Vec<u16>,
    mut handle: u16,
    force_fail: bool,
) -> Result<u16, SendError> {
    let cmds = params.layout.cmds();
    let parents = params.layout.parents();

    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        let parent = &parents[cmd.parent_index];
        handle += 1;

        let skip = !parent.flags.lifetime
            || parent.role != FieldRole::None
            || (parent.condition == RepCondition::InitialOnly && !params.is_initial)
            || params
                .tracker
                .map_or(false, |tracker| !tracker.is_active(cmd.parent_index));

        if cmd.is_array() {
            if !skip {
                if let (Some(shadow_value), Some(live)) =
                    (shadow.get_mut(cmd.slot), data.get(cmd.slot))
                {
                    compare_array(
                        params,
                        cmd_index,
                        shadow_value,
                        live,
                        changed,
                        handle,
                        force_fail,
                    )?;
                }
            }
            cmd_index = cmd.end_cmd;
            continue;
        }

        if !skip {
            if let (Some(kind), Some(shadow_value), Some(live)) =
                (&cmd.kind, shadow.get_mut(cmd.slot), data.get(cmd.slot))
            {
                if force_fail || !kind.identical(shadow_value, live) {
                    *shadow_value = live.clone();
                    changed.push(handle);
                }
            }
        }
        cmd_index += 1;
    }

    Ok(handle)
}

fn compare_array(
    params: &CompareParams,
    cmd_index: usize,
    shadow_value: &mut Value,
    live: &Value,
    changed: &mut Vec<u16>,
    handle: u16,
    force_fail: bool,
) -> Result<(), SendError> {
    let cmd = &params.layout.cmds()[cmd_index];
    let live_elements = live.array_elements();
    let shadow_elements = shadow_value.ensure_array();

    let old_len = shadow_elements.len();
    let new_len = live_elements.len();
    if new_len < old_len {
        shadow_elements.truncate(new_len);
    } else {
        shadow_elements.resize_with(new_len, || params.layout.default_element(cmd_index));
    }

    let mut inner = Vec::new();
    let mut local_handle = 0;
    for (index, (shadow_element, live_element)) in
        shadow_elements.iter_mut().zip(live_elements.iter()).enumerate()
    {
        local_handle = compare_r(
            params,
            cmd_index + 1,
            cmd.end_cmd - 1,
            shadow_element,
            live_element,
            &mut inner,
            local_handle,
            force_fail || index >= old_len,
        )?;
    }

    // a resize with no element changes still needs an (empty) array entry
    if !inner.is_empty() || new_len != old_len {
        let jump = u16::try_from(inner.len()).map_err(|_| SendError::ArrayTooLong {
            name: cmd.name.clone(),
            len: new_len,
        })?;
        changed.push(handle);
        changed.push(jump);
        changed.extend_from_slice(&inner);
        changed.push(0);
    }
    Ok(())
}
