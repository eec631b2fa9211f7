use std::cmp::Ordering;

use crate::{
    changelist::iterator::{ChangelistCursor, HandleIterator},
    host::SendError,
    layout::{CmdType, Layout, RepLayoutCmd, Value},
};

/// Union of two changelists against the current data. Handles pointing past
/// the live length of an array are dropped. The result is terminated.
pub fn merge_changelists(
    layout: &Layout,
    data: &[Value],
    dirty1: &[u16],
    dirty2: &[u16],
) -> Vec<u16> {
    let mut merged = Vec::new();
    let elements = [data];

    let mut cursor1 = ChangelistCursor::new(dirty1);
    let mut iterator1 = HandleIterator::top_level(layout);
    if is_empty(dirty2) {
        prune_r(&mut iterator1, &mut cursor1, &elements, &mut merged);
    } else {
        let mut cursor2 = ChangelistCursor::new(dirty2);
        let mut iterator2 = HandleIterator::top_level(layout);
        merge_r(
            &mut iterator1,
            &mut cursor1,
            &mut iterator2,
            &mut cursor2,
            &elements,
            &mut merged,
        );
    }

    merged.push(0);
    merged
}

/// Copies a changelist, dropping handles that no longer exist in `data`.
pub fn prune_changelist(layout: &Layout, data: &[Value], changed: &[u16]) -> Vec<u16> {
    let mut pruned = Vec::new();
    let mut cursor = ChangelistCursor::new(changed);
    let mut iterator = HandleIterator::top_level(layout);
    prune_r(&mut iterator, &mut cursor, &[data], &mut pruned);
    pruned.push(0);
    pruned
}

/// Splits a changelist by parent activity into `(inactive, active)`.
pub fn filter_changelist(
    layout: &Layout,
    changed: &[u16],
    inactive_parents: &[bool],
) -> (Vec<u16>, Vec<u16>) {
    let mut inactive = Vec::new();
    let mut active = Vec::new();

    let mut cursor = ChangelistCursor::new(changed);
    let mut iterator = HandleIterator::top_level(layout);
    while iterator.next_handle(&mut cursor) {
        let cmd = &layout.cmds()[iterator.cmd_index];
        let is_inactive = inactive_parents
            .get(cmd.parent_index)
            .copied()
            .unwrap_or(false);
        let target = if is_inactive {
            &mut inactive
        } else {
            &mut active
        };
        target.push(iterator.handle);

        if cmd.cmd_type == CmdType::DynamicArray {
            let mark = cursor.enter_array();
            let entries = cursor.array_entries(&mark);
            target.push(entries.len() as u16);
            target.extend_from_slice(entries);
            target.push(0);
            cursor.leave_array(mark);
        }
    }

    inactive.push(0);
    active.push(0);
    (inactive, active)
}

/// Keeps only the handles of active parents.
pub fn filter_changelist_to_active(
    layout: &Layout,
    changed: &[u16],
    inactive_parents: &[bool],
) -> Vec<u16> {
    filter_changelist(layout, changed, inactive_parents).1
}

/// Changelist naming every handle of every lifetime parent in `data`,
/// including each element of every array. Fails when an array has more
/// elements than its handles can address.
pub fn build_full_changelist(layout: &Layout, data: &[Value]) -> Result<Vec<u16>, SendError> {
    let mut changed = Vec::new();
    full_r(layout, 0, layout.top_level_end(), data, 0, &mut changed)?;
    changed.push(0);
    Ok(changed)
}

pub fn is_empty(changed: &[u16]) -> bool {
    changed.first().map_or(true, |handle| *handle == 0)
}

fn merge_r<E: AsRef<[Value]>>(
    iterator1: &mut HandleIterator,
    cursor1: &mut ChangelistCursor,
    iterator2: &mut HandleIterator,
    cursor2: &mut ChangelistCursor,
    elements: &[E],
    out: &mut Vec<u16>,
) {
    let cmds = iterator1.cmds;
    loop {
        let next1 = cursor1.peek();
        let next2 = cursor2.peek();

        if next1 == 0 && next2 == 0 {
            break;
        }
        if next2 == 0 {
            prune_r(iterator1, cursor1, elements, out);
            return;
        }
        if next1 == 0 {
            prune_r(iterator2, cursor2, elements, out);
            return;
        }

        let (active1, active2) = match next1.cmp(&next2) {
            Ordering::Less => (true, false),
            Ordering::Greater => (false, true),
            Ordering::Equal => (true, true),
        };
        if active1 && !iterator1.next_handle(cursor1) {
            break;
        }
        if active2 && !iterator2.next_handle(cursor2) {
            break;
        }

        let (handle, cmd_index, array_index) = if active1 {
            (iterator1.handle, iterator1.cmd_index, iterator1.array_index)
        } else {
            (iterator2.handle, iterator2.cmd_index, iterator2.array_index)
        };
        out.push(handle);

        let cmd = &cmds[cmd_index];
        if cmd.cmd_type != CmdType::DynamicArray {
            continue;
        }

        let array = array_at(elements, array_index, cmd.slot);
        let mark1 = active1.then(|| cursor1.enter_array());
        let mark2 = active2.then(|| cursor2.enter_array());
        let jump_index = out.len();
        out.push(0);

        match (active1, active2) {
            (true, true) => {
                let mut array_iterator1 = iterator1.for_array(cmd_index, array.len());
                let mut array_iterator2 = iterator2.for_array(cmd_index, array.len());
                merge_r(
                    &mut array_iterator1,
                    cursor1,
                    &mut array_iterator2,
                    cursor2,
                    array,
                    out,
                );
            }
            (true, false) => {
                let mut array_iterator = iterator1.for_array(cmd_index, array.len());
                prune_r(&mut array_iterator, cursor1, array, out);
            }
            _ => {
                let mut array_iterator = iterator2.for_array(cmd_index, array.len());
                prune_r(&mut array_iterator, cursor2, array, out);
            }
        }

        patch_jump(out, jump_index);
        out.push(0);
        if let Some(mark) = mark1 {
            cursor1.leave_array(mark);
        }
        if let Some(mark) = mark2 {
            cursor2.leave_array(mark);
        }
    }
}

fn prune_r<E: AsRef<[Value]>>(
    iterator: &mut HandleIterator,
    cursor: &mut ChangelistCursor,
    elements: &[E],
    out: &mut Vec<u16>,
) {
    let cmds = iterator.cmds;
    while iterator.next_handle(cursor) {
        out.push(iterator.handle);

        let cmd_index = iterator.cmd_index;
        let cmd = &cmds[cmd_index];
        if cmd.cmd_type != CmdType::DynamicArray {
            continue;
        }

        let array = array_at(elements, iterator.array_index, cmd.slot);
        let mark = cursor.enter_array();
        let jump_index = out.len();
        out.push(0);

        let mut array_iterator = iterator.for_array(cmd_index, array.len());
        prune_r(&mut array_iterator, cursor, array, out);

        patch_jump(out, jump_index);
        out.push(0);
        cursor.leave_array(mark);
    }
}

fn full_r(
    layout: &Layout,
    cmd_start: usize,
    cmd_end: usize,
    data: &[Value],
    base_handle: u16,
    out: &mut Vec<u16>,
) -> Result<(), SendError> {
    let cmds = layout.cmds();
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        let parent = &layout.parents()[cmd.parent_index];
        let handle = base_handle + cmd.relative_handle;

        if cmd.cmd_type == CmdType::DynamicArray {
            if parent.flags.lifetime {
                out.push(handle);
                let jump_index = out.len();
                out.push(0);

                let elements = data.get(cmd.slot).map_or(&[][..], Value::array_elements);
                let per_element = count_handles(cmds, cmd_index + 1, cmd.end_cmd - 1);
                check_element_handles(cmd, elements.len(), per_element)?;
                for (index, element) in elements.iter().enumerate() {
                    let element_base = u16::try_from(index * per_element)
                        .map_err(|_| array_too_long(cmd, elements.len()))?;
                    full_r(layout, cmd_index + 1, cmd.end_cmd - 1, element, element_base, out)?;
                }

                out[jump_index] = jump_count(out, jump_index)
                    .ok_or_else(|| array_too_long(cmd, elements.len()))?;
                out.push(0);
            }
            cmd_index = cmd.end_cmd;
            continue;
        }

        if parent.flags.lifetime {
            out.push(handle);
        }
        cmd_index += 1;
    }
    Ok(())
}

/// Fails when an array in `data` has more elements than its handles can
/// address, or more entries than a jump count can hold. Changelists of
/// data that passes can be built, merged and pruned without overflow.
pub(crate) fn check_array_bounds(layout: &Layout, data: &[Value]) -> Result<(), SendError> {
    level_entries(layout, 0, layout.top_level_end(), data).map(|_| ())
}

/// Entries a full changelist of one level takes, without its terminator.
fn level_entries(
    layout: &Layout,
    cmd_start: usize,
    cmd_end: usize,
    data: &[Value],
) -> Result<usize, SendError> {
    let cmds = layout.cmds();
    let mut entries = 0;
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        let cmd = &cmds[cmd_index];
        if !cmd.is_array() {
            entries += 1;
            cmd_index += 1;
            continue;
        }

        let elements = data.get(cmd.slot).map_or(&[][..], Value::array_elements);
        let per_element = count_handles(cmds, cmd_index + 1, cmd.end_cmd - 1);
        check_element_handles(cmd, elements.len(), per_element)?;

        let nested = cmds[cmd_index + 1..cmd.end_cmd - 1]
            .iter()
            .any(RepLayoutCmd::is_array);
        let inner = if nested {
            let mut inner = 0;
            for element in elements {
                inner += level_entries(layout, cmd_index + 1, cmd.end_cmd - 1, element)?;
            }
            inner
        } else {
            elements.len() * per_element
        };
        if inner > usize::from(u16::MAX) {
            return Err(array_too_long(cmd, elements.len()));
        }
        // handle, jump count and terminator
        entries += inner + 3;
        cmd_index = cmd.end_cmd;
    }
    Ok(entries)
}

/// Array elements are addressed as `index * handles per element + handle`,
/// which has to fit a `u16`.
fn check_element_handles(
    cmd: &RepLayoutCmd,
    len: usize,
    per_element: usize,
) -> Result<(), SendError> {
    if len.saturating_mul(per_element) > usize::from(u16::MAX) {
        return Err(array_too_long(cmd, len));
    }
    Ok(())
}

fn array_too_long(cmd: &RepLayoutCmd, len: usize) -> SendError {
    SendError::ArrayTooLong {
        name: cmd.name.clone(),
        len,
    }
}

fn count_handles(cmds: &[RepLayoutCmd], cmd_start: usize, cmd_end: usize) -> usize {
    let mut count = 0;
    let mut cmd_index = cmd_start;
    while cmd_index < cmd_end {
        count += 1;
        let cmd = &cmds[cmd_index];
        cmd_index = if cmd.is_array() {
            cmd.end_cmd
        } else {
            cmd_index + 1
        };
    }
    count
}

fn array_at<E: AsRef<[Value]>>(elements: &[E], array_index: usize, slot: usize) -> &[Vec<Value>] {
    elements
        .get(array_index)
        .and_then(|element| element.as_ref().get(slot))
        .map_or(&[][..], Value::array_elements)
}

fn jump_count(out: &[u16], jump_index: usize) -> Option<u16> {
    u16::try_from(out.len() - jump_index - 1).ok()
}

fn patch_jump(out: &mut [u16], jump_index: usize) {
    out[jump_index] = jump_count(out, jump_index).unwrap_or(u16::MAX);
}
