use log::trace;

use replica_serde::{BitReader, BitWriter, Serde};

use crate::{
    changelist::{build_full_changelist, is_empty},
    config::ReplicationConfig,
    fast_array::{
        base_state::FastArrayBaseState,
        history::FastArrayChangelistState,
        item::{FastArrayItem, FastArrayValue, INDEX_NONE},
    },
    host::{send_properties, SendError},
    layout::{read_varint, write_handle, write_varint, Layout},
    remote::{receive_embedded, EmbeddedOwner, ReceiveError, UnmappedReferences},
    types::ReferenceResolver,
};

/// Item ids touched by one received fast array delta.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FastArrayDelta {
    pub added: Vec<i32>,
    pub changed: Vec<i32>,
    pub removed: Vec<i32>,
}

impl FastArrayDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Writes the difference between `array` and what a connection holds
/// (`base`): the array key, removed ids, then each new or changed item's id
/// and property records.
///
/// Items the connection already holds are sent as the merged history of
/// their changes when `history` still covers `base`; everything else is sent
/// in full. Returns the connection's state after the send, or `None` if
/// there was nothing to write.
pub fn write_fast_array_delta(
    item_layout: &Layout,
    array: &FastArrayValue,
    base: &FastArrayBaseState,
    history: Option<&FastArrayChangelistState>,
    config: &ReplicationConfig,
    writer: &mut BitWriter,
    resolver: &dyn ReferenceResolver,
) -> Result<Option<FastArrayBaseState>, SendError> {
    if base.array_replication_key == array.array_replication_key {
        return Ok(None);
    }

    let mut new_state = FastArrayBaseState {
        array_replication_key: array.array_replication_key,
        id_to_key: Default::default(),
        history_number: history.map_or(0, FastArrayChangelistState::history_end),
    };

    let mut changed: Vec<(&FastArrayItem, Vec<u16>)> = Vec::new();
    for item in &array.items {
        if item.id == INDEX_NONE {
            continue;
        }
        new_state.id_to_key.insert(item.id, item.replication_key);
        if base.id_to_key.get(&item.id) == Some(&item.replication_key) {
            continue;
        }

        let delta = match history {
            Some(history)
                if config.support_fast_array_delta
                    && base.knows_item(item.id)
                    && base.history_number >= history.history_start() =>
            {
                history.merged_item_changelist(item.id, base.history_number)
            }
            _ => build_full_changelist(item_layout, &item.data)?,
        };
        if is_empty(&delta) {
            continue;
        }
        changed.push((item, delta));
    }

    let mut deleted: Vec<i32> = base
        .id_to_key
        .keys()
        .filter(|id| !new_state.id_to_key.contains_key(id))
        .copied()
        .collect();
    deleted.sort_unstable();

    if changed.is_empty() && deleted.is_empty() {
        return Ok(None);
    }

    let mark = writer.mark();
    let header = (array.array_replication_key, deleted.as_slice());
    if let Err(err) = write_items(item_layout, header, &changed, writer, resolver) {
        writer.rollback(mark);
        return Err(err);
    }

    trace!(
        "Fast array `{}` delta: {} changed, {} deleted, key {}",
        item_layout.name(),
        changed.len(),
        deleted.len(),
        array.array_replication_key
    );
    Ok(Some(new_state))
}

fn write_items(
    item_layout: &Layout,
    (array_key, deleted): (i32, &[i32]),
    changed: &[(&FastArrayItem, Vec<u16>)],
    writer: &mut BitWriter,
    resolver: &dyn ReferenceResolver,
) -> Result<(), SendError> {
    array_key.ser(writer);
    write_varint(writer, deleted.len() as u32);
    write_varint(writer, changed.len() as u32);
    for id in deleted {
        id.ser(writer);
    }
    for (item, delta) in changed {
        item.id.ser(writer);
        if !send_properties(item_layout, &item.data, delta, writer, None, &[], resolver)? {
            write_handle(writer, 0);
        }
    }
    Ok(())
}

/// Tracks the object references read into items so they can be retried
/// once their objects arrive. Item fields are addressed as `slot`, item id,
/// field slot.
pub struct FastArrayRefs<'a> {
    pub unmapped: &'a mut UnmappedReferences,
    pub parent_index: usize,
    pub slot: usize,
}

impl FastArrayRefs<'_> {
    fn item_path(&self, id: i32) -> Option<Vec<usize>> {
        usize::try_from(id).ok().map(|id| vec![self.slot, id])
    }
}

/// Applies a delta written by [`write_fast_array_delta`]. Without `refs`
/// item references that cannot be resolved yet are left null.
pub fn read_fast_array_delta(
    item_layout: &Layout,
    array: &mut FastArrayValue,
    reader: &mut BitReader,
    resolver: &dyn ReferenceResolver,
    config: &ReplicationConfig,
    mut refs: Option<FastArrayRefs<'_>>,
) -> Result<FastArrayDelta, ReceiveError> {
    let array_key = i32::de(reader)?;
    let num_deleted = read_varint(reader)?;
    let num_changed = read_varint(reader)?;
    for count in [num_deleted, num_changed] {
        if count > config.max_rep_array_size {
            return Err(ReceiveError::FastArrayTooLarge {
                count,
                max: config.max_rep_array_size,
            });
        }
    }

    let mut delta = FastArrayDelta::default();
    for _ in 0..num_deleted {
        let id = i32::de(reader)?;
        if let Some(index) = array.find_by_id(id) {
            array.items.remove(index);
            delta.removed.push(id);
        }
        if let Some(refs) = refs.as_mut() {
            if let Some(path) = refs.item_path(id) {
                refs.unmapped.remove_prefix(&path);
            }
        }
    }

    for _ in 0..num_changed {
        let id = i32::de(reader)?;
        let index = match array.find_by_id(id) {
            Some(index) => {
                delta.changed.push(id);
                index
            }
            None => {
                let mut item = FastArrayItem::new(item_layout.default_data());
                item.id = id;
                array.items.push(item);
                delta.added.push(id);
                array.items.len() - 1
            }
        };
        let owner = refs.as_mut().and_then(|refs| {
            refs.item_path(id).map(|path| EmbeddedOwner {
                unmapped: &mut *refs.unmapped,
                parent_index: refs.parent_index,
                path,
            })
        });
        let item = &mut array.items[index];
        receive_embedded(item_layout, &mut item.data, reader, resolver, config, owner)?;
        item.most_recent_array_replication_key = array_key;
    }

    array.array_replication_key = array_key;
    trace!(
        "Fast array `{}` received: {} added, {} changed, {} removed",
        item_layout.name(),
        delta.added.len(),
        delta.changed.len(),
        delta.removed.len()
    );
    Ok(delta)
}
