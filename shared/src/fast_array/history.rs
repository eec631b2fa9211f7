use std::{collections::HashMap, sync::Arc};

use log::trace;

use crate::{
    changelist::{is_empty, merge_changelists},
    fast_array::item::FastArrayValue,
    host::{compare_properties, SendError},
    layout::{Layout, ObjectData},
};

#[derive(Clone, Debug, Default)]
struct ItemHistoryEntry {
    changed: HashMap<i32, Vec<u16>>,
}

/// Shared per-item change history of one fast array property.
///
/// Each compare that finds item changes appends one entry holding a
/// changelist per changed item id. Entries are numbered by a monotonically
/// increasing history number.
#[derive(Debug)]
pub struct FastArrayChangelistState {
    item_layout: Arc<Layout>,
    item_shadows: HashMap<i32, ObjectData>,
    item_keys: HashMap<i32, i32>,
    last_array_key: Option<i32>,
    history: Vec<ItemHistoryEntry>,
    history_start: i32,
    history_end: i32,
}

impl FastArrayChangelistState {
    pub fn new(item_layout: Arc<Layout>, history_size: usize) -> Self {
        Self {
            item_layout,
            item_shadows: HashMap::new(),
            item_keys: HashMap::new(),
            last_array_key: None,
            history: vec![ItemHistoryEntry::default(); history_size.max(2)],
            history_start: 0,
            history_end: 0,
        }
    }

    pub fn item_layout(&self) -> &Arc<Layout> {
        &self.item_layout
    }

    pub fn history_start(&self) -> i32 {
        self.history_start
    }

    pub fn history_end(&self) -> i32 {
        self.history_end
    }

    /// Compares every item whose key moved since the last update. Returns
    /// whether a history entry was added.
    pub fn update(&mut self, array: &FastArrayValue) -> Result<bool, SendError> {
        if self.last_array_key == Some(array.array_replication_key) {
            return Ok(false);
        }
        self.last_array_key = Some(array.array_replication_key);

        let mut entry = ItemHistoryEntry::default();
        for item in &array.items {
            if self.item_keys.get(&item.id) == Some(&item.replication_key) {
                continue;
            }
            self.item_keys.insert(item.id, item.replication_key);

            let layout = &self.item_layout;
            let shadow = self
                .item_shadows
                .entry(item.id)
                .or_insert_with(|| layout.default_data());
            let changed = compare_properties(layout, shadow, &item.data, false, None)?;
            if !is_empty(&changed) {
                entry.changed.insert(item.id, changed);
            }
        }

        let live_ids: Vec<i32> = array.items.iter().map(|item| item.id).collect();
        self.item_shadows.retain(|id, _| live_ids.contains(id));
        self.item_keys.retain(|id, _| live_ids.contains(id));

        if entry.changed.is_empty() {
            return Ok(false);
        }

        let size = self.history.len() as i32;
        if self.history_end - self.history_start == size {
            self.merge_oldest();
        }
        let slot = self.slot(self.history_end);
        self.history[slot] = entry;
        self.history_end += 1;
        trace!(
            "Fast array item history {} recorded (start {})",
            self.history_end - 1,
            self.history_start
        );
        Ok(true)
    }

    /// Everything that changed in item `id` from history number `since` on.
    pub fn merged_item_changelist(&self, id: i32, since: i32) -> Vec<u16> {
        let data = self
            .item_shadows
            .get(&id)
            .map_or(&[][..], |shadow| shadow.as_slice());
        let mut merged = vec![0];
        for number in since.max(self.history_start)..self.history_end {
            if let Some(changed) = self.history[self.slot(number)].changed.get(&id) {
                merged = merge_changelists(&self.item_layout, data, changed, &merged);
            }
        }
        merged
    }

    fn merge_oldest(&mut self) {
        let first_slot = self.slot(self.history_start);
        let first = std::mem::take(&mut self.history[first_slot]);
        self.history_start += 1;
        let second_slot = self.slot(self.history_start);

        for (id, changed) in first.changed {
            let Some(data) = self.item_shadows.get(&id) else {
                continue;
            };
            let second = &mut self.history[second_slot].changed;
            let merged = match second.get(&id) {
                Some(newer) => merge_changelists(&self.item_layout, data, &changed, newer),
                None => changed,
            };
            second.insert(id, merged);
        }
    }

    fn slot(&self, number: i32) -> usize {
        number.rem_euclid(self.history.len() as i32) as usize
    }
}
