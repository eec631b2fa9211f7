use crate::layout::ObjectData;

pub const INDEX_NONE: i32 = -1;

/// One identified element of a fast array.
#[derive(Clone, Debug, PartialEq)]
pub struct FastArrayItem {
    /// Stable id, assigned by the authority when the item is first marked
    pub id: i32,
    /// Bumped whenever the item is marked dirty
    pub replication_key: i32,
    /// Array key at the time this item was last received
    pub most_recent_array_replication_key: i32,
    pub data: ObjectData,
}

impl FastArrayItem {
    pub fn new(data: ObjectData) -> Self {
        Self {
            id: INDEX_NONE,
            replication_key: INDEX_NONE,
            most_recent_array_replication_key: INDEX_NONE,
            data,
        }
    }
}

/// An array replicated item by item, keyed by id rather than position.
///
/// Changes must be announced with [`mark_item_dirty`](Self::mark_item_dirty)
/// or [`mark_array_dirty`](Self::mark_array_dirty); unmarked edits are not
/// replicated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FastArrayValue {
    pub array_replication_key: i32,
    pub items: Vec<FastArrayItem>,
    id_counter: i32,
}

impl FastArrayValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends an item and marks it dirty. Returns the new item's id.
    pub fn add_item(&mut self, data: ObjectData) -> i32 {
        self.items.push(FastArrayItem::new(data));
        let index = self.items.len() - 1;
        self.mark_item_dirty(index);
        self.items[index].id
    }

    /// Flags the item at `index` for replication, assigning an id if it has
    /// none yet.
    pub fn mark_item_dirty(&mut self, index: usize) {
        let Some(item) = self.items.get_mut(index) else {
            return;
        };
        if item.id == INDEX_NONE {
            self.id_counter += 1;
            if self.id_counter == INDEX_NONE {
                self.id_counter += 1;
            }
            item.id = self.id_counter;
        }
        item.replication_key = item.replication_key.wrapping_add(1);
        self.mark_array_dirty();
    }

    /// Mutable access to an item's data. The item is marked dirty.
    pub fn item_data_mut(&mut self, index: usize) -> Option<&mut ObjectData> {
        if index >= self.items.len() {
            return None;
        }
        self.mark_item_dirty(index);
        Some(&mut self.items[index].data)
    }

    pub fn remove_item(&mut self, index: usize) -> Option<FastArrayItem> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.mark_array_dirty();
        Some(item)
    }

    /// Flags the array itself, for example after removing items.
    pub fn mark_array_dirty(&mut self) {
        self.array_replication_key = self.array_replication_key.wrapping_add(1);
    }

    pub fn find_by_id(&self, id: i32) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}
